//! Cross-game consolidated balances between one user and each counterparty

use crate::models::UserRef;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which way money flows, seen from the requesting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceDirection {
    OwedToYou,
    YouOwe,
}

/// One game's contribution to a consolidated balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameContribution {
    pub game_id: Uuid,
    pub group_id: Uuid,
    /// Positive when the counterparty owes the user for this game
    pub amount: Decimal,
    /// `None` when the game's entries cancel out exactly
    pub direction: Option<BalanceDirection>,
    pub ledger_ids: Vec<Uuid>,
}

/// Present when debts in both directions were netted against each other
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetExplanation {
    pub gross_you_owe: Decimal,
    pub gross_they_owe: Decimal,
    pub offset_amount: Decimal,
}

/// Net position of the user versus one counterparty, across all unpaid entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedBalance {
    pub user: UserRef,
    /// Positive when the counterparty owes the user
    pub net_amount: Decimal,
    pub direction: BalanceDirection,
    pub display_amount: Decimal,
    pub game_breakdown: Vec<GameContribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_explanation: Option<OffsetExplanation>,
    /// Every ledger row that makes up this balance, for one-shot payment
    pub all_ledger_ids: Vec<Uuid>,
}

/// A ledger row the consolidator refused to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityWarning {
    UnknownCounterparty { ledger_id: Uuid, user_id: Uuid },
    SelfDebt { ledger_id: Uuid },
    InvalidAmount { ledger_id: Uuid, amount: Decimal },
    NotInvolved { ledger_id: Uuid },
}

impl IntegrityWarning {
    pub fn ledger_id(&self) -> Uuid {
        match self {
            IntegrityWarning::UnknownCounterparty { ledger_id, .. }
            | IntegrityWarning::SelfDebt { ledger_id }
            | IntegrityWarning::InvalidAmount { ledger_id, .. }
            | IntegrityWarning::NotInvolved { ledger_id } => *ledger_id,
        }
    }
}

/// Full consolidated view for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    pub consolidated: Vec<ConsolidatedBalance>,
    pub total_owed_to_you: Decimal,
    pub total_you_owe: Decimal,
    pub net_balance: Decimal,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<IntegrityWarning>,
}

impl ConsolidatedReport {
    /// Find the balance against a given counterparty
    pub fn balance_with(&self, counterparty: Uuid) -> Option<&ConsolidatedBalance> {
        self.consolidated.iter().find(|b| b.user.id == counterparty)
    }
}
