//! Settlement records produced when a game ends

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One player's outcome in one finished game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameResult {
    pub user_id: Uuid,
    pub name: String,
    pub total_buy_in: Decimal,
    pub cash_out: Decimal,
    pub net_result: Decimal,
}

impl PlayerGameResult {
    /// Create a result, deriving `net_result` from buy-in and cash-out
    pub fn new(user_id: Uuid, name: impl Into<String>, total_buy_in: Decimal, cash_out: Decimal) -> Self {
        Self {
            user_id,
            name: name.into(),
            total_buy_in,
            cash_out,
            net_result: cash_out - total_buy_in,
        }
    }
}

/// One pairwise transfer instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub amount: Decimal,
}

/// Lifecycle state of a game's settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
    NoSettlement,
    Settled,
    Disputed,
}

impl SettlementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementState::NoSettlement => "no_settlement",
            SettlementState::Settled => "settled",
            SettlementState::Disputed => "disputed",
        }
    }

    /// Payment-affecting actions are paused while a dispute is pending
    pub fn is_under_review(&self) -> bool {
        matches!(self, SettlementState::Disputed)
    }
}

/// Persisted settlement for one game.
///
/// Immutable once written; a re-run after dispute resolution replaces the
/// whole record and bumps `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub game_id: Uuid,
    pub group_id: Uuid,
    pub version: i32,
    pub results: Vec<PlayerGameResult>,
    pub payments: Vec<Payment>,
    pub total_buy_in: Decimal,
    pub total_cash_out: Decimal,
    /// `total_cash_out - total_buy_in`
    pub discrepancy: Decimal,
    pub has_discrepancy: bool,
    /// Hex SHA-256 over results and payments
    pub digest: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Settlement {
    /// Check whether a user took part in the settled game
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.results.iter().any(|r| r.user_id == user_id)
    }
}
