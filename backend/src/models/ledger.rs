//! Ledger entries: one directional debt produced by a game's settlement

use crate::engine::money::is_whole_cents;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One directional debt arising from a single game's settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LedgerEntryPayload")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub game_id: Uuid,
    pub group_id: Uuid,
    /// Debtor
    pub from_user_id: Uuid,
    /// Creditor
    pub to_user_id: Uuid,
    pub amount: Decimal,
    pub paid: bool,
    pub created_at: NaiveDateTime,
    pub paid_at: Option<NaiveDateTime>,
}

impl LedgerEntry {
    /// Create a new unpaid LedgerEntry
    pub fn new(
        game_id: Uuid,
        group_id: Uuid,
        from_user_id: Uuid,
        to_user_id: Uuid,
        amount: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            group_id,
            from_user_id,
            to_user_id,
            amount,
            paid: false,
            created_at: chrono::Utc::now().naive_utc(),
            paid_at: None,
        }
    }

    /// Check whether the entry involves the given user on either side
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.from_user_id == user_id || self.to_user_id == user_id
    }

    /// The other party of the entry, seen from `user_id`
    pub fn counterparty_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.from_user_id == user_id {
            Some(self.to_user_id)
        } else if self.to_user_id == user_id {
            Some(self.from_user_id)
        } else {
            None
        }
    }

    /// Validate entry invariants
    pub fn validate(&self) -> Result<(), String> {
        if self.from_user_id == self.to_user_id {
            return Err("Debtor and creditor must differ".to_string());
        }
        if self.amount <= Decimal::ZERO {
            return Err("Amount must be greater than zero".to_string());
        }
        if !is_whole_cents(self.amount) {
            return Err("Amount must have at most 2 decimal places".to_string());
        }
        Ok(())
    }
}

/// Wire shape accepted for ledger entries.
///
/// Older payloads carry `status: "paid"` instead of (or alongside) the
/// `paid` flag; both collapse into the single boolean.
#[derive(Debug, Deserialize)]
struct LedgerEntryPayload {
    id: Uuid,
    game_id: Uuid,
    group_id: Uuid,
    from_user_id: Uuid,
    to_user_id: Uuid,
    amount: Decimal,
    #[serde(default)]
    paid: Option<bool>,
    #[serde(default)]
    status: Option<String>,
    created_at: NaiveDateTime,
    #[serde(default)]
    paid_at: Option<NaiveDateTime>,
}

impl From<LedgerEntryPayload> for LedgerEntry {
    fn from(payload: LedgerEntryPayload) -> Self {
        let paid = payload.paid.unwrap_or(false)
            || payload
                .status
                .as_deref()
                .map(|s| s.eq_ignore_ascii_case("paid"))
                .unwrap_or(false);

        Self {
            id: payload.id,
            game_id: payload.game_id,
            group_id: payload.group_id,
            from_user_id: payload.from_user_id,
            to_user_id: payload.to_user_id,
            amount: payload.amount,
            paid,
            created_at: payload.created_at,
            paid_at: payload.paid_at,
        }
    }
}
