use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum accepted length of a dispute message
pub const MAX_DISPUTE_MESSAGE_LEN: usize = 1000;

/// What a participant believes is wrong with a settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeCategory {
    WrongBuyin,
    WrongCashout,
    MissingPlayer,
    Other,
}

impl DisputeCategory {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "wrong_buyin" => Ok(DisputeCategory::WrongBuyin),
            "wrong_cashout" => Ok(DisputeCategory::WrongCashout),
            "missing_player" => Ok(DisputeCategory::MissingPlayer),
            "other" => Ok(DisputeCategory::Other),
            _ => Err(format!("Invalid dispute category: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeCategory::WrongBuyin => "wrong_buyin",
            DisputeCategory::WrongCashout => "wrong_cashout",
            DisputeCategory::MissingPlayer => "missing_player",
            DisputeCategory::Other => "other",
        }
    }
}

/// Review status of a dispute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    Open,
    Reviewing,
    Resolved,
}

impl DisputeStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "open" => Ok(DisputeStatus::Open),
            "reviewing" => Ok(DisputeStatus::Reviewing),
            "resolved" => Ok(DisputeStatus::Resolved),
            _ => Err(format!("Invalid dispute status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::Reviewing => "reviewing",
            DisputeStatus::Resolved => "resolved",
        }
    }

    /// Open and reviewing disputes block payment actions
    pub fn is_blocking(&self) -> bool {
        matches!(self, DisputeStatus::Open | DisputeStatus::Reviewing)
    }

    /// Allowed forward transitions
    pub fn can_transition_to(&self, next: DisputeStatus) -> bool {
        matches!(
            (self, next),
            (DisputeStatus::Open, DisputeStatus::Reviewing)
                | (DisputeStatus::Open, DisputeStatus::Resolved)
                | (DisputeStatus::Reviewing, DisputeStatus::Resolved)
        )
    }
}

/// An open report against a finalized settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementDispute {
    pub id: Uuid,
    pub game_id: Uuid,
    pub filed_by: Uuid,
    pub category: DisputeCategory,
    pub message: String,
    pub status: DisputeStatus,
    pub resolution_note: Option<String>,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

impl SettlementDispute {
    /// Create a new open dispute
    pub fn new(game_id: Uuid, filed_by: Uuid, category: DisputeCategory, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            filed_by,
            category,
            message: message.into(),
            status: DisputeStatus::Open,
            resolution_note: None,
            created_at: chrono::Utc::now().naive_utc(),
            resolved_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_strings() {
        for category in [
            DisputeCategory::WrongBuyin,
            DisputeCategory::WrongCashout,
            DisputeCategory::MissingPlayer,
            DisputeCategory::Other,
        ] {
            assert_eq!(DisputeCategory::from_str(category.as_str()), Ok(category));
        }
    }

    #[test]
    fn test_category_serde_names() {
        let json = serde_json::to_string(&DisputeCategory::WrongCashout).unwrap();
        assert_eq!(json, "\"wrong_cashout\"");
    }

    #[test]
    fn test_blocking_statuses() {
        assert!(DisputeStatus::Open.is_blocking());
        assert!(DisputeStatus::Reviewing.is_blocking());
        assert!(!DisputeStatus::Resolved.is_blocking());
    }

    #[test]
    fn test_transitions() {
        assert!(DisputeStatus::Open.can_transition_to(DisputeStatus::Reviewing));
        assert!(DisputeStatus::Reviewing.can_transition_to(DisputeStatus::Resolved));
        assert!(!DisputeStatus::Resolved.can_transition_to(DisputeStatus::Open));
        assert!(!DisputeStatus::Reviewing.can_transition_to(DisputeStatus::Open));
    }
}
