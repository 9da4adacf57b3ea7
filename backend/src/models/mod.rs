//! Domain models for the Kvitt backend.
//!
//! Games and their buy-ins/cash-outs feed the settlement engine; settlements,
//! ledger entries and disputes are what the engine produces and guards.

pub mod consolidated;
pub mod dispute;
pub mod game;
pub mod ledger;
pub mod settlement;
pub mod user;

// Re-export all models for convenient access
pub use consolidated::{
    BalanceDirection, ConsolidatedBalance, ConsolidatedReport, GameContribution, IntegrityWarning,
    OffsetExplanation,
};
pub use dispute::{DisputeCategory, DisputeStatus, SettlementDispute, MAX_DISPUTE_MESSAGE_LEN};
pub use game::{BuyIn, CashOut, Game, GameStatus};
pub use ledger::LedgerEntry;
pub use settlement::{Payment, PlayerGameResult, Settlement, SettlementState};
pub use user::{User, UserRef};
