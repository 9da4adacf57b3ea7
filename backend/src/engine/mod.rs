//! Settlement engine.
//!
//! Pure, synchronous computations over a snapshot of game and ledger data:
//! - [`net_position`]: per-player net results and discrepancy detection
//! - [`settler`]: greedy largest-pair settlement into pairwise payments
//! - [`consolidator`]: cross-game netting of unpaid ledger entries
//!
//! Nothing in here performs I/O; services feed it and persist its output.

pub mod consolidator;
pub mod money;
pub mod net_position;
pub mod settler;

use thiserror::Error;
use uuid::Uuid;

pub use consolidator::consolidate;
pub use net_position::{collect_player_results, compute_net_positions, GameNetPositions};
pub use settler::{settle_balances, settle_results, SettlementPlan, UnallocatedBalance};

/// Error types for engine computations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Player {0} appears more than once")]
    DuplicatePlayer(Uuid),

    #[error("Unknown player: {0}")]
    UnknownPlayer(Uuid),

    #[error("Invalid game: {0}")]
    InvalidGame(String),
}

/// Result type for engine computations
pub type EngineResult<T> = Result<T, EngineError>;
