pub mod dispute_repository;
pub mod game_repository;
pub mod ledger_repository;
pub mod memory;
pub mod pg_store;
pub mod settlement_repository;
pub mod store;
pub mod user_repository;

// Re-export all repositories for convenient access
pub use dispute_repository::DisputeRepository;
pub use game_repository::GameRepository;
pub use ledger_repository::LedgerRepository;
pub use memory::InMemoryStore;
pub use pg_store::PgStore;
pub use settlement_repository::SettlementRepository;
pub use store::{SettlementStore, StoreResult};
pub use user_repository::UserRepository;
