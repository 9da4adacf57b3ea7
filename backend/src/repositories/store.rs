//! Storage seam for the settlement service.
//!
//! Everything the service reads or writes goes through [`SettlementStore`].
//! [`PgStore`](super::PgStore) is the production implementation;
//! [`InMemoryStore`](super::InMemoryStore) backs development and tests.

use crate::error::RepositoryError;
use crate::models::{BuyIn, CashOut, Game, LedgerEntry, Settlement, SettlementDispute, User};
use async_trait::async_trait;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait SettlementStore: Send + Sync {
    // ---------------------------------------------------------------------
    // Users and games
    // ---------------------------------------------------------------------

    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn users_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;

    async fn insert_game(&self, game: &Game) -> StoreResult<()>;

    async fn get_game(&self, game_id: Uuid) -> StoreResult<Option<Game>>;

    /// Flip an active game to ended. Returns the updated game; ending an
    /// already ended game is a no-op.
    async fn mark_game_ended(&self, game_id: Uuid) -> StoreResult<Game>;

    async fn insert_buy_in(&self, buy_in: &BuyIn) -> StoreResult<()>;

    async fn buy_ins_for_game(&self, game_id: Uuid) -> StoreResult<Vec<BuyIn>>;

    /// Insert or overwrite a player's cash-out for a game
    async fn upsert_cash_out(&self, cash_out: &CashOut) -> StoreResult<()>;

    async fn cash_outs_for_game(&self, game_id: Uuid) -> StoreResult<Vec<CashOut>>;

    // ---------------------------------------------------------------------
    // Settlements and ledger
    // ---------------------------------------------------------------------

    /// Persist a game's first settlement together with its ledger rows.
    ///
    /// Fails with [`RepositoryError::Duplicate`] when the game already has a
    /// settlement; nothing is written in that case.
    async fn insert_settlement(
        &self,
        settlement: &Settlement,
        entries: &[LedgerEntry],
    ) -> StoreResult<()>;

    /// Replace a game's buy-ins, cash-outs, settlement and ledger rows as
    /// one atomic write.
    ///
    /// Fails with [`RepositoryError::ConstraintViolation`] if any existing
    /// ledger row of the game is already paid; nothing is written then.
    async fn replace_settlement(
        &self,
        settlement: &Settlement,
        buy_ins: &[BuyIn],
        cash_outs: &[CashOut],
        entries: &[LedgerEntry],
    ) -> StoreResult<()>;

    async fn get_settlement(&self, game_id: Uuid) -> StoreResult<Option<Settlement>>;

    async fn get_ledger_entry(&self, ledger_id: Uuid) -> StoreResult<Option<LedgerEntry>>;

    async fn ledger_for_game(&self, game_id: Uuid) -> StoreResult<Vec<LedgerEntry>>;

    /// Unpaid rows where the user is debtor or creditor, oldest first
    async fn unpaid_ledger_for_user(&self, user_id: Uuid) -> StoreResult<Vec<LedgerEntry>>;

    async fn set_ledger_paid(&self, ledger_id: Uuid, paid: bool) -> StoreResult<LedgerEntry>;

    /// Mark every listed row paid in one transaction.
    ///
    /// Fails with [`RepositoryError::NotFound`] without writing anything if
    /// any id is unknown.
    async fn mark_ledger_paid_many(&self, ledger_ids: &[Uuid]) -> StoreResult<Vec<LedgerEntry>>;

    // ---------------------------------------------------------------------
    // Disputes
    // ---------------------------------------------------------------------

    async fn insert_dispute(&self, dispute: &SettlementDispute) -> StoreResult<()>;

    async fn get_dispute(&self, dispute_id: Uuid) -> StoreResult<Option<SettlementDispute>>;

    /// Disputes for a game, oldest first
    async fn disputes_for_game(&self, game_id: Uuid) -> StoreResult<Vec<SettlementDispute>>;

    async fn update_dispute(&self, dispute: &SettlementDispute) -> StoreResult<()>;
}
