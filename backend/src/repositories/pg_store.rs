//! Postgres-backed [`SettlementStore`]

use super::store::{SettlementStore, StoreResult};
use super::{DisputeRepository, GameRepository, LedgerRepository, SettlementRepository, UserRepository};
use crate::models::{BuyIn, CashOut, Game, LedgerEntry, Settlement, SettlementDispute, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Bundles the per-table repositories behind the store trait
pub struct PgStore {
    pub user_repo: Arc<UserRepository>,
    pub game_repo: Arc<GameRepository>,
    pub settlement_repo: Arc<SettlementRepository>,
    pub ledger_repo: Arc<LedgerRepository>,
    pub dispute_repo: Arc<DisputeRepository>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repo: Arc::new(UserRepository::new(pool.clone())),
            game_repo: Arc::new(GameRepository::new(pool.clone())),
            settlement_repo: Arc::new(SettlementRepository::new(pool.clone())),
            ledger_repo: Arc::new(LedgerRepository::new(pool.clone())),
            dispute_repo: Arc::new(DisputeRepository::new(pool)),
        }
    }
}

#[async_trait]
impl SettlementStore for PgStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.user_repo.create(user).await
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        self.user_repo.find_many(ids).await
    }

    async fn insert_game(&self, game: &Game) -> StoreResult<()> {
        self.game_repo.create(game).await
    }

    async fn get_game(&self, game_id: Uuid) -> StoreResult<Option<Game>> {
        self.game_repo.find_by_id(game_id).await
    }

    async fn mark_game_ended(&self, game_id: Uuid) -> StoreResult<Game> {
        self.game_repo.mark_ended(game_id).await
    }

    async fn insert_buy_in(&self, buy_in: &BuyIn) -> StoreResult<()> {
        self.game_repo.add_buy_in(buy_in).await
    }

    async fn buy_ins_for_game(&self, game_id: Uuid) -> StoreResult<Vec<BuyIn>> {
        self.game_repo.buy_ins_for_game(game_id).await
    }

    async fn upsert_cash_out(&self, cash_out: &CashOut) -> StoreResult<()> {
        self.game_repo.upsert_cash_out(cash_out).await
    }

    async fn cash_outs_for_game(&self, game_id: Uuid) -> StoreResult<Vec<CashOut>> {
        self.game_repo.cash_outs_for_game(game_id).await
    }

    async fn insert_settlement(
        &self,
        settlement: &Settlement,
        entries: &[LedgerEntry],
    ) -> StoreResult<()> {
        self.settlement_repo.create(settlement, entries).await
    }

    async fn replace_settlement(
        &self,
        settlement: &Settlement,
        buy_ins: &[BuyIn],
        cash_outs: &[CashOut],
        entries: &[LedgerEntry],
    ) -> StoreResult<()> {
        self.settlement_repo
            .replace(settlement, buy_ins, cash_outs, entries)
            .await
    }

    async fn get_settlement(&self, game_id: Uuid) -> StoreResult<Option<Settlement>> {
        self.settlement_repo.find_by_game(game_id).await
    }

    async fn get_ledger_entry(&self, ledger_id: Uuid) -> StoreResult<Option<LedgerEntry>> {
        self.ledger_repo.find_by_id(ledger_id).await
    }

    async fn ledger_for_game(&self, game_id: Uuid) -> StoreResult<Vec<LedgerEntry>> {
        self.ledger_repo.find_by_game(game_id).await
    }

    async fn unpaid_ledger_for_user(&self, user_id: Uuid) -> StoreResult<Vec<LedgerEntry>> {
        self.ledger_repo.find_unpaid_for_user(user_id).await
    }

    async fn set_ledger_paid(&self, ledger_id: Uuid, paid: bool) -> StoreResult<LedgerEntry> {
        self.ledger_repo.set_paid(ledger_id, paid).await
    }

    async fn mark_ledger_paid_many(&self, ledger_ids: &[Uuid]) -> StoreResult<Vec<LedgerEntry>> {
        self.ledger_repo.mark_paid_many(ledger_ids).await
    }

    async fn insert_dispute(&self, dispute: &SettlementDispute) -> StoreResult<()> {
        self.dispute_repo.create(dispute).await
    }

    async fn get_dispute(&self, dispute_id: Uuid) -> StoreResult<Option<SettlementDispute>> {
        self.dispute_repo.find_by_id(dispute_id).await
    }

    async fn disputes_for_game(&self, game_id: Uuid) -> StoreResult<Vec<SettlementDispute>> {
        self.dispute_repo.find_by_game(game_id).await
    }

    async fn update_dispute(&self, dispute: &SettlementDispute) -> StoreResult<()> {
        self.dispute_repo.update(dispute).await
    }
}
