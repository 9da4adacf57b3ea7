//! In-memory [`SettlementStore`] for development and tests.
//!
//! All state sits behind one `RwLock`, so every trait method is atomic with
//! respect to the others. That is what makes settlement insertion
//! at-most-once here.

use super::store::{SettlementStore, StoreResult};
use crate::error::RepositoryError;
use crate::models::{
    BuyIn, CashOut, Game, GameStatus, LedgerEntry, Settlement, SettlementDispute, User,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    games: HashMap<Uuid, Game>,
    buy_ins: Vec<BuyIn>,
    cash_outs: Vec<CashOut>,
    settlements: HashMap<Uuid, Settlement>,
    // insertion order doubles as creation order
    ledger: Vec<LedgerEntry>,
    disputes: Vec<SettlementDispute>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load ledger rows directly, bypassing settlement generation.
    ///
    /// Rows are stored as given, invalid ones included.
    pub async fn seed_ledger(&self, entries: impl IntoIterator<Item = LedgerEntry>) {
        let mut state = self.state.write().await;
        state.ledger.extend(entries);
    }
}

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

fn validate_entries(entries: &[LedgerEntry]) -> StoreResult<()> {
    for entry in entries {
        entry
            .validate()
            .map_err(|e| RepositoryError::InvalidInput(format!("Ledger entry {}: {}", entry.id, e)))?;
    }
    Ok(())
}

#[async_trait]
impl SettlementStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.id) {
            return Err(RepositoryError::Duplicate(format!("User {} exists", user.id)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn insert_game(&self, game: &Game) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.games.contains_key(&game.id) {
            return Err(RepositoryError::Duplicate(format!("Game {} exists", game.id)));
        }
        state.games.insert(game.id, game.clone());
        Ok(())
    }

    async fn get_game(&self, game_id: Uuid) -> StoreResult<Option<Game>> {
        Ok(self.state.read().await.games.get(&game_id).cloned())
    }

    async fn mark_game_ended(&self, game_id: Uuid) -> StoreResult<Game> {
        let mut state = self.state.write().await;
        let game = state
            .games
            .get_mut(&game_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Game {} not found", game_id)))?;
        game.status = GameStatus::Ended;
        if game.ended_at.is_none() {
            game.ended_at = Some(now());
        }
        Ok(game.clone())
    }

    async fn insert_buy_in(&self, buy_in: &BuyIn) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.games.contains_key(&buy_in.game_id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "Game {} not found",
                buy_in.game_id
            )));
        }
        state.buy_ins.push(buy_in.clone());
        Ok(())
    }

    async fn buy_ins_for_game(&self, game_id: Uuid) -> StoreResult<Vec<BuyIn>> {
        let state = self.state.read().await;
        Ok(state.buy_ins.iter().filter(|b| b.game_id == game_id).cloned().collect())
    }

    async fn upsert_cash_out(&self, cash_out: &CashOut) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.games.contains_key(&cash_out.game_id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "Game {} not found",
                cash_out.game_id
            )));
        }
        let existing = state
            .cash_outs
            .iter()
            .position(|c| c.game_id == cash_out.game_id && c.user_id == cash_out.user_id);
        match existing {
            Some(index) => state.cash_outs[index] = cash_out.clone(),
            None => state.cash_outs.push(cash_out.clone()),
        }
        Ok(())
    }

    async fn cash_outs_for_game(&self, game_id: Uuid) -> StoreResult<Vec<CashOut>> {
        let state = self.state.read().await;
        Ok(state.cash_outs.iter().filter(|c| c.game_id == game_id).cloned().collect())
    }

    async fn insert_settlement(
        &self,
        settlement: &Settlement,
        entries: &[LedgerEntry],
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.settlements.contains_key(&settlement.game_id) {
            return Err(RepositoryError::Duplicate(format!(
                "Settlement for game {} already exists",
                settlement.game_id
            )));
        }
        validate_entries(entries)?;
        state.settlements.insert(settlement.game_id, settlement.clone());
        state.ledger.extend_from_slice(entries);
        Ok(())
    }

    async fn replace_settlement(
        &self,
        settlement: &Settlement,
        buy_ins: &[BuyIn],
        cash_outs: &[CashOut],
        entries: &[LedgerEntry],
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let game_id = settlement.game_id;
        if !state.settlements.contains_key(&game_id) {
            return Err(RepositoryError::NotFound(format!(
                "Settlement for game {} not found",
                game_id
            )));
        }
        let paid_rows = state.ledger.iter().filter(|e| e.game_id == game_id && e.paid).count();
        if paid_rows > 0 {
            return Err(RepositoryError::ConstraintViolation(format!(
                "Game {} has {} paid ledger entries",
                game_id, paid_rows
            )));
        }
        validate_entries(entries)?;

        state.buy_ins.retain(|b| b.game_id != game_id);
        state.cash_outs.retain(|c| c.game_id != game_id);
        state.buy_ins.extend(buy_ins.iter().cloned().map(|mut b| {
            b.game_id = game_id;
            b
        }));
        state.cash_outs.extend(cash_outs.iter().cloned().map(|mut c| {
            c.game_id = game_id;
            c
        }));
        state.ledger.retain(|e| e.game_id != game_id);
        state.ledger.extend_from_slice(entries);
        state.settlements.insert(game_id, settlement.clone());
        Ok(())
    }

    async fn get_settlement(&self, game_id: Uuid) -> StoreResult<Option<Settlement>> {
        Ok(self.state.read().await.settlements.get(&game_id).cloned())
    }

    async fn get_ledger_entry(&self, ledger_id: Uuid) -> StoreResult<Option<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state.ledger.iter().find(|e| e.id == ledger_id).cloned())
    }

    async fn ledger_for_game(&self, game_id: Uuid) -> StoreResult<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state.ledger.iter().filter(|e| e.game_id == game_id).cloned().collect())
    }

    async fn unpaid_ledger_for_user(&self, user_id: Uuid) -> StoreResult<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state
            .ledger
            .iter()
            .filter(|e| !e.paid && e.involves(user_id))
            .cloned()
            .collect())
    }

    async fn set_ledger_paid(&self, ledger_id: Uuid, paid: bool) -> StoreResult<LedgerEntry> {
        let mut state = self.state.write().await;
        let entry = state
            .ledger
            .iter_mut()
            .find(|e| e.id == ledger_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Ledger entry {} not found", ledger_id)))?;
        entry.paid = paid;
        entry.paid_at = if paid { entry.paid_at.or_else(|| Some(now())) } else { None };
        Ok(entry.clone())
    }

    async fn mark_ledger_paid_many(&self, ledger_ids: &[Uuid]) -> StoreResult<Vec<LedgerEntry>> {
        let mut state = self.state.write().await;
        let wanted: HashSet<Uuid> = ledger_ids.iter().copied().collect();
        let found = state.ledger.iter().filter(|e| wanted.contains(&e.id)).count();
        if found != wanted.len() {
            return Err(RepositoryError::NotFound(format!(
                "{} of {} ledger entries not found",
                wanted.len() - found,
                wanted.len()
            )));
        }

        let paid_at = now();
        let mut updated = Vec::with_capacity(found);
        for entry in state.ledger.iter_mut().filter(|e| wanted.contains(&e.id)) {
            entry.paid = true;
            entry.paid_at = entry.paid_at.or(Some(paid_at));
            updated.push(entry.clone());
        }
        Ok(updated)
    }

    async fn insert_dispute(&self, dispute: &SettlementDispute) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.games.contains_key(&dispute.game_id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "Game {} not found",
                dispute.game_id
            )));
        }
        state.disputes.push(dispute.clone());
        Ok(())
    }

    async fn get_dispute(&self, dispute_id: Uuid) -> StoreResult<Option<SettlementDispute>> {
        let state = self.state.read().await;
        Ok(state.disputes.iter().find(|d| d.id == dispute_id).cloned())
    }

    async fn disputes_for_game(&self, game_id: Uuid) -> StoreResult<Vec<SettlementDispute>> {
        let state = self.state.read().await;
        Ok(state.disputes.iter().filter(|d| d.game_id == game_id).cloned().collect())
    }

    async fn update_dispute(&self, dispute: &SettlementDispute) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let existing = state
            .disputes
            .iter_mut()
            .find(|d| d.id == dispute.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Dispute {} not found", dispute.id)))?;
        *existing = dispute.clone();
        Ok(())
    }
}
