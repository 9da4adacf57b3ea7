//! Read-side views over a user's ledger

use crate::engine;
use crate::error::AppResult;
use crate::models::{ConsolidatedReport, LedgerEntry, UserRef};
use crate::repositories::SettlementStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// One unpaid row as stored, plus the other party seen from the requesting user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub counterparty: UserRef,
}

/// Ungrouped balances: what others owe the user and what the user owes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyBalances {
    pub owed: Vec<LedgerLine>,
    pub owes: Vec<LedgerLine>,
}

pub struct LedgerService {
    store: Arc<dyn SettlementStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn SettlementStore>) -> Self {
        Self { store }
    }

    /// Net every unpaid row of `user_id` per counterparty
    pub async fn consolidated(&self, user_id: Uuid) -> AppResult<ConsolidatedReport> {
        let (entries, directory) = self.load(user_id).await?;
        let report = engine::consolidate(user_id, &entries, &directory);

        for warning in &report.warnings {
            warn!(
                "Skipped ledger entry {} while consolidating for {}: {:?}",
                warning.ledger_id(),
                user_id,
                warning
            );
        }

        Ok(report)
    }

    /// Unpaid rows split by direction, without netting
    pub async fn balances(&self, user_id: Uuid) -> AppResult<LegacyBalances> {
        let (entries, directory) = self.load(user_id).await?;
        let mut balances = LegacyBalances::default();

        for entry in entries {
            let Some(counterparty) = entry.counterparty_of(user_id) else {
                continue;
            };
            let Some(user) = directory.get(&counterparty) else {
                warn!("Ledger entry {} names unknown user {}", entry.id, counterparty);
                continue;
            };
            let owed_to_user = entry.to_user_id == user_id;
            let line = LedgerLine {
                counterparty: user.clone(),
                entry,
            };
            if owed_to_user {
                balances.owed.push(line);
            } else {
                balances.owes.push(line);
            }
        }

        Ok(balances)
    }

    async fn load(
        &self,
        user_id: Uuid,
    ) -> AppResult<(Vec<LedgerEntry>, HashMap<Uuid, UserRef>)> {
        let entries = self.store.unpaid_ledger_for_user(user_id).await?;

        let mut ids: Vec<Uuid> = Vec::new();
        for entry in &entries {
            for id in [entry.from_user_id, entry.to_user_id] {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }

        let directory = self
            .store
            .users_by_ids(&ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user.summary()))
            .collect();

        Ok((entries, directory))
    }
}
