//! Repository for ledger entries

use crate::error::RepositoryError;
use crate::models::LedgerEntry;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(FromRow)]
pub(crate) struct LedgerRow {
    id: Uuid,
    game_id: Uuid,
    group_id: Uuid,
    from_user_id: Uuid,
    to_user_id: Uuid,
    amount: Decimal,
    paid: bool,
    created_at: NaiveDateTime,
    paid_at: Option<NaiveDateTime>,
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        LedgerEntry {
            id: row.id,
            game_id: row.game_id,
            group_id: row.group_id,
            from_user_id: row.from_user_id,
            to_user_id: row.to_user_id,
            amount: row.amount,
            paid: row.paid,
            created_at: row.created_at,
            paid_at: row.paid_at,
        }
    }
}

const LEDGER_COLUMNS: &str =
    "id, game_id, group_id, from_user_id, to_user_id, amount, paid, created_at, paid_at";

pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a ledger entry by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<LedgerEntry>, RepositoryError> {
        let row = sqlx::query_as::<_, LedgerRow>(&format!(
            "SELECT {} FROM ledger_entries WHERE id = $1",
            LEDGER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LedgerEntry::from))
    }

    /// All rows produced by a game's settlement
    pub async fn find_by_game(&self, game_id: Uuid) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, LedgerRow>(&format!(
            "SELECT {} FROM ledger_entries WHERE game_id = $1 ORDER BY created_at ASC, id ASC",
            LEDGER_COLUMNS
        ))
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }

    /// Unpaid rows on either side of a user
    pub async fn find_unpaid_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, LedgerRow>(&format!(
            r#"
            SELECT {}
            FROM ledger_entries
            WHERE NOT paid AND (from_user_id = $1 OR to_user_id = $1)
            ORDER BY created_at ASC, id ASC
            "#,
            LEDGER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }

    /// Set or clear the paid flag of one row
    pub async fn set_paid(&self, id: Uuid, paid: bool) -> Result<LedgerEntry, RepositoryError> {
        let row = sqlx::query_as::<_, LedgerRow>(&format!(
            r#"
            UPDATE ledger_entries
            SET paid = $2,
                paid_at = CASE WHEN $2 THEN COALESCE(paid_at, NOW()) ELSE NULL END
            WHERE id = $1
            RETURNING {}
            "#,
            LEDGER_COLUMNS
        ))
        .bind(id)
        .bind(paid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Ledger entry {} not found", id)))?;

        Ok(row.into())
    }

    /// Mark a batch of rows paid; all or nothing
    pub async fn mark_paid_many(&self, ids: &[Uuid]) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let expected = ids.iter().collect::<HashSet<_>>().len();
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, LedgerRow>(&format!(
            r#"
            UPDATE ledger_entries
            SET paid = TRUE,
                paid_at = COALESCE(paid_at, NOW())
            WHERE id = ANY($1)
            RETURNING {}
            "#,
            LEDGER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?;

        if rows.len() != expected {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!(
                "{} of {} ledger entries not found",
                expected - rows.len(),
                expected
            )));
        }

        tx.commit().await?;

        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }
}

/// Insert rows inside an open transaction
pub(crate) async fn insert_entries_tx(
    tx: &mut Transaction<'_, Postgres>,
    entries: &[LedgerEntry],
) -> Result<(), RepositoryError> {
    for entry in entries {
        entry
            .validate()
            .map_err(|e| RepositoryError::InvalidInput(format!("Ledger entry {}: {}", entry.id, e)))?;
        sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (id, game_id, group_id, from_user_id, to_user_id, amount, paid, created_at, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.game_id)
        .bind(entry.group_id)
        .bind(entry.from_user_id)
        .bind(entry.to_user_id)
        .bind(entry.amount)
        .bind(entry.paid)
        .bind(entry.created_at)
        .bind(entry.paid_at)
        .execute(&mut *tx)
        .await?;
    }

    Ok(())
}
