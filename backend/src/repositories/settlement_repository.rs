//! Repository for settlement records.
//!
//! A settlement and its ledger rows are always written in one transaction.

use super::game_repository::replace_inputs_tx;
use super::ledger_repository::insert_entries_tx;
use crate::error::RepositoryError;
use crate::models::{BuyIn, CashOut, LedgerEntry, Payment, PlayerGameResult, Settlement};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(FromRow)]
struct SettlementRow {
    id: Uuid,
    game_id: Uuid,
    group_id: Uuid,
    version: i32,
    results: Json<Vec<PlayerGameResult>>,
    payments: Json<Vec<Payment>>,
    total_buy_in: Decimal,
    total_cash_out: Decimal,
    discrepancy: Decimal,
    has_discrepancy: bool,
    digest: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl From<SettlementRow> for Settlement {
    fn from(row: SettlementRow) -> Self {
        Settlement {
            id: row.id,
            game_id: row.game_id,
            group_id: row.group_id,
            version: row.version,
            results: row.results.0,
            payments: row.payments.0,
            total_buy_in: row.total_buy_in,
            total_cash_out: row.total_cash_out,
            discrepancy: row.discrepancy,
            has_discrepancy: row.has_discrepancy,
            digest: row.digest,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct SettlementRepository {
    pool: PgPool,
}

impl SettlementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist the first settlement of a game.
    ///
    /// The unique key on `game_id` turns a concurrent second attempt into
    /// `RepositoryError::Duplicate`.
    pub async fn create(
        &self,
        settlement: &Settlement,
        entries: &[LedgerEntry],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO settlements
                (id, game_id, group_id, version, results, payments, total_buy_in,
                 total_cash_out, discrepancy, has_discrepancy, digest, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(settlement.id)
        .bind(settlement.game_id)
        .bind(settlement.group_id)
        .bind(settlement.version)
        .bind(Json(&settlement.results))
        .bind(Json(&settlement.payments))
        .bind(settlement.total_buy_in)
        .bind(settlement.total_cash_out)
        .bind(settlement.discrepancy)
        .bind(settlement.has_discrepancy)
        .bind(&settlement.digest)
        .bind(settlement.created_at)
        .bind(settlement.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_entries_tx(&mut tx, entries).await?;

        tx.commit().await?;

        Ok(())
    }

    /// Overwrite a game's inputs, settlement and ledger rows in one
    /// transaction. Nothing is written if any existing row is paid.
    pub async fn replace(
        &self,
        settlement: &Settlement,
        buy_ins: &[BuyIn],
        cash_outs: &[CashOut],
        entries: &[LedgerEntry],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_settlement(&mut tx, settlement.game_id).await?;

        let paid_rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ledger_entries WHERE game_id = $1 AND paid",
        )
        .bind(settlement.game_id)
        .fetch_one(&mut *tx)
        .await?;

        if paid_rows > 0 {
            tx.rollback().await?;
            return Err(RepositoryError::ConstraintViolation(format!(
                "Game {} has {} paid ledger entries",
                settlement.game_id, paid_rows
            )));
        }

        replace_inputs_tx(&mut tx, settlement.game_id, buy_ins, cash_outs).await?;

        sqlx::query("DELETE FROM ledger_entries WHERE game_id = $1")
            .bind(settlement.game_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE settlements
            SET version = $2,
                results = $3,
                payments = $4,
                total_buy_in = $5,
                total_cash_out = $6,
                discrepancy = $7,
                has_discrepancy = $8,
                digest = $9,
                updated_at = $10
            WHERE game_id = $1
            "#,
        )
        .bind(settlement.game_id)
        .bind(settlement.version)
        .bind(Json(&settlement.results))
        .bind(Json(&settlement.payments))
        .bind(settlement.total_buy_in)
        .bind(settlement.total_cash_out)
        .bind(settlement.discrepancy)
        .bind(settlement.has_discrepancy)
        .bind(&settlement.digest)
        .bind(settlement.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_entries_tx(&mut tx, entries).await?;

        tx.commit().await?;

        Ok(())
    }

    /// Find the settlement of a game
    pub async fn find_by_game(&self, game_id: Uuid) -> Result<Option<Settlement>, RepositoryError> {
        let row = sqlx::query_as::<_, SettlementRow>(
            r#"
            SELECT id, game_id, group_id, version, results, payments, total_buy_in,
                   total_cash_out, discrepancy, has_discrepancy, digest, created_at, updated_at
            FROM settlements
            WHERE game_id = $1
            "#,
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Settlement::from))
    }
}

async fn lock_settlement(
    tx: &mut Transaction<'_, Postgres>,
    game_id: Uuid,
) -> Result<(), RepositoryError> {
    sqlx::query("SELECT id FROM settlements WHERE game_id = $1 FOR UPDATE")
        .bind(game_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Settlement for game {} not found", game_id)))?;

    Ok(())
}
