use crate::error::RepositoryError;
use crate::models::{DisputeCategory, DisputeStatus, SettlementDispute};
use chrono::NaiveDateTime;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(FromRow)]
struct DisputeRow {
    id: Uuid,
    game_id: Uuid,
    filed_by: Uuid,
    category: String,
    message: String,
    status: String,
    resolution_note: Option<String>,
    created_at: NaiveDateTime,
    resolved_at: Option<NaiveDateTime>,
}

impl TryFrom<DisputeRow> for SettlementDispute {
    type Error = RepositoryError;

    fn try_from(row: DisputeRow) -> Result<Self, Self::Error> {
        Ok(SettlementDispute {
            id: row.id,
            game_id: row.game_id,
            filed_by: row.filed_by,
            category: DisputeCategory::from_str(&row.category).map_err(RepositoryError::CorruptRow)?,
            message: row.message,
            status: DisputeStatus::from_str(&row.status).map_err(RepositoryError::CorruptRow)?,
            resolution_note: row.resolution_note,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

/// Repository for settlement disputes
pub struct DisputeRepository {
    pool: PgPool,
}

impl DisputeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a newly filed dispute
    pub async fn create(&self, dispute: &SettlementDispute) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO settlement_disputes
                (id, game_id, filed_by, category, message, status, resolution_note, created_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(dispute.id)
        .bind(dispute.game_id)
        .bind(dispute.filed_by)
        .bind(dispute.category.as_str())
        .bind(&dispute.message)
        .bind(dispute.status.as_str())
        .bind(&dispute.resolution_note)
        .bind(dispute.created_at)
        .bind(dispute.resolved_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SettlementDispute>, RepositoryError> {
        let row = sqlx::query_as::<_, DisputeRow>(
            r#"
            SELECT id, game_id, filed_by, category, message, status,
                   resolution_note, created_at, resolved_at
            FROM settlement_disputes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SettlementDispute::try_from).transpose()
    }

    pub async fn find_by_game(&self, game_id: Uuid) -> Result<Vec<SettlementDispute>, RepositoryError> {
        let rows = sqlx::query_as::<_, DisputeRow>(
            r#"
            SELECT id, game_id, filed_by, category, message, status,
                   resolution_note, created_at, resolved_at
            FROM settlement_disputes
            WHERE game_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SettlementDispute::try_from).collect()
    }

    /// Persist status changes of a dispute
    pub async fn update(&self, dispute: &SettlementDispute) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE settlement_disputes
            SET status = $2,
                resolution_note = $3,
                resolved_at = $4
            WHERE id = $1
            "#,
        )
        .bind(dispute.id)
        .bind(dispute.status.as_str())
        .bind(&dispute.resolution_note)
        .bind(dispute.resolved_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Dispute {} not found", dispute.id)));
        }

        Ok(())
    }
}
