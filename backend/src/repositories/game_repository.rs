//! Repository for games and their buy-in / cash-out inputs

use crate::error::RepositoryError;
use crate::models::{BuyIn, CashOut, Game, GameStatus};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(FromRow)]
struct GameRow {
    id: Uuid,
    group_id: Uuid,
    host_id: Uuid,
    title: String,
    status: String,
    buy_in_amount: Decimal,
    chips_per_buy_in: i32,
    created_at: NaiveDateTime,
    ended_at: Option<NaiveDateTime>,
}

impl TryFrom<GameRow> for Game {
    type Error = RepositoryError;

    fn try_from(row: GameRow) -> Result<Self, Self::Error> {
        Ok(Game {
            id: row.id,
            group_id: row.group_id,
            host_id: row.host_id,
            title: row.title,
            status: GameStatus::from_str(&row.status).map_err(RepositoryError::CorruptRow)?,
            buy_in_amount: row.buy_in_amount,
            chips_per_buy_in: row.chips_per_buy_in,
            created_at: row.created_at,
            ended_at: row.ended_at,
        })
    }
}

#[derive(FromRow)]
struct BuyInRow {
    id: Uuid,
    game_id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    host_administered: bool,
    created_at: NaiveDateTime,
}

impl From<BuyInRow> for BuyIn {
    fn from(row: BuyInRow) -> Self {
        BuyIn {
            id: row.id,
            game_id: row.game_id,
            user_id: row.user_id,
            amount: row.amount,
            host_administered: row.host_administered,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct CashOutRow {
    game_id: Uuid,
    user_id: Uuid,
    chips: Decimal,
    created_at: NaiveDateTime,
}

impl From<CashOutRow> for CashOut {
    fn from(row: CashOutRow) -> Self {
        CashOut {
            game_id: row.game_id,
            user_id: row.user_id,
            chips: row.chips,
            created_at: row.created_at,
        }
    }
}

/// Repository for game data access
pub struct GameRepository {
    pool: PgPool,
}

impl GameRepository {
    /// Create a new GameRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Games
    // =========================================================================

    /// Insert a new game
    pub async fn create(&self, game: &Game) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO games
                (id, group_id, host_id, title, status, buy_in_amount, chips_per_buy_in, created_at, ended_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(game.id)
        .bind(game.group_id)
        .bind(game.host_id)
        .bind(&game.title)
        .bind(game.status.as_str())
        .bind(game.buy_in_amount)
        .bind(game.chips_per_buy_in)
        .bind(game.created_at)
        .bind(game.ended_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Find a game by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Game>, RepositoryError> {
        let row = sqlx::query_as::<_, GameRow>(
            r#"
            SELECT id, group_id, host_id, title, status, buy_in_amount,
                   chips_per_buy_in, created_at, ended_at
            FROM games
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Game::try_from).transpose()
    }

    /// Mark a game ended, keeping the first end timestamp
    pub async fn mark_ended(&self, id: Uuid) -> Result<Game, RepositoryError> {
        let row = sqlx::query_as::<_, GameRow>(
            r#"
            UPDATE games
            SET status = 'ended',
                ended_at = COALESCE(ended_at, NOW())
            WHERE id = $1
            RETURNING id, group_id, host_id, title, status, buy_in_amount,
                      chips_per_buy_in, created_at, ended_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Game {} not found", id)))?;

        Game::try_from(row)
    }

    // =========================================================================
    // Buy-ins and cash-outs
    // =========================================================================

    /// Record a buy-in
    pub async fn add_buy_in(&self, buy_in: &BuyIn) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO buy_ins (id, game_id, user_id, amount, host_administered, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(buy_in.id)
        .bind(buy_in.game_id)
        .bind(buy_in.user_id)
        .bind(buy_in.amount)
        .bind(buy_in.host_administered)
        .bind(buy_in.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All buy-ins of a game in the order they were made
    pub async fn buy_ins_for_game(&self, game_id: Uuid) -> Result<Vec<BuyIn>, RepositoryError> {
        let rows = sqlx::query_as::<_, BuyInRow>(
            r#"
            SELECT id, game_id, user_id, amount, host_administered, created_at
            FROM buy_ins
            WHERE game_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(BuyIn::from).collect())
    }

    /// Insert or overwrite a player's cash-out
    pub async fn upsert_cash_out(&self, cash_out: &CashOut) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO cash_outs (game_id, user_id, chips, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (game_id, user_id)
            DO UPDATE SET chips = EXCLUDED.chips, created_at = EXCLUDED.created_at
            "#,
        )
        .bind(cash_out.game_id)
        .bind(cash_out.user_id)
        .bind(cash_out.chips)
        .bind(cash_out.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All cash-outs of a game in the order they were recorded
    pub async fn cash_outs_for_game(&self, game_id: Uuid) -> Result<Vec<CashOut>, RepositoryError> {
        let rows = sqlx::query_as::<_, CashOutRow>(
            r#"
            SELECT game_id, user_id, chips, created_at
            FROM cash_outs
            WHERE game_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CashOut::from).collect())
    }
}

/// Swap a game's buy-ins and cash-outs inside the caller's transaction
pub(crate) async fn replace_inputs_tx(
    tx: &mut Transaction<'_, Postgres>,
    game_id: Uuid,
    buy_ins: &[BuyIn],
    cash_outs: &[CashOut],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM buy_ins WHERE game_id = $1")
        .bind(game_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM cash_outs WHERE game_id = $1")
        .bind(game_id)
        .execute(&mut *tx)
        .await?;

    for buy_in in buy_ins {
        insert_buy_in_tx(tx, game_id, buy_in).await?;
    }

    for cash_out in cash_outs {
        sqlx::query(
            r#"
            INSERT INTO cash_outs (game_id, user_id, chips, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(game_id)
        .bind(cash_out.user_id)
        .bind(cash_out.chips)
        .bind(cash_out.created_at)
        .execute(&mut *tx)
        .await?;
    }

    Ok(())
}

async fn insert_buy_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    game_id: Uuid,
    buy_in: &BuyIn,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO buy_ins (id, game_id, user_id, amount, host_administered, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(buy_in.id)
    .bind(game_id)
    .bind(buy_in.user_id)
    .bind(buy_in.amount)
    .bind(buy_in.host_administered)
    .bind(buy_in.created_at)
    .execute(&mut *tx)
    .await?;

    Ok(())
}
