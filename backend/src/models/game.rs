use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Game status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Active,
    Ended,
}

impl GameStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "active" => Ok(GameStatus::Active),
            "ended" => Ok(GameStatus::Ended),
            _ => Err(format!("Invalid game status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Active => "active",
            GameStatus::Ended => "ended",
        }
    }
}

impl From<GameStatus> for String {
    fn from(status: GameStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A poker game night inside a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub group_id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub status: GameStatus,
    /// Currency paid for one standard buy-in
    pub buy_in_amount: Decimal,
    /// Chips handed out for one standard buy-in
    pub chips_per_buy_in: i32,
    pub created_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
}

impl Game {
    /// Create a new active Game
    pub fn new(
        group_id: Uuid,
        host_id: Uuid,
        title: impl Into<String>,
        buy_in_amount: Decimal,
        chips_per_buy_in: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            host_id,
            title: title.into(),
            status: GameStatus::Active,
            buy_in_amount,
            chips_per_buy_in,
            created_at: chrono::Utc::now().naive_utc(),
            ended_at: None,
        }
    }

    /// Currency value of a single chip.
    ///
    /// Returns `None` when the game has no chips configured.
    pub fn chip_value(&self) -> Option<Decimal> {
        if self.chips_per_buy_in <= 0 {
            return None;
        }
        Some(self.buy_in_amount / Decimal::from(self.chips_per_buy_in))
    }

    pub fn is_ended(&self) -> bool {
        self.status == GameStatus::Ended
    }
}

/// One buy-in (or rebuy) recorded for a player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyIn {
    pub id: Uuid,
    pub game_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    /// Recorded by the host on the player's behalf
    pub host_administered: bool,
    pub created_at: NaiveDateTime,
}

impl BuyIn {
    pub fn new(game_id: Uuid, user_id: Uuid, amount: Decimal, host_administered: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            user_id,
            amount,
            host_administered,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Chips a player returned when leaving the table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashOut {
    pub game_id: Uuid,
    pub user_id: Uuid,
    pub chips: Decimal,
    pub created_at: NaiveDateTime,
}

impl CashOut {
    pub fn new(game_id: Uuid, user_id: Uuid, chips: Decimal) -> Self {
        Self {
            game_id,
            user_id,
            chips,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_value() {
        let game = Game::new(Uuid::new_v4(), Uuid::new_v4(), "Friday", Decimal::new(20, 0), 200);
        assert_eq!(game.chip_value(), Some(Decimal::new(1, 1)));
    }

    #[test]
    fn test_chip_value_without_chips() {
        let game = Game::new(Uuid::new_v4(), Uuid::new_v4(), "Friday", Decimal::new(20, 0), 0);
        assert_eq!(game.chip_value(), None);
    }

    #[test]
    fn test_game_status_conversion() {
        assert_eq!(GameStatus::from_str("ENDED"), Ok(GameStatus::Ended));
        assert_eq!(GameStatus::Active.as_str(), "active");
        assert!(GameStatus::from_str("paused").is_err());
    }
}
