#![allow(dead_code)]

use async_trait::async_trait;
use kvitt_backend::models::*;
use kvitt_backend::repositories::*;
use kvitt_backend::services::{AuditTrailService, CheckoutRequest, CheckoutSession, PaymentGateway};
use kvitt_backend::websocket::WebSocketServer;
use kvitt_backend::{AppResult, AppState};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Parse a decimal literal
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("valid decimal literal")
}

/// Gateway double that records every checkout request
#[derive(Default)]
pub struct RecordingGateway {
    pub requests: Mutex<Vec<CheckoutRequest>>,
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        let mut requests = self.requests.lock().await;
        requests.push(request.clone());
        let checkout_id = format!("chk_{}", requests.len());
        Ok(CheckoutSession {
            checkout_url: format!("https://pay.test/{}", checkout_id),
            checkout_id,
        })
    }
}

/// Application wired over the in-memory store
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<RecordingGateway>,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let state = Arc::new(AppState::new(
            store.clone(),
            gateway.clone(),
            Arc::new(WebSocketServer::new()),
            Arc::new(AuditTrailService::disabled()),
        ));
        Self {
            store,
            gateway,
            state,
        }
    }

    pub async fn user(&self, name: &str) -> User {
        create_user(self.store.as_ref(), name).await
    }

    /// Game whose first player hosts; one chip is worth one currency unit.
    /// Each player is `(name, buy_in, chips)`; `None` chips means busted.
    pub async fn game(&self, players: &[(&str, &str, Option<&str>)]) -> GameFixture {
        seed_game(self.store.as_ref(), players).await
    }
}

/// A seeded game and its players, host first
pub struct GameFixture {
    pub game: Game,
    pub players: Vec<User>,
}

impl GameFixture {
    pub fn host(&self) -> &User {
        &self.players[0]
    }

    pub fn player(&self, index: usize) -> Uuid {
        self.players[index].id
    }
}

pub async fn create_user(store: &dyn SettlementStore, name: &str) -> User {
    let user = User::new(name);
    store.insert_user(&user).await.expect("Failed to insert user");
    user
}

pub async fn seed_game(
    store: &dyn SettlementStore,
    players: &[(&str, &str, Option<&str>)],
) -> GameFixture {
    let mut users = Vec::new();
    for (name, _, _) in players {
        users.push(create_user(store, name).await);
    }

    let game = Game::new(Uuid::new_v4(), users[0].id, "Friday night", dec("20"), 20);
    store.insert_game(&game).await.expect("Failed to insert game");

    for (user, (_, buy_in, chips)) in users.iter().zip(players) {
        store
            .insert_buy_in(&BuyIn::new(game.id, user.id, dec(buy_in), false))
            .await
            .expect("Failed to insert buy-in");
        if let Some(chips) = chips {
            store
                .upsert_cash_out(&CashOut::new(game.id, user.id, dec(chips)))
                .await
                .expect("Failed to insert cash-out");
        }
    }

    GameFixture {
        game,
        players: users,
    }
}

/// Repositories over a real database (used with `#[sqlx::test]`)
pub struct TestDatabase {
    pub pool: PgPool,
    pub store: Arc<PgStore>,
}

impl TestDatabase {
    /// Create TestDatabase from an existing pool
    pub async fn from_pool(pool: PgPool) -> Self {
        Self {
            store: Arc::new(PgStore::new(pool.clone())),
            pool,
        }
    }
}
