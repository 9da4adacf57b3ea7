//! Kvitt Backend Library
//!
//! Settlement and debt-netting for poker game nights: when a game ends its
//! net positions are settled into pairwise payments, and a user's unpaid
//! debts are netted across games per counterparty. This module exposes the
//! backend components for use by tests and other consumers.

pub mod api;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repositories::SettlementStore;
use services::{AuditTrailService, LedgerService, PaymentGateway, SettlementService};
use std::sync::Arc;
use websocket::WebSocketServer;

/// Application state containing the store and services
pub struct AppState {
    pub store: Arc<dyn SettlementStore>,
    pub ledger: Arc<LedgerService>,
    pub settlements: Arc<SettlementService>,
    pub ws_server: Arc<WebSocketServer>,
    pub audit: Arc<AuditTrailService>,
}

impl AppState {
    /// Wire services on top of a store
    pub fn new(
        store: Arc<dyn SettlementStore>,
        gateway: Arc<dyn PaymentGateway>,
        ws_server: Arc<WebSocketServer>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        let ledger = Arc::new(LedgerService::new(store.clone()));
        let settlements = Arc::new(SettlementService::new(
            store.clone(),
            ledger.clone(),
            gateway,
            ws_server.clone(),
            audit.clone(),
        ));

        Self {
            store,
            ledger,
            settlements,
            ws_server,
            audit,
        }
    }
}
