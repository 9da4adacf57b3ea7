//! REST API
//!
//! ```text
//! POST  /games/:game_id/end                 end game, generate settlement
//! GET   /games/:game_id/settlement          settlement + state
//! POST  /games/:game_id/settlement/dispute  file dispute
//! GET   /games/:game_id/settlement/disputes list disputes
//! POST  /disputes/:dispute_id/review        host starts review
//! POST  /disputes/:dispute_id/resolve       host resolves, optionally recomputes
//! GET   /ledger/consolidated-detailed       cross-game netted balances
//! GET   /ledger/balances                    ungrouped owed / owes
//! PATCH /ledger/:ledger_id                  toggle paid
//! POST  /settlements/:ledger_id/pay         checkout for one entry
//! POST  /ledger/pay-net/prepare             checkout for a consolidated balance
//! POST  /payments/confirm                   gateway confirmation
//! ```
//!
//! The caller is taken from the `x-user-id` header.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;

use crate::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::ErrorResponse;
pub use extractors::{Caller, USER_ID_HEADER};

/// Routes without middleware
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Settlements
        .route("/games/:game_id/end", post(handlers::end_game))
        .route("/games/:game_id/settlement", get(handlers::get_settlement))
        // Disputes
        .route(
            "/games/:game_id/settlement/dispute",
            post(handlers::file_dispute),
        )
        .route(
            "/games/:game_id/settlement/disputes",
            get(handlers::list_disputes),
        )
        .route("/disputes/:dispute_id/review", post(handlers::review_dispute))
        .route(
            "/disputes/:dispute_id/resolve",
            post(handlers::resolve_dispute),
        )
        // Ledger
        .route(
            "/ledger/consolidated-detailed",
            get(handlers::consolidated_detailed),
        )
        .route("/ledger/balances", get(handlers::balances))
        .route("/ledger/pay-net/prepare", post(handlers::prepare_net_payment))
        .route("/ledger/:ledger_id", patch(handlers::update_ledger_entry))
        // Payments
        .route("/settlements/:ledger_id/pay", post(handlers::pay_ledger_entry))
        .route("/payments/confirm", post(handlers::confirm_payment))
}

/// Full router with tracing and CORS
pub fn create_router(state: Arc<AppState>) -> Router {
    routes()
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
}
