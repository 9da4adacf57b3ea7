//! Endpoint handlers. Each one is a thin shell over a service call.

use super::dto::{
    ConfirmPaymentRequest, FileDisputeRequest, HealthResponse, PayRequest,
    PrepareNetPaymentRequest, ResolveDisputeRequest, UpdateLedgerRequest,
};
use super::extractors::Caller;
use crate::error::AppResult;
use crate::models::{ConsolidatedReport, LedgerEntry, SettlementDispute};
use crate::services::{CheckoutSession, LegacyBalances, NetPaymentCheckout, SettlementView};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// Liveness check
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

// =============================================================================
// Settlements
// =============================================================================

pub async fn end_game(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(game_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<SettlementView>)> {
    let view = state.settlements.end_game(game_id, caller).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_settlement(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(game_id): Path<Uuid>,
) -> AppResult<Json<SettlementView>> {
    Ok(Json(state.settlements.get_settlement(game_id, caller).await?))
}

// =============================================================================
// Disputes
// =============================================================================

pub async fn file_dispute(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(game_id): Path<Uuid>,
    Json(body): Json<FileDisputeRequest>,
) -> AppResult<(StatusCode, Json<SettlementDispute>)> {
    let dispute = state
        .settlements
        .file_dispute(game_id, caller, body.category, &body.message)
        .await?;
    Ok((StatusCode::CREATED, Json(dispute)))
}

pub async fn list_disputes(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(game_id): Path<Uuid>,
) -> AppResult<Json<Vec<SettlementDispute>>> {
    Ok(Json(state.settlements.list_disputes(game_id, caller).await?))
}

pub async fn review_dispute(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(dispute_id): Path<Uuid>,
) -> AppResult<Json<SettlementDispute>> {
    Ok(Json(state.settlements.start_review(dispute_id, caller).await?))
}

pub async fn resolve_dispute(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(dispute_id): Path<Uuid>,
    Json(body): Json<ResolveDisputeRequest>,
) -> AppResult<Json<SettlementDispute>> {
    let dispute = state
        .settlements
        .resolve_dispute(dispute_id, caller, body.resolution_note, body.corrections)
        .await?;
    Ok(Json(dispute))
}

// =============================================================================
// Ledger
// =============================================================================

pub async fn consolidated_detailed(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> AppResult<Json<ConsolidatedReport>> {
    Ok(Json(state.ledger.consolidated(caller).await?))
}

pub async fn balances(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> AppResult<Json<LegacyBalances>> {
    Ok(Json(state.ledger.balances(caller).await?))
}

pub async fn update_ledger_entry(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(ledger_id): Path<Uuid>,
    Json(body): Json<UpdateLedgerRequest>,
) -> AppResult<Json<LedgerEntry>> {
    Ok(Json(state.settlements.set_paid(ledger_id, caller, body.paid).await?))
}

// =============================================================================
// Payments
// =============================================================================

pub async fn pay_ledger_entry(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(ledger_id): Path<Uuid>,
    Json(body): Json<PayRequest>,
) -> AppResult<Json<CheckoutSession>> {
    let session = state
        .settlements
        .initiate_payment(ledger_id, caller, &body.origin_url)
        .await?;
    Ok(Json(session))
}

pub async fn prepare_net_payment(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(body): Json<PrepareNetPaymentRequest>,
) -> AppResult<Json<NetPaymentCheckout>> {
    let checkout = state
        .settlements
        .prepare_net_payment(caller, body.other_user_id, &body.ledger_ids, &body.origin_url)
        .await?;
    Ok(Json(checkout))
}

pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(body): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    Ok(Json(
        state
            .settlements
            .confirm_payment(caller, &body.ledger_ids)
            .await?,
    ))
}
