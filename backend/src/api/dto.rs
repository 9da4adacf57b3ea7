//! Request and response bodies

use crate::models::DisputeCategory;
use crate::services::CorrectedInputs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDisputeRequest {
    pub category: DisputeCategory,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveDisputeRequest {
    #[serde(default)]
    pub resolution_note: Option<String>,
    /// When present, settlement is recomputed from these inputs
    #[serde(default)]
    pub corrections: Option<CorrectedInputs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLedgerRequest {
    pub paid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayRequest {
    pub origin_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareNetPaymentRequest {
    pub other_user_id: Uuid,
    pub ledger_ids: Vec<Uuid>,
    pub origin_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub ledger_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
}
