//! HTTP rendering of [`AppError`]

use crate::error::AppError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let message = if err.status_code() >= 500 && err.status_code() != 502 {
            "Internal server error".to_string()
        } else {
            err.to_string()
        };

        Self {
            code: err.code().to_string(),
            message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_internal_details_hidden() {
        let body = ErrorResponse::from(&AppError::Message("pool exhausted".into()));
        assert_eq!(body.code, "internal_error");
        assert_eq!(body.message, "Internal server error");
    }

    #[test]
    fn test_under_review_status() {
        let response = AppError::SettlementUnderReview(Uuid::nil()).into_response();
        assert_eq!(response.status(), StatusCode::LOCKED);
    }
}
