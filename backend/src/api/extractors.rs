//! Request extractors

use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the caller's user id, set by the authenticating proxy
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf the request is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))?;

        let raw = value
            .to_str()
            .map_err(|_| AppError::Validation(format!("Malformed {} header", USER_ID_HEADER)))?;

        Ok(Caller(Uuid::parse_str(raw.trim())?))
    }
}
