//! Hand-off to the external payment gateway.
//!
//! The backend never moves money. It asks the gateway for a checkout session
//! and returns the URL; the gateway later reports success through
//! `POST /payments/confirm`.

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// What the gateway needs to open a checkout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutRequest {
    pub payer_id: Uuid,
    pub payee_id: Uuid,
    pub amount: Decimal,
    /// Rows to mark paid once the gateway confirms
    pub ledger_ids: Vec<Uuid>,
    /// Where the gateway sends the payer back to
    pub origin_url: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub checkout_id: String,
    pub checkout_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession>;
}

/// Gateway reached over HTTP at `PAYMENT_GATEWAY_URL`
pub struct HttpPaymentGateway {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        let url = format!("{}/checkout-sessions", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!("Payment gateway unreachable: {}", e);
                AppError::ExternalService(format!("Payment gateway unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Payment gateway returned {}: {}", status, body);
            return Err(AppError::ExternalService(format!(
                "Payment gateway returned {}",
                status
            )));
        }

        let session = response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid gateway response: {}", e)))?;

        info!(
            "Checkout {} opened for {} ledger entries ({})",
            session.checkout_id,
            request.ledger_ids.len(),
            request.amount
        );

        Ok(session)
    }
}

/// Used when no gateway URL is configured; every checkout fails
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn create_checkout(&self, _request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        Err(AppError::ExternalService(
            "Payment gateway is not configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let gateway = HttpPaymentGateway::new("https://pay.example.com/");
        assert_eq!(gateway.base_url, "https://pay.example.com");
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_fails() {
        let request = CheckoutRequest {
            payer_id: Uuid::new_v4(),
            payee_id: Uuid::new_v4(),
            amount: Decimal::new(1000, 2),
            ledger_ids: vec![Uuid::new_v4()],
            origin_url: "https://app.example.com".to_string(),
            description: "test".to_string(),
        };
        let err = UnconfiguredGateway.create_checkout(&request).await.unwrap_err();
        assert_eq!(err.status_code(), 502);
    }
}
