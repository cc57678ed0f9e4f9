use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};
use crate::infra::error::InfraError;
use crate::infra::http_client;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
}

impl StripeClient {
    pub fn new(secret_key: SecretString, timeout: Duration) -> Result<Self, InfraError> {
        let client = http_client::try_build_client_with_timeout(timeout)
            .map_err(InfraError::HttpClient)?;
        Ok(Self { client, secret_key })
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    // ========================================================================
    // Customers
    // ========================================================================

    pub async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> AppResult<StripeCustomer> {
        let mut params: Vec<(&str, &str)> = vec![("email", email)];
        if let Some(name) = name {
            params.push(("name", name));
        }

        let response = self
            .client
            .post(format!("{}/customers", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .form(&params)
            .send()
            .await
            .map_err(request_failed)?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Checkout Sessions
    // ========================================================================

    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> AppResult<StripeCheckoutSession> {
        let params = [
            ("customer", customer_id),
            ("mode", "subscription"),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];

        let response = self
            .client
            .post(format!("{}/checkout/sessions", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .form(&params)
            .send()
            .await
            .map_err(request_failed)?;

        self.handle_response(response).await
    }

    /// Fetch a checkout session with its line items (and their prices) expanded.
    pub async fn get_checkout_session(&self, session_id: &str) -> AppResult<StripeCheckoutSession> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", STRIPE_API_BASE, session_id))
            .header("Authorization", self.auth_header())
            .query(&[("expand[]", "line_items")])
            .send()
            .await
            .map_err(request_failed)?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Webhook Signature Verification
    // ========================================================================

    /// Verify a `t=<unix>,v1=<hex>` signature header over `"{t}.{payload}"`.
    pub fn verify_webhook_signature(
        payload: &str,
        signature_header: &str,
        webhook_secret: &str,
        tolerance_secs: i64,
    ) -> AppResult<()> {
        verify_signature_at(
            payload,
            signature_header,
            webhook_secret,
            tolerance_secs,
            chrono::Utc::now().timestamp(),
        )
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Stripe API error");

            if let Ok(error) = serde_json::from_str::<StripeErrorResponse>(&body) {
                let message = error.error.message.unwrap_or(error.error.error_type);
                // 4xx means the request itself is wrong; retrying will not fix it.
                if status.is_client_error() && status.as_u16() != 429 {
                    return Err(AppError::ValidationError(format!("Stripe error: {}", message)));
                }
                return Err(AppError::ExternalService(format!("Stripe error: {}", message)));
            }

            return Err(AppError::ExternalService(format!(
                "Stripe API error: {}",
                status
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Stripe response");
            AppError::ExternalService(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

fn request_failed(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        tracing::warn!(error = %e, "Stripe request timed out");
        return AppError::ExternalService("Stripe request timed out".into());
    }
    AppError::ExternalService(format!("Stripe request failed: {}", e))
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn compute_signature(timestamp: i64, payload: &str, webhook_secret: &str) -> AppResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".into()))?;
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify_signature_at(
    payload: &str,
    signature_header: &str,
    webhook_secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> AppResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = Some(value),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        tracing::debug!("Webhook signature header has no timestamp");
        return Err(AppError::SignatureInvalid);
    };
    if signatures.is_empty() {
        tracing::debug!("Webhook signature header has no v1 signature");
        return Err(AppError::SignatureInvalid);
    }
    let ts: i64 = timestamp.parse().map_err(|_| AppError::SignatureInvalid)?;

    let expected = compute_signature(ts, payload, webhook_secret)?;
    if !signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected))
    {
        tracing::debug!("Webhook signature mismatch");
        return Err(AppError::SignatureInvalid);
    }

    if (now - ts).abs() > tolerance_secs {
        tracing::debug!(age_secs = now - ts, "Webhook timestamp outside tolerance");
        return Err(AppError::SignatureInvalid);
    }
    Ok(())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub customer: Option<String>,
    pub currency: Option<String>,
    pub line_items: Option<StripeLineItemList>,
}

#[derive(Debug, Deserialize)]
pub struct StripeLineItemList {
    pub data: Vec<StripeLineItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeLineItem {
    pub id: String,
    pub currency: Option<String>,
    pub price: Option<StripePrice>,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub unit_amount: Option<i64>,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Deserialize)]
pub struct StripeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
}
