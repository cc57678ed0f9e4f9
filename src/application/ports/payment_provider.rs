use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app_error::AppResult;

// ============================================================================
// Port Types - Provider-agnostic domain types
// ============================================================================

/// Unique identifier for a customer in a payment provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// URLs for checkout redirects
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

/// Result of creating a checkout session
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub session_id: String,
    pub url: Option<String>,
}

/// One priced line of a completed checkout.
#[derive(Debug, Clone)]
pub struct CheckoutLineItem {
    pub price_id: Option<String>,
    /// Unit price in minor units (cents).
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
}

/// A checkout session as re-fetched from the provider, with its line items expanded.
#[derive(Debug, Clone)]
pub struct CheckoutSessionDetails {
    pub id: String,
    pub customer: Option<CustomerId>,
    pub line_items: Vec<CheckoutLineItem>,
}

impl CheckoutSessionDetails {
    /// Unit amount of the first line item, which carries the subscription price.
    pub fn unit_amount_cents(&self) -> Option<i64> {
        self.line_items.first().and_then(|item| item.unit_amount)
    }

    pub fn currency(&self) -> Option<&str> {
        self.line_items
            .first()
            .and_then(|item| item.currency.as_deref())
    }
}

// ============================================================================
// Port
// ============================================================================

/// Everything the core needs from the external payment provider.
#[async_trait]
pub trait PaymentProviderPort: Send + Sync {
    /// Verify that a webhook body was signed with the shared secret.
    ///
    /// Returns `AppError::SignatureInvalid` on any mismatch.
    fn verify_webhook(&self, payload: &str, signature_header: &str) -> AppResult<()>;

    /// Re-fetch a checkout session with its line items and prices.
    ///
    /// Transport failures and timeouts map to `AppError::ExternalService`.
    async fn retrieve_checkout_session(&self, session_id: &str)
    -> AppResult<CheckoutSessionDetails>;

    async fn create_customer(&self, email: &str, name: Option<&str>) -> AppResult<CustomerId>;

    async fn create_checkout_session(
        &self,
        customer_id: &CustomerId,
        price_id: &str,
        urls: &CheckoutUrls,
    ) -> AppResult<CheckoutResult>;
}
