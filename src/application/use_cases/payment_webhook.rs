//! Reconciliation of payment provider notifications.
//!
//! Deliveries are at-least-once and may arrive out of order. A delivery is applied at
//! most once: the provider event id is claimed in the same transaction that writes the
//! subscription and payment, so a redelivery (or a concurrent duplicate) finds the claim
//! and is acknowledged without touching state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::payment_provider::PaymentProviderPort;
use crate::application::use_cases::payment::PaymentProfile;
use crate::application::use_cases::subscription::SubscriptionProfile;
use crate::application::use_cases::user::UserRepoTrait;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

// ============================================================================
// Types
// ============================================================================

/// The provider's event envelope. Only the fields this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

impl WebhookEnvelope {
    pub fn parse(payload: &str) -> AppResult<Self> {
        serde_json::from_str(payload)
            .map_err(|e| AppError::ValidationError(format!("Invalid webhook payload: {}", e)))
    }

    fn object_str(&self, key: &str) -> Option<&str> {
        self.data.object.get(key).and_then(|v| v.as_str())
    }
}

/// Everything needed to apply one paid checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReconciliation {
    pub provider_event_id: String,
    pub event_type: String,
    pub user_id: Uuid,
    pub session_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReconciledCheckout {
    pub subscription: SubscriptionProfile,
    pub payment: PaymentProfile,
}

#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// State was written.
    Applied {
        subscription: SubscriptionProfile,
        payment: PaymentProfile,
    },
    /// The event id was already processed.
    Duplicate,
    /// Event type this service does not act on.
    Ignored,
    /// Could not be applied and retrying will not help (unknown customer, no price).
    Skipped { reason: String },
}

impl WebhookOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied { .. } => "applied",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Skipped { .. } => "skipped",
        }
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait ReconciliationRepoTrait: Send + Sync {
    async fn is_event_processed(&self, provider_event_id: &str) -> AppResult<bool>;

    /// Claim the event id, place the checkout on the user's subscription and record a
    /// PAID payment, all in one transaction. `None` when the event id was already
    /// claimed, in which case nothing is written.
    async fn apply_checkout(
        &self,
        input: &CheckoutReconciliation,
    ) -> AppResult<Option<ReconciledCheckout>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct PaymentWebhookUseCases {
    provider: Arc<dyn PaymentProviderPort>,
    user_repo: Arc<dyn UserRepoTrait>,
    reconciliation_repo: Arc<dyn ReconciliationRepoTrait>,
}

impl PaymentWebhookUseCases {
    pub fn new(
        provider: Arc<dyn PaymentProviderPort>,
        user_repo: Arc<dyn UserRepoTrait>,
        reconciliation_repo: Arc<dyn ReconciliationRepoTrait>,
    ) -> Self {
        Self {
            provider,
            user_repo,
            reconciliation_repo,
        }
    }

    /// Verify and apply one delivery.
    ///
    /// `SignatureInvalid` and `ValidationError` (malformed envelope) mean the delivery was
    /// rejected before any state was read. Once the delivery is authentic, anything that
    /// cannot succeed on redelivery is acknowledged as `Skipped`; the remaining errors are
    /// transient per [`AppError::is_retryable`].
    #[instrument(skip_all)]
    pub async fn handle_delivery(
        &self,
        payload: &str,
        signature_header: &str,
    ) -> AppResult<WebhookOutcome> {
        self.provider.verify_webhook(payload, signature_header)?;
        let envelope = WebhookEnvelope::parse(payload)?;

        let outcome = match envelope.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => self.handle_checkout_completed(&envelope).await?,
            "invoice.payment_failed" | "customer.subscription.updated" => {
                tracing::info!(
                    event_id = %envelope.id,
                    event_type = %envelope.event_type,
                    object_id = envelope.object_str("id").unwrap_or("unknown"),
                    "Webhook event acknowledged without action"
                );
                WebhookOutcome::Ignored
            }
            other => {
                tracing::debug!(
                    event_id = %envelope.id,
                    event_type = other,
                    "Unhandled webhook event type"
                );
                WebhookOutcome::Ignored
            }
        };

        tracing::info!(
            event_id = %envelope.id,
            event_type = %envelope.event_type,
            outcome = outcome.label(),
            "Webhook processed"
        );
        Ok(outcome)
    }

    async fn handle_checkout_completed(
        &self,
        envelope: &WebhookEnvelope,
    ) -> AppResult<WebhookOutcome> {
        let event_id = envelope.id.as_str();
        if self.reconciliation_repo.is_event_processed(event_id).await? {
            tracing::debug!(event_id, "Webhook event already processed");
            return Ok(WebhookOutcome::Duplicate);
        }

        let Some(session_id) = envelope.object_str("id") else {
            return Ok(skipped(event_id, "checkout session without id"));
        };

        // The delivery is authentic at this point; only transient failures go back as errors.
        let session = match self.provider.retrieve_checkout_session(session_id).await {
            Ok(session) => session,
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    event_id,
                    session_id,
                    error = %e,
                    "Checkout session re-fetch rejected"
                );
                return Ok(skipped(event_id, "checkout session could not be retrieved"));
            }
        };

        let customer_id = session
            .customer
            .as_ref()
            .map(|c| c.as_str().to_string())
            .or_else(|| envelope.object_str("customer").map(str::to_string));
        let Some(customer_id) = customer_id else {
            return Ok(skipped(event_id, "checkout session has no customer"));
        };

        let Some(user) = self
            .user_repo
            .get_by_stripe_customer_id(&customer_id)
            .await?
        else {
            tracing::warn!(
                event_id,
                customer_id = %customer_id,
                retryable = false,
                "No user for payment provider customer"
            );
            return Ok(WebhookOutcome::Skipped {
                reason: format!("no user for customer {}", customer_id),
            });
        };

        let Some(amount_cents) = session.unit_amount_cents().filter(|amount| *amount > 0) else {
            tracing::error!(event_id, session_id, "Checkout session has no priced line item");
            return Ok(skipped(event_id, "checkout session has no priced line item"));
        };
        let currency = session
            .currency()
            .unwrap_or(crate::application::use_cases::payment::DEFAULT_CURRENCY)
            .to_lowercase();

        let input = CheckoutReconciliation {
            provider_event_id: event_id.to_string(),
            event_type: envelope.event_type.clone(),
            user_id: user.id,
            session_id: session.id.clone(),
            amount_cents,
            currency,
            now: Utc::now(),
        };

        match self.reconciliation_repo.apply_checkout(&input).await? {
            Some(reconciled) => {
                tracing::info!(
                    event_id,
                    user_id = %user.id,
                    subscription_id = %reconciled.subscription.id,
                    payment_id = %reconciled.payment.id,
                    amount_cents,
                    "Checkout reconciled"
                );
                Ok(WebhookOutcome::Applied {
                    subscription: reconciled.subscription,
                    payment: reconciled.payment,
                })
            }
            None => {
                tracing::debug!(event_id, "Webhook event claimed by a concurrent delivery");
                Ok(WebhookOutcome::Duplicate)
            }
        }
    }
}

fn skipped(event_id: &str, reason: &str) -> WebhookOutcome {
    tracing::warn!(event_id, reason, retryable = false, "Webhook event skipped");
    WebhookOutcome::Skipped {
        reason: reason.to_string(),
    }
}
