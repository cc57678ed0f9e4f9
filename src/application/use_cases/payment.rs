use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::subscription::{SubscriptionProfile, SubscriptionRepoTrait};
use crate::domain::entities::payment_method::PaymentMethod;
use crate::domain::entities::payment_status::PaymentStatus;
use crate::domain::entities::user::Identity;

pub const DEFAULT_CURRENCY: &str = "eur";

#[derive(Debug, Clone, Serialize)]
pub struct PaymentProfile {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub provider_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentProfile {
    /// Amount in major units, as shown to clients.
    pub fn amount(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }
}

/// Result of a payment status change: the payment and its subscription as of the same
/// atomic write.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusChange {
    pub payment: PaymentProfile,
    pub subscription: SubscriptionProfile,
}

/// Convert a decimal amount from a request into minor units.
pub fn amount_to_cents(amount: f64) -> AppResult<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::ValidationError(
            "Amount must be a positive number".into(),
        ));
    }
    let cents = (amount * 100.0).round();
    if cents < 1.0 || cents > i64::MAX as f64 {
        return Err(AppError::ValidationError(
            "Amount must be at least 0.01".into(),
        ));
    }
    Ok(cents as i64)
}

#[async_trait]
pub trait PaymentRepoTrait: Send + Sync {
    /// New PENDING payment. `NotFound` if the subscription is unknown.
    async fn create(
        &self,
        subscription_id: Uuid,
        amount_cents: i64,
        currency: &str,
        method: PaymentMethod,
    ) -> AppResult<PaymentProfile>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentProfile>>;

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<PaymentProfile>>;

    /// Write the status and, for PAID, activate the owning subscription in the same
    /// transaction. `Conflict` when a PAID payment would be moved to another status.
    async fn update_status(&self, id: Uuid, status: PaymentStatus)
    -> AppResult<PaymentStatusChange>;
}

#[derive(Clone)]
pub struct PaymentUseCases {
    payment_repo: Arc<dyn PaymentRepoTrait>,
    subscription_repo: Arc<dyn SubscriptionRepoTrait>,
}

impl PaymentUseCases {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepoTrait>,
        subscription_repo: Arc<dyn SubscriptionRepoTrait>,
    ) -> Self {
        Self {
            payment_repo,
            subscription_repo,
        }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        identity: Identity,
        subscription_id: Uuid,
        amount_cents: i64,
        method: PaymentMethod,
    ) -> AppResult<PaymentProfile> {
        if amount_cents <= 0 {
            return Err(AppError::ValidationError(
                "Amount must be a positive number".into(),
            ));
        }
        self.require_visible_subscription(identity, subscription_id)
            .await?;

        let payment = self
            .payment_repo
            .create(subscription_id, amount_cents, DEFAULT_CURRENCY, method)
            .await?;
        tracing::info!(
            payment_id = %payment.id,
            %subscription_id,
            amount_cents,
            %method,
            "Payment created"
        );
        Ok(payment)
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> AppResult<PaymentStatusChange> {
        let change = self.payment_repo.update_status(id, status).await?;
        tracing::info!(
            payment_id = %id,
            payment_status = %change.payment.status,
            subscription_id = %change.subscription.id,
            subscription_status = %change.subscription.status,
            "Payment status updated"
        );
        Ok(change)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PaymentProfile> {
        self.payment_repo
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn list_for_subscription(
        &self,
        identity: Identity,
        subscription_id: Uuid,
    ) -> AppResult<Vec<PaymentProfile>> {
        self.require_visible_subscription(identity, subscription_id)
            .await?;
        self.payment_repo.list_by_subscription(subscription_id).await
    }

    /// Users only see their own subscriptions; admins see all.
    async fn require_visible_subscription(
        &self,
        identity: Identity,
        subscription_id: Uuid,
    ) -> AppResult<SubscriptionProfile> {
        let subscription = self
            .subscription_repo
            .get_by_id(subscription_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if subscription.user_id != identity.user_id && !identity.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(subscription)
    }
}
