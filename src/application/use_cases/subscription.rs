use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::user::UserRepoTrait;
use crate::domain::entities::subscription_status::SubscriptionStatus;

/// Length of a subscription requested by a user before it is paid for.
const INTENT_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One calendar month after `from`, clamped to the end of shorter months.
pub fn one_month_after(from: DateTime<Utc>) -> DateTime<Utc> {
    from.checked_add_months(Months::new(1))
        .unwrap_or(from + Duration::days(30))
}

/// Where a paid checkout lands, given the user's open subscription (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutPlacement {
    /// No open subscription: start a new ACTIVE one.
    Open {
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    },
    /// A PENDING subscription is paid for: activate it with a fresh period.
    Activate {
        id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    },
    /// Already ACTIVE: push the end date out by a month.
    Extend { id: Uuid, end_date: DateTime<Utc> },
}

pub fn place_checkout(open: Option<&SubscriptionProfile>, now: DateTime<Utc>) -> CheckoutPlacement {
    match open {
        Some(sub) if sub.status == SubscriptionStatus::Active => CheckoutPlacement::Extend {
            id: sub.id,
            end_date: one_month_after(sub.end_date.max(now)),
        },
        Some(sub) if sub.status == SubscriptionStatus::Pending => CheckoutPlacement::Activate {
            id: sub.id,
            start_date: now,
            end_date: one_month_after(now),
        },
        _ => CheckoutPlacement::Open {
            start_date: now,
            end_date: one_month_after(now),
        },
    }
}

#[async_trait]
pub trait SubscriptionRepoTrait: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>>;

    /// Most recently created subscription of the user, in any state.
    async fn get_latest_by_user(&self, user_id: Uuid) -> AppResult<Option<SubscriptionProfile>>;

    async fn get_open_by_user(&self, user_id: Uuid) -> AppResult<Option<SubscriptionProfile>>;

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionProfile>>;

    /// `Conflict` if the user already holds a PENDING or ACTIVE subscription.
    async fn create(
        &self,
        user_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile>;

    /// PENDING -> ACTIVE in one conditional write. Any other state is returned untouched.
    async fn activate(&self, id: Uuid) -> AppResult<SubscriptionProfile>;

    async fn set_status(&self, id: Uuid, status: SubscriptionStatus)
    -> AppResult<SubscriptionProfile>;
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    subscription_repo: Arc<dyn SubscriptionRepoTrait>,
    user_repo: Arc<dyn UserRepoTrait>,
}

impl SubscriptionUseCases {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepoTrait>,
        user_repo: Arc<dyn UserRepoTrait>,
    ) -> Self {
        Self {
            subscription_repo,
            user_repo,
        }
    }

    /// Open a PENDING subscription. A user holds at most one open subscription.
    #[instrument(skip(self))]
    pub async fn open(
        &self,
        user_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> AppResult<SubscriptionProfile> {
        if end_date <= start_date {
            return Err(AppError::ValidationError(
                "Subscription must end after it starts".into(),
            ));
        }
        self.user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if let Some(open) = self.subscription_repo.get_open_by_user(user_id).await? {
            tracing::debug!(subscription_id = %open.id, status = %open.status, "User already has an open subscription");
            return Err(AppError::Conflict(
                "User already has an open subscription".into(),
            ));
        }

        let subscription = self
            .subscription_repo
            .create(user_id, start_date, end_date, SubscriptionStatus::Pending)
            .await?;
        tracing::info!(subscription_id = %subscription.id, %user_id, "Subscription opened");
        Ok(subscription)
    }

    /// Subscription intent from the user: starts now and runs for the default period.
    pub async fn open_for_current_user(&self, user_id: Uuid) -> AppResult<SubscriptionProfile> {
        let now = Utc::now();
        self.open(user_id, now, now + Duration::days(INTENT_PERIOD_DAYS))
            .await
    }

    /// Idempotent. Terminal subscriptions are left as they are.
    #[instrument(skip(self))]
    pub async fn activate(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let subscription = self.subscription_repo.activate(id).await?;
        if subscription.status.is_terminal() {
            tracing::warn!(subscription_id = %id, status = %subscription.status, "Activation ignored for terminal subscription");
        }
        Ok(subscription)
    }

    /// Administrative override, any state to any state.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile> {
        let subscription = self.subscription_repo.set_status(id, status).await?;
        tracing::info!(subscription_id = %id, %status, "Subscription status overridden");
        Ok(subscription)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        self.subscription_repo
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn current_for_user(&self, user_id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        self.subscription_repo.get_latest_by_user(user_id).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionProfile>> {
        self.subscription_repo.list_by_user(user_id).await
    }
}
