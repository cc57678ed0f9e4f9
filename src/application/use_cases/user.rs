use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::app_error::AppResult;

/// A user as seen by this service. Accounts are owned by the user service;
/// this side only reads them and records the payment provider's customer id.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// User directory lookups.
#[async_trait]
pub trait UserRepoTrait: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>>;

    async fn get_by_stripe_customer_id(&self, customer_id: &str)
    -> AppResult<Option<UserProfile>>;

    /// Store the customer id unless one is already recorded. Returns the profile as stored,
    /// so a concurrent writer's id wins over ours. `NotFound` if the user is unknown.
    async fn set_stripe_customer_id(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> AppResult<UserProfile>;

    /// Ids of the events the user is registered for, oldest registration first.
    async fn list_event_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;
}
