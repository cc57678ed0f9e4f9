use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::event::{EventProfile, EventRepoTrait};
use crate::application::use_cases::user::{UserProfile, UserRepoTrait};

/// Event membership. Keeps a user from holding two seats on one event and an event from
/// handing out more seats than it has.
#[derive(Clone)]
pub struct RegistrationUseCases {
    user_repo: Arc<dyn UserRepoTrait>,
    event_repo: Arc<dyn EventRepoTrait>,
}

impl RegistrationUseCases {
    pub fn new(user_repo: Arc<dyn UserRepoTrait>, event_repo: Arc<dyn EventRepoTrait>) -> Self {
        Self {
            user_repo,
            event_repo,
        }
    }

    #[instrument(skip(self))]
    pub async fn register(&self, user_id: Uuid, event_id: Uuid) -> AppResult<EventProfile> {
        self.require_user(user_id).await?;
        let event = self.require_event(event_id).await?;

        if self.is_member(user_id, event_id).await? {
            return Err(AppError::Conflict(
                "User already registered for this event".into(),
            ));
        }
        if !event.seats().has_capacity() {
            return Err(AppError::Conflict("event full".into()));
        }

        // The repo re-checks both conditions inside its transaction; the reads above
        // only give early, cheap answers.
        let event = self.event_repo.add_member(event_id, user_id).await?;
        tracing::info!(
            %user_id,
            %event_id,
            seats_left = event.seats_left,
            "User registered for event"
        );
        Ok(event)
    }

    #[instrument(skip(self))]
    pub async fn unregister(&self, user_id: Uuid, event_id: Uuid) -> AppResult<EventProfile> {
        self.require_user(user_id).await?;
        self.require_event(event_id).await?;

        if !self.is_member(user_id, event_id).await? {
            return Err(AppError::Conflict(
                "User is not registered for this event".into(),
            ));
        }

        let event = self.event_repo.remove_member(event_id, user_id).await?;
        tracing::info!(
            %user_id,
            %event_id,
            seats_left = event.seats_left,
            "User unregistered from event"
        );
        Ok(event)
    }

    #[instrument(skip(self))]
    pub async fn list_my_events(&self, user_id: Uuid) -> AppResult<Vec<EventProfile>> {
        self.event_repo.list_for_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_members(&self, event_id: Uuid) -> AppResult<Vec<Uuid>> {
        self.require_event(event_id).await?;
        self.event_repo.list_member_ids(event_id).await
    }

    async fn require_user(&self, user_id: Uuid) -> AppResult<UserProfile> {
        self.user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn require_event(&self, event_id: Uuid) -> AppResult<EventProfile> {
        let event = self
            .event_repo
            .get_by_id(event_id)
            .await?
            .ok_or(AppError::NotFound)?;
        event.ensure_consistent()?;
        Ok(event)
    }

    async fn is_member(&self, user_id: Uuid, event_id: Uuid) -> AppResult<bool> {
        Ok(self
            .user_repo
            .list_event_ids(user_id)
            .await?
            .contains(&event_id))
    }
}
