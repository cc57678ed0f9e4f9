use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::event::EventSeats;

const MAX_TITLE_LEN: usize = 200;

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct EventProfile {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub seats_left: i32,
    pub is_full: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventProfile {
    pub fn seats(&self) -> EventSeats {
        EventSeats {
            seats_left: self.seats_left,
            is_full: self.is_full,
        }
    }

    /// Fails with `InvariantViolation` when the stored seat counter and full flag disagree.
    pub fn ensure_consistent(&self) -> AppResult<()> {
        if self.seats().is_consistent() {
            return Ok(());
        }
        tracing::error!(
            event_id = %self.id,
            seats_left = self.seats_left,
            is_full = self.is_full,
            "Event seat state is inconsistent"
        );
        Err(AppError::InvariantViolation(format!(
            "event {} has seats_left={} is_full={}",
            self.id, self.seats_left, self.is_full
        )))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub seats_left: i32,
}

impl EventInput {
    fn validate(&self) -> AppResult<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::ValidationError("Title is required".into()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::ValidationError(format!(
                "Title must be at most {} characters",
                MAX_TITLE_LEN
            )));
        }
        if self.seats_left < 0 {
            return Err(AppError::ValidationError(
                "Seats left cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Event storage. Every operation that touches both the seat counter and the membership
/// relation runs as one atomic unit in the implementation.
#[async_trait]
pub trait EventRepoTrait: Send + Sync {
    async fn list(&self) -> AppResult<Vec<EventProfile>>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<EventProfile>>;

    async fn create(&self, input: &EventInput, seats: EventSeats) -> AppResult<EventProfile>;

    /// `NotFound` if absent.
    async fn update(
        &self,
        id: Uuid,
        input: &EventInput,
        seats: EventSeats,
    ) -> AppResult<EventProfile>;

    /// Detach every member and delete the event. `NotFound` if absent.
    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// Decrement-if-available. `NotFound` if absent, `Conflict` if no seat is left.
    async fn register_seat(&self, id: Uuid) -> AppResult<EventProfile>;

    /// Give one seat back. `NotFound` if absent.
    async fn release_seat(&self, id: Uuid) -> AppResult<EventProfile>;

    /// Take a seat and record the membership together. `Conflict` when the user is
    /// already a member or no seat is left; neither write survives a failure.
    async fn add_member(&self, event_id: Uuid, user_id: Uuid) -> AppResult<EventProfile>;

    /// Drop the membership and release its seat together. `Conflict` when the user
    /// is not a member.
    async fn remove_member(&self, event_id: Uuid, user_id: Uuid) -> AppResult<EventProfile>;

    async fn list_member_ids(&self, event_id: Uuid) -> AppResult<Vec<Uuid>>;

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<EventProfile>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct EventCatalogUseCases {
    event_repo: Arc<dyn EventRepoTrait>,
}

impl EventCatalogUseCases {
    pub fn new(event_repo: Arc<dyn EventRepoTrait>) -> Self {
        Self { event_repo }
    }

    #[instrument(skip(self))]
    pub async fn list_events(&self) -> AppResult<Vec<EventProfile>> {
        let events = self.event_repo.list().await?;
        for event in &events {
            event.ensure_consistent()?;
        }
        Ok(events)
    }

    #[instrument(skip(self))]
    pub async fn get_event(&self, id: Uuid) -> AppResult<EventProfile> {
        let event = self
            .event_repo
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)?;
        event.ensure_consistent()?;
        Ok(event)
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_event(&self, input: EventInput) -> AppResult<EventProfile> {
        input.validate()?;
        let seats = EventSeats::new(input.seats_left);
        let event = self.event_repo.create(&input, seats).await?;
        tracing::info!(event_id = %event.id, seats_left = event.seats_left, "Event created");
        Ok(event)
    }

    /// Replace an event's fields. `is_full` is always recomputed from the new seat count.
    #[instrument(skip(self, input))]
    pub async fn update_event(&self, id: Uuid, input: EventInput) -> AppResult<EventProfile> {
        input.validate()?;
        let seats = EventSeats::new(input.seats_left);
        self.event_repo.update(id, &input, seats).await
    }

    #[instrument(skip(self))]
    pub async fn remove_event(&self, id: Uuid) -> AppResult<()> {
        self.event_repo.delete(id).await?;
        tracing::info!(event_id = %id, "Event removed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn register_seat(&self, id: Uuid) -> AppResult<EventProfile> {
        self.event_repo.register_seat(id).await
    }

    #[instrument(skip(self))]
    pub async fn release_seat(&self, id: Uuid) -> AppResult<EventProfile> {
        self.event_repo.release_seat(id).await
    }
}
