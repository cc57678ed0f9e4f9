//! In-memory implementation of every repository trait.
//!
//! All tables sit behind one mutex, so each trait method is atomic the same way a
//! single Postgres transaction is. Nothing awaits while the lock is held.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        event::{EventInput, EventProfile, EventRepoTrait},
        payment::{PaymentProfile, PaymentRepoTrait, PaymentStatusChange},
        payment_webhook::{CheckoutReconciliation, ReconciledCheckout, ReconciliationRepoTrait},
        subscription::{
            CheckoutPlacement, SubscriptionProfile, SubscriptionRepoTrait, place_checkout,
        },
        user::{UserProfile, UserRepoTrait},
    },
    domain::entities::{
        event::EventSeats, payment_method::PaymentMethod, payment_status::PaymentStatus,
        subscription_status::SubscriptionStatus,
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserProfile>,
    events: HashMap<Uuid, EventProfile>,
    /// `(event_id, user_id)` in registration order.
    registrations: Vec<(Uuid, Uuid)>,
    /// Insertion order doubles as creation order when timestamps tie.
    subscriptions: Vec<SubscriptionProfile>,
    payments: Vec<PaymentProfile>,
    processed_events: HashSet<String>,
}

impl Tables {
    fn open_subscription(&self, user_id: Uuid) -> Option<&SubscriptionProfile> {
        self.subscriptions
            .iter()
            .find(|s| s.user_id == user_id && s.status.is_open())
    }

    fn subscription_mut(&mut self, id: Uuid) -> AppResult<&mut SubscriptionProfile> {
        self.subscriptions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound)
    }

    fn insert_subscription(
        &mut self,
        user_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile> {
        if !self.users.contains_key(&user_id) {
            return Err(AppError::NotFound);
        }
        if status.is_open() && self.open_subscription(user_id).is_some() {
            return Err(AppError::Conflict(
                "User already has an open subscription".into(),
            ));
        }
        let now = Utc::now();
        let subscription = SubscriptionProfile {
            id: Uuid::new_v4(),
            user_id,
            start_date,
            end_date,
            status,
            created_at: now,
            updated_at: now,
        };
        self.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    fn event_mut(&mut self, id: Uuid) -> AppResult<&mut EventProfile> {
        self.events.get_mut(&id).ok_or(AppError::NotFound)
    }

    fn take_seat(&mut self, id: Uuid) -> AppResult<EventProfile> {
        let event = self.event_mut(id)?;
        let seats = event
            .seats()
            .take()
            .ok_or_else(|| AppError::Conflict("event full".into()))?;
        apply_seats(event, seats);
        Ok(event.clone())
    }

    fn give_back_seat(&mut self, id: Uuid) -> AppResult<EventProfile> {
        let event = self.event_mut(id)?;
        let seats = event.seats().release();
        apply_seats(event, seats);
        Ok(event.clone())
    }

    fn is_member(&self, event_id: Uuid, user_id: Uuid) -> bool {
        self.registrations.contains(&(event_id, user_id))
    }
}

fn apply_seats(event: &mut EventProfile, seats: EventSeats) {
    event.seats_left = seats.seats_left;
    event.is_full = seats.is_full;
    event.updated_at = Utc::now();
}

fn write_event(event: &mut EventProfile, input: &EventInput, seats: EventSeats) {
    event.title = input.title.trim().to_string();
    event.description = input.description.clone();
    event.image_url = input.image_url.clone();
    event.starts_at = input.starts_at;
    apply_seats(event, seats);
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn insert_user(&self, user: UserProfile) {
        self.lock().users.insert(user.id, user);
    }

    pub fn insert_event(&self, event: EventProfile) {
        self.lock().events.insert(event.id, event);
    }

    pub fn insert_subscription(&self, subscription: SubscriptionProfile) {
        self.lock().subscriptions.push(subscription);
    }

    pub fn insert_payment(&self, payment: PaymentProfile) {
        self.lock().payments.push(payment);
    }

    pub fn user(&self, id: Uuid) -> Option<UserProfile> {
        self.lock().users.get(&id).cloned()
    }

    pub fn event(&self, id: Uuid) -> Option<EventProfile> {
        self.lock().events.get(&id).cloned()
    }

    pub fn subscription(&self, id: Uuid) -> Option<SubscriptionProfile> {
        self.lock().subscriptions.iter().find(|s| s.id == id).cloned()
    }

    pub fn subscriptions_for(&self, user_id: Uuid) -> Vec<SubscriptionProfile> {
        self.lock()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn payments_for(&self, subscription_id: Uuid) -> Vec<PaymentProfile> {
        self.lock()
            .payments
            .iter()
            .filter(|p| p.subscription_id == subscription_id)
            .cloned()
            .collect()
    }
}

// ============================================================================
// Users
// ============================================================================

#[async_trait]
impl UserRepoTrait for InMemoryStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        Ok(self.user(id))
    }

    async fn get_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> AppResult<Option<UserProfile>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn set_stripe_customer_id(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> AppResult<UserProfile> {
        let mut tables = self.lock();
        let user = tables.users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        if user.stripe_customer_id.is_none() {
            user.stripe_customer_id = Some(customer_id.to_string());
        }
        Ok(user.clone())
    }

    async fn list_event_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .lock()
            .registrations
            .iter()
            .filter(|(_, member)| *member == user_id)
            .map(|(event_id, _)| *event_id)
            .collect())
    }
}

// ============================================================================
// Events
// ============================================================================

#[async_trait]
impl EventRepoTrait for InMemoryStore {
    async fn list(&self) -> AppResult<Vec<EventProfile>> {
        let mut events: Vec<EventProfile> = self.lock().events.values().cloned().collect();
        events.sort_by_key(|e| (e.starts_at, e.created_at));
        Ok(events)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<EventProfile>> {
        Ok(self.event(id))
    }

    async fn create(&self, input: &EventInput, seats: EventSeats) -> AppResult<EventProfile> {
        let now = Utc::now();
        let mut event = EventProfile {
            id: Uuid::new_v4(),
            title: String::new(),
            description: None,
            image_url: None,
            starts_at: input.starts_at,
            seats_left: 0,
            is_full: false,
            created_at: now,
            updated_at: now,
        };
        write_event(&mut event, input, seats);
        self.insert_event(event.clone());
        Ok(event)
    }

    async fn update(
        &self,
        id: Uuid,
        input: &EventInput,
        seats: EventSeats,
    ) -> AppResult<EventProfile> {
        let mut tables = self.lock();
        let event = tables.event_mut(id)?;
        write_event(event, input, seats);
        Ok(event.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.lock();
        if tables.events.remove(&id).is_none() {
            return Err(AppError::NotFound);
        }
        tables.registrations.retain(|(event_id, _)| *event_id != id);
        Ok(())
    }

    async fn register_seat(&self, id: Uuid) -> AppResult<EventProfile> {
        self.lock().take_seat(id)
    }

    async fn release_seat(&self, id: Uuid) -> AppResult<EventProfile> {
        self.lock().give_back_seat(id)
    }

    async fn add_member(&self, event_id: Uuid, user_id: Uuid) -> AppResult<EventProfile> {
        let mut tables = self.lock();
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::NotFound);
        }
        if tables.is_member(event_id, user_id) {
            return Err(AppError::Conflict(
                "User already registered for this event".into(),
            ));
        }
        let event = tables.take_seat(event_id)?;
        tables.registrations.push((event_id, user_id));
        Ok(event)
    }

    async fn remove_member(&self, event_id: Uuid, user_id: Uuid) -> AppResult<EventProfile> {
        let mut tables = self.lock();
        if !tables.events.contains_key(&event_id) {
            return Err(AppError::NotFound);
        }
        if !tables.is_member(event_id, user_id) {
            return Err(AppError::Conflict(
                "User is not registered for this event".into(),
            ));
        }
        tables
            .registrations
            .retain(|registration| *registration != (event_id, user_id));
        tables.give_back_seat(event_id)
    }

    async fn list_member_ids(&self, event_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .lock()
            .registrations
            .iter()
            .filter(|(event, _)| *event == event_id)
            .map(|(_, user_id)| *user_id)
            .collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<EventProfile>> {
        let tables = self.lock();
        let mut events: Vec<EventProfile> = tables
            .registrations
            .iter()
            .filter(|(_, member)| *member == user_id)
            .filter_map(|(event_id, _)| tables.events.get(event_id).cloned())
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events)
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

#[async_trait]
impl SubscriptionRepoTrait for InMemoryStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self.subscription(id))
    }

    async fn get_latest_by_user(&self, user_id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn get_open_by_user(&self, user_id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self.lock().open_subscription(user_id).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionProfile>> {
        let mut subscriptions = self.subscriptions_for(user_id);
        subscriptions.reverse();
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subscriptions)
    }

    async fn create(
        &self,
        user_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile> {
        self.lock()
            .insert_subscription(user_id, start_date, end_date, status)
    }

    async fn activate(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let mut tables = self.lock();
        let subscription = tables.subscription_mut(id)?;
        if subscription.status == SubscriptionStatus::Pending {
            subscription.status = SubscriptionStatus::Active;
            subscription.updated_at = Utc::now();
        }
        Ok(subscription.clone())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> AppResult<SubscriptionProfile> {
        let mut tables = self.lock();
        let user_id = tables.subscription_mut(id)?.user_id;
        let other_open = tables
            .subscriptions
            .iter()
            .any(|s| s.id != id && s.user_id == user_id && s.status.is_open());
        if status.is_open() && other_open {
            return Err(AppError::Conflict(
                "User already has an open subscription".into(),
            ));
        }
        let subscription = tables.subscription_mut(id)?;
        subscription.status = status;
        subscription.updated_at = Utc::now();
        Ok(subscription.clone())
    }
}

// ============================================================================
// Payments
// ============================================================================

#[async_trait]
impl PaymentRepoTrait for InMemoryStore {
    async fn create(
        &self,
        subscription_id: Uuid,
        amount_cents: i64,
        currency: &str,
        method: PaymentMethod,
    ) -> AppResult<PaymentProfile> {
        let mut tables = self.lock();
        tables.subscription_mut(subscription_id)?;
        let payment = PaymentProfile {
            id: Uuid::new_v4(),
            subscription_id,
            amount_cents,
            currency: currency.to_string(),
            method,
            status: PaymentStatus::Pending,
            provider_reference: None,
            paid_at: None,
            created_at: Utc::now(),
        };
        tables.payments.push(payment.clone());
        Ok(payment)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentProfile>> {
        Ok(self.lock().payments.iter().find(|p| p.id == id).cloned())
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<PaymentProfile>> {
        Ok(self.payments_for(subscription_id))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> AppResult<PaymentStatusChange> {
        let mut tables = self.lock();
        let payment = tables
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::NotFound)?;
        if !payment.status.can_transition_to(status) {
            return Err(AppError::Conflict(format!(
                "Payment is {} and cannot become {}",
                payment.status, status
            )));
        }
        payment.status = status;
        if status.is_successful() && payment.paid_at.is_none() {
            payment.paid_at = Some(Utc::now());
        }
        let payment = payment.clone();

        let subscription = tables.subscription_mut(payment.subscription_id)?;
        if status.is_successful() && subscription.status == SubscriptionStatus::Pending {
            subscription.status = SubscriptionStatus::Active;
            subscription.updated_at = Utc::now();
        }
        Ok(PaymentStatusChange {
            payment,
            subscription: subscription.clone(),
        })
    }
}

// ============================================================================
// Webhook reconciliation
// ============================================================================

#[async_trait]
impl ReconciliationRepoTrait for InMemoryStore {
    async fn is_event_processed(&self, provider_event_id: &str) -> AppResult<bool> {
        Ok(self.lock().processed_events.contains(provider_event_id))
    }

    async fn apply_checkout(
        &self,
        input: &CheckoutReconciliation,
    ) -> AppResult<Option<ReconciledCheckout>> {
        let mut tables = self.lock();
        if tables.processed_events.contains(&input.provider_event_id) {
            return Ok(None);
        }
        if !tables.users.contains_key(&input.user_id) {
            return Err(AppError::NotFound);
        }

        let open = tables.open_subscription(input.user_id).cloned();
        let subscription = match place_checkout(open.as_ref(), input.now) {
            CheckoutPlacement::Open {
                start_date,
                end_date,
            } => tables.insert_subscription(
                input.user_id,
                start_date,
                end_date,
                SubscriptionStatus::Active,
            )?,
            CheckoutPlacement::Activate {
                id,
                start_date,
                end_date,
            } => {
                let subscription = tables.subscription_mut(id)?;
                subscription.status = SubscriptionStatus::Active;
                subscription.start_date = start_date;
                subscription.end_date = end_date;
                subscription.updated_at = input.now;
                subscription.clone()
            }
            CheckoutPlacement::Extend { id, end_date } => {
                let subscription = tables.subscription_mut(id)?;
                subscription.end_date = end_date;
                subscription.updated_at = input.now;
                subscription.clone()
            }
        };

        let payment = PaymentProfile {
            id: Uuid::new_v4(),
            subscription_id: subscription.id,
            amount_cents: input.amount_cents,
            currency: input.currency.clone(),
            method: PaymentMethod::Card,
            status: PaymentStatus::Paid,
            provider_reference: Some(input.session_id.clone()),
            paid_at: Some(input.now),
            created_at: input.now,
        };
        tables.payments.push(payment.clone());
        tables
            .processed_events
            .insert(input.provider_event_id.clone());

        Ok(Some(ReconciledCheckout {
            subscription,
            payment,
        }))
    }
}
