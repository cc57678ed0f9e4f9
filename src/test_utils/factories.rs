//! Test data factories.
//!
//! Each factory builds a valid record with sensible defaults, applies the closure's
//! overrides and stores the result in the given [`InMemoryStore`].

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    application::use_cases::{
        event::{EventInput, EventProfile},
        payment::{DEFAULT_CURRENCY, PaymentProfile},
        subscription::SubscriptionProfile,
        user::UserProfile,
    },
    domain::entities::{
        payment_method::PaymentMethod, payment_status::PaymentStatus,
        subscription_status::SubscriptionStatus,
    },
    test_utils::InMemoryStore,
};

/// Create and store a user with sensible defaults.
pub fn create_test_user(
    store: &InMemoryStore,
    overrides: impl FnOnce(&mut UserProfile),
) -> UserProfile {
    let id = Uuid::new_v4();
    let mut user = UserProfile {
        id,
        email: format!("user-{}@example.com", id.simple()),
        name: Some("Test User".to_string()),
        stripe_customer_id: None,
        created_at: test_datetime(),
    };
    overrides(&mut user);
    store.insert_user(user.clone());
    user
}

/// Create and store an event with ten free seats, a week from now.
///
/// `is_full` follows the overridden seat count unless the closure sets it itself.
pub fn create_test_event(
    store: &InMemoryStore,
    overrides: impl FnOnce(&mut EventProfile),
) -> EventProfile {
    let now = test_datetime();
    let mut event = EventProfile {
        id: Uuid::new_v4(),
        title: "Rust Workshop".to_string(),
        description: Some("Hands-on ownership and borrowing".to_string()),
        image_url: None,
        starts_at: test_datetime_offset_days(7),
        seats_left: 10,
        is_full: false,
        created_at: now,
        updated_at: now,
    };
    overrides(&mut event);
    if !event.is_full {
        event.is_full = event.seats_left == 0;
    }
    store.insert_event(event.clone());
    event
}

/// Create and store a PENDING subscription covering the next 30 days.
///
/// Stored as-is, so tests can set up states the repository would refuse.
pub fn create_test_subscription(
    store: &InMemoryStore,
    user_id: Uuid,
    overrides: impl FnOnce(&mut SubscriptionProfile),
) -> SubscriptionProfile {
    let now = test_datetime();
    let mut subscription = SubscriptionProfile {
        id: Uuid::new_v4(),
        user_id,
        start_date: now,
        end_date: test_datetime_offset_days(30),
        status: SubscriptionStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    overrides(&mut subscription);
    store.insert_subscription(subscription.clone());
    subscription
}

/// Create and store a PENDING card payment of 10.00.
pub fn create_test_payment(
    store: &InMemoryStore,
    subscription_id: Uuid,
    overrides: impl FnOnce(&mut PaymentProfile),
) -> PaymentProfile {
    let mut payment = PaymentProfile {
        id: Uuid::new_v4(),
        subscription_id,
        amount_cents: 1000,
        currency: DEFAULT_CURRENCY.to_string(),
        method: PaymentMethod::Card,
        status: PaymentStatus::Pending,
        provider_reference: None,
        paid_at: None,
        created_at: test_datetime(),
    };
    overrides(&mut payment);
    store.insert_payment(payment.clone());
    payment
}

pub fn event_input(title: &str, seats_left: i32) -> EventInput {
    EventInput {
        title: title.to_string(),
        description: None,
        image_url: None,
        starts_at: test_datetime_offset_days(14),
        seats_left,
    }
}

pub fn test_datetime() -> DateTime<Utc> {
    Utc::now()
}

pub fn test_datetime_offset_days(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}
