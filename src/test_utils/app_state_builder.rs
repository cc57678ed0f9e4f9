//! Test app state builder for HTTP-level testing.
//!
//! `TestAppStateBuilder` wires every use case to one [`InMemoryStore`] and a
//! [`StubPaymentProvider`], so route tests can seed data and assert on it afterwards.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        jwt,
        use_cases::{
            billing::BillingUseCases, event::EventCatalogUseCases, payment::PaymentUseCases,
            payment_webhook::PaymentWebhookUseCases, registration::RegistrationUseCases,
            subscription::SubscriptionUseCases,
        },
    },
    domain::entities::user::UserRole,
    infra::config::AppConfig,
    test_utils::{InMemoryStore, StubPaymentProvider, TEST_WEBHOOK_SECRET},
};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-please-ignore";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/learnhub_test".to_string(),
        db_max_connections: 1,
        jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
        stripe_secret_key: SecretString::new("sk_test_unused".into()),
        stripe_webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
        stripe_timeout: Duration::from_secs(1),
        webhook_tolerance_secs: 300,
        app_origin: Url::parse("https://learn.example.com/").unwrap(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        log_file: None,
    }
}

/// `Authorization` header value for a caller with the given role.
pub fn bearer_for(user_id: Uuid, role: UserRole) -> String {
    let token = jwt::issue(
        user_id,
        role,
        &SecretString::new(TEST_JWT_SECRET.into()),
        time::Duration::minutes(5),
    )
    .unwrap();
    format!("Bearer {}", token)
}

pub struct TestAppStateBuilder {
    store: Arc<InMemoryStore>,
    provider: Arc<StubPaymentProvider>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            provider: Arc::new(StubPaymentProvider::new(TEST_WEBHOOK_SECRET)),
        }
    }

    /// Share a store the test keeps a handle on.
    pub fn with_store(mut self, store: Arc<InMemoryStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_provider(mut self, provider: Arc<StubPaymentProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn build(self) -> AppState {
        let config = test_config();
        let store = self.store;
        let provider = self.provider;

        AppState {
            event_use_cases: Arc::new(EventCatalogUseCases::new(store.clone())),
            registration_use_cases: Arc::new(RegistrationUseCases::new(
                store.clone(),
                store.clone(),
            )),
            subscription_use_cases: Arc::new(SubscriptionUseCases::new(
                store.clone(),
                store.clone(),
            )),
            payment_use_cases: Arc::new(PaymentUseCases::new(store.clone(), store.clone())),
            webhook_use_cases: Arc::new(PaymentWebhookUseCases::new(
                provider.clone(),
                store.clone(),
                store.clone(),
            )),
            billing_use_cases: Arc::new(BillingUseCases::new(
                provider,
                store,
                config.app_origin.clone(),
            )),
            config: Arc::new(config),
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
