use std::sync::Arc;

use crate::{
    infra::config::AppConfig,
    use_cases::{
        billing::BillingUseCases, event::EventCatalogUseCases, payment::PaymentUseCases,
        payment_webhook::PaymentWebhookUseCases, registration::RegistrationUseCases,
        subscription::SubscriptionUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub event_use_cases: Arc<EventCatalogUseCases>,
    pub registration_use_cases: Arc<RegistrationUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub payment_use_cases: Arc<PaymentUseCases>,
    pub webhook_use_cases: Arc<PaymentWebhookUseCases>,
    pub billing_use_cases: Arc<BillingUseCases>,
}
