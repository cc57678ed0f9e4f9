use crate::{
    adapters::http::app_state::AppState,
    application::ports::payment_provider::PaymentProviderPort,
    infra::{
        config::AppConfig, error::InfraError, postgres_persistence,
        stripe_client::StripeClient, stripe_payment_adapter::StripePaymentAdapter,
    },
    use_cases::{
        billing::BillingUseCases,
        event::{EventCatalogUseCases, EventRepoTrait},
        payment::{PaymentRepoTrait, PaymentUseCases},
        payment_webhook::{PaymentWebhookUseCases, ReconciliationRepoTrait},
        registration::RegistrationUseCases,
        subscription::{SubscriptionRepoTrait, SubscriptionUseCases},
        user::UserRepoTrait,
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let postgres_arc =
        Arc::new(postgres_persistence(&config.database_url, config.db_max_connections).await?);

    let user_repo_arc = postgres_arc.clone() as Arc<dyn UserRepoTrait>;
    let event_repo_arc = postgres_arc.clone() as Arc<dyn EventRepoTrait>;
    let subscription_repo_arc = postgres_arc.clone() as Arc<dyn SubscriptionRepoTrait>;
    let payment_repo_arc = postgres_arc.clone() as Arc<dyn PaymentRepoTrait>;
    let reconciliation_repo_arc = postgres_arc as Arc<dyn ReconciliationRepoTrait>;

    let stripe_client = StripeClient::new(config.stripe_secret_key.clone(), config.stripe_timeout)?;
    let provider: Arc<dyn PaymentProviderPort> = Arc::new(StripePaymentAdapter::new(
        stripe_client,
        config.stripe_webhook_secret.clone(),
        config.webhook_tolerance_secs,
    ));

    let event_use_cases = EventCatalogUseCases::new(event_repo_arc.clone());
    let registration_use_cases =
        RegistrationUseCases::new(user_repo_arc.clone(), event_repo_arc);
    let subscription_use_cases =
        SubscriptionUseCases::new(subscription_repo_arc.clone(), user_repo_arc.clone());
    let payment_use_cases = PaymentUseCases::new(payment_repo_arc, subscription_repo_arc);
    let webhook_use_cases = PaymentWebhookUseCases::new(
        provider.clone(),
        user_repo_arc.clone(),
        reconciliation_repo_arc,
    );
    let billing_use_cases =
        BillingUseCases::new(provider, user_repo_arc, config.app_origin.clone());

    Ok(AppState {
        config: Arc::new(config),
        event_use_cases: Arc::new(event_use_cases),
        registration_use_cases: Arc::new(registration_use_cases),
        subscription_use_cases: Arc::new(subscription_use_cases),
        payment_use_cases: Arc::new(payment_use_cases),
        webhook_use_cases: Arc::new(webhook_use_cases),
        billing_use_cases: Arc::new(billing_use_cases),
    })
}

/// Console logs always; structured JSON logs as well when `log_file` is set.
pub fn init_tracing(log_file: Option<&str>) -> Result<(), InfraError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "learnhub=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false) // don't show target (module path)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let json_layer = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(InfraError::LogFile)?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_current_span(true)
                    .with_span_list(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
    Ok(())
}
