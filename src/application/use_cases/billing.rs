use std::sync::Arc;

use tracing::instrument;
use url::Url;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::payment_provider::{
    CheckoutResult, CheckoutUrls, CustomerId, PaymentProviderPort,
};
use crate::application::use_cases::user::{UserProfile, UserRepoTrait};

/// Glue between users and the payment provider's customers and checkout pages.
#[derive(Clone)]
pub struct BillingUseCases {
    provider: Arc<dyn PaymentProviderPort>,
    user_repo: Arc<dyn UserRepoTrait>,
    app_origin: Url,
}

impl BillingUseCases {
    pub fn new(
        provider: Arc<dyn PaymentProviderPort>,
        user_repo: Arc<dyn UserRepoTrait>,
        app_origin: Url,
    ) -> Self {
        Self {
            provider,
            user_repo,
            app_origin,
        }
    }

    /// Create the provider customer for a user, once. Later calls return the stored id.
    #[instrument(skip(self))]
    pub async fn create_customer(&self, user_id: Uuid) -> AppResult<CustomerId> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.ensure_customer(&user).await
    }

    /// Start a subscription checkout for the user, creating the customer on demand.
    #[instrument(skip(self))]
    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        price_id: &str,
    ) -> AppResult<CheckoutResult> {
        let price_id = price_id.trim();
        if price_id.is_empty() {
            return Err(AppError::ValidationError("priceId is required".into()));
        }
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let customer_id = self.ensure_customer(&user).await?;

        let urls = self.checkout_urls()?;
        let result = self
            .provider
            .create_checkout_session(&customer_id, price_id, &urls)
            .await?;
        tracing::info!(
            %user_id,
            session_id = %result.session_id,
            "Checkout session created"
        );
        Ok(result)
    }

    async fn ensure_customer(&self, user: &UserProfile) -> AppResult<CustomerId> {
        if let Some(existing) = &user.stripe_customer_id {
            return Ok(CustomerId::new(existing.clone()));
        }

        let created = self
            .provider
            .create_customer(&user.email, user.name.as_deref())
            .await?;
        let stored = self
            .user_repo
            .set_stripe_customer_id(user.id, created.as_str())
            .await?;

        match stored.stripe_customer_id {
            Some(id) if id == created.as_str() => {
                tracing::info!(user_id = %user.id, customer_id = %created, "Payment customer created");
                Ok(created)
            }
            Some(id) => {
                tracing::warn!(
                    user_id = %user.id,
                    orphaned_customer_id = %created,
                    "Customer id was assigned concurrently, keeping the stored one"
                );
                Ok(CustomerId::new(id))
            }
            None => Err(AppError::Internal(
                "customer id was not stored".into(),
            )),
        }
    }

    fn checkout_urls(&self) -> AppResult<CheckoutUrls> {
        let join = |path: &str| {
            self.app_origin
                .join(path)
                .map_err(|e| AppError::Internal(format!("Invalid app origin: {}", e)))
        };
        // The placeholder is filled in by the provider; it must reach it unescaped.
        let success_url = format!("{}?session_id={{CHECKOUT_SESSION_ID}}", join("success")?);
        let cancel_url = join("cancel")?.to_string();
        Ok(CheckoutUrls {
            success_url,
            cancel_url,
        })
    }
}
