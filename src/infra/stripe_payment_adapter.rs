use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{
        CheckoutLineItem, CheckoutResult, CheckoutSessionDetails, CheckoutUrls, CustomerId,
        PaymentProviderPort,
    },
    infra::stripe_client::{StripeCheckoutSession, StripeClient},
};

/// Adapter that wraps StripeClient to implement PaymentProviderPort.
#[derive(Clone)]
pub struct StripePaymentAdapter {
    client: StripeClient,
    webhook_secret: SecretString,
    webhook_tolerance_secs: i64,
}

impl StripePaymentAdapter {
    pub fn new(
        client: StripeClient,
        webhook_secret: SecretString,
        webhook_tolerance_secs: i64,
    ) -> Self {
        Self {
            client,
            webhook_secret,
            webhook_tolerance_secs,
        }
    }

    fn to_session_details(session: StripeCheckoutSession) -> CheckoutSessionDetails {
        let session_currency = session.currency;
        let line_items = session
            .line_items
            .map(|list| list.data)
            .unwrap_or_default()
            .into_iter()
            .map(|item| {
                let (price_id, unit_amount, price_currency) = match item.price {
                    Some(price) => (Some(price.id), price.unit_amount, Some(price.currency)),
                    None => (None, None, None),
                };
                CheckoutLineItem {
                    price_id,
                    unit_amount,
                    currency: price_currency
                        .or(item.currency)
                        .or_else(|| session_currency.clone()),
                }
            })
            .collect();

        CheckoutSessionDetails {
            id: session.id,
            customer: session.customer.map(CustomerId::new),
            line_items,
        }
    }
}

#[async_trait]
impl PaymentProviderPort for StripePaymentAdapter {
    fn verify_webhook(&self, payload: &str, signature_header: &str) -> AppResult<()> {
        StripeClient::verify_webhook_signature(
            payload,
            signature_header,
            self.webhook_secret.expose_secret(),
            self.webhook_tolerance_secs,
        )
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> AppResult<CheckoutSessionDetails> {
        let session = self.client.get_checkout_session(session_id).await?;
        Ok(Self::to_session_details(session))
    }

    async fn create_customer(&self, email: &str, name: Option<&str>) -> AppResult<CustomerId> {
        let customer = self.client.create_customer(email, name).await?;
        Ok(CustomerId::new(customer.id))
    }

    async fn create_checkout_session(
        &self,
        customer_id: &CustomerId,
        price_id: &str,
        urls: &CheckoutUrls,
    ) -> AppResult<CheckoutResult> {
        let session = self
            .client
            .create_checkout_session(
                customer_id.as_str(),
                price_id,
                &urls.success_url,
                &urls.cancel_url,
            )
            .await?;

        if session.url.is_none() {
            return Err(AppError::ExternalService(
                "Checkout session has no URL".into(),
            ));
        }
        Ok(CheckoutResult {
            session_id: session.id,
            url: session.url,
        })
    }
}
