//! Payment provider stub and webhook payload helpers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{
        CheckoutResult, CheckoutSessionDetails, CheckoutUrls, CustomerId, PaymentProviderPort,
    },
    infra::stripe_client::{StripeClient, compute_signature},
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

const TEST_TOLERANCE_SECS: i64 = 300;

/// Provider double. Verifies signatures for real against its secret and serves checkout
/// sessions registered with [`StubPaymentProvider::add_session`].
pub struct StubPaymentProvider {
    webhook_secret: String,
    sessions: Mutex<HashMap<String, CheckoutSessionDetails>>,
    retrieve_calls: AtomicUsize,
    fail_retrievals: AtomicBool,
    customers_created: AtomicUsize,
    /// `(customer, price, urls)` of the most recent checkout.
    last_checkout: Mutex<Option<(String, String, CheckoutUrls)>>,
}

impl StubPaymentProvider {
    pub fn new(webhook_secret: &str) -> Self {
        Self {
            webhook_secret: webhook_secret.to_string(),
            sessions: Mutex::new(HashMap::new()),
            retrieve_calls: AtomicUsize::new(0),
            fail_retrievals: AtomicBool::new(false),
            customers_created: AtomicUsize::new(0),
            last_checkout: Mutex::new(None),
        }
    }

    pub fn add_session(&self, session: CheckoutSessionDetails) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
    }

    /// Make session retrieval fail as if the provider were down.
    pub fn fail_retrievals(&self, fail: bool) {
        self.fail_retrievals.store(fail, Ordering::SeqCst);
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    pub fn customers_created(&self) -> usize {
        self.customers_created.load(Ordering::SeqCst)
    }

    pub fn last_checkout(&self) -> Option<(String, String, CheckoutUrls)> {
        self.last_checkout.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProviderPort for StubPaymentProvider {
    fn verify_webhook(&self, payload: &str, signature_header: &str) -> AppResult<()> {
        StripeClient::verify_webhook_signature(
            payload,
            signature_header,
            &self.webhook_secret,
            TEST_TOLERANCE_SECS,
        )
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> AppResult<CheckoutSessionDetails> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_retrievals.load(Ordering::SeqCst) {
            return Err(AppError::ExternalService("Stripe request timed out".into()));
        }
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| {
                AppError::ValidationError(format!("No such checkout session: {}", session_id))
            })
    }

    async fn create_customer(&self, _email: &str, _name: Option<&str>) -> AppResult<CustomerId> {
        let n = self.customers_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CustomerId::new(format!("cus_test{}", n)))
    }

    async fn create_checkout_session(
        &self,
        customer_id: &CustomerId,
        price_id: &str,
        urls: &CheckoutUrls,
    ) -> AppResult<CheckoutResult> {
        *self.last_checkout.lock().unwrap() = Some((
            customer_id.to_string(),
            price_id.to_string(),
            urls.clone(),
        ));
        Ok(CheckoutResult {
            session_id: "cs_test_checkout".to_string(),
            url: Some("https://checkout.stripe.test/c/pay/cs_test_checkout".to_string()),
        })
    }
}

/// `Stripe-Signature` header value for `payload`, signed now.
pub fn sign_webhook_payload(payload: &str, secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let signature = compute_signature(timestamp, payload, secret).unwrap();
    format!("t={},v1={}", timestamp, signature)
}

/// A `checkout.session.completed` event as the provider sends it.
pub fn checkout_completed_payload(event_id: &str, session_id: &str, customer: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "object": "checkout.session",
                "customer": customer,
                "mode": "subscription",
                "payment_status": "paid"
            }
        }
    })
    .to_string()
}
