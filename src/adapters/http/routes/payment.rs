use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription::StatusQuery;
use crate::{
    adapters::http::{
        app_state::AppState,
        extract::{AdminUser, CurrentUser},
    },
    app_error::{AppError, AppResult},
    application::use_cases::{
        payment::{PaymentProfile, amount_to_cents},
        subscription::SubscriptionProfile,
    },
    domain::entities::{payment_method::PaymentMethod, payment_status::PaymentStatus},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/createPayment/{subscription_id}", post(create_payment))
        .route(
            "/getPaymentsBySubscription/{subscription_id}",
            get(list_by_subscription),
        )
        .route("/{id}/status", patch(update_status))
}

#[derive(Deserialize)]
struct CreatePaymentQuery {
    amount: f64,
    method: String,
}

/// Payment as returned to clients, with the amount in major units.
#[derive(Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub provider_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentProfile> for PaymentResponse {
    fn from(payment: PaymentProfile) -> Self {
        Self {
            id: payment.id,
            subscription_id: payment.subscription_id,
            amount: payment.amount(),
            currency: payment.currency,
            method: payment.method,
            status: payment.status,
            provider_reference: payment.provider_reference,
            paid_at: payment.paid_at,
            created_at: payment.created_at,
        }
    }
}

#[derive(Serialize)]
struct StatusChangeResponse {
    payment: PaymentResponse,
    subscription: SubscriptionProfile,
}

async fn create_payment(
    State(app_state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(subscription_id): Path<Uuid>,
    Query(query): Query<CreatePaymentQuery>,
) -> AppResult<impl IntoResponse> {
    let amount_cents = amount_to_cents(query.amount)?;
    let method: PaymentMethod = query.method.parse().map_err(AppError::ValidationError)?;

    let payment = app_state
        .payment_use_cases
        .create(identity, subscription_id, amount_cents, method)
        .await?;
    Ok(Json(PaymentResponse::from(payment)))
}

async fn list_by_subscription(
    State(app_state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(subscription_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let payments = app_state
        .payment_use_cases
        .list_for_subscription(identity, subscription_id)
        .await?;
    let body: Vec<PaymentResponse> = payments.into_iter().map(PaymentResponse::from).collect();
    Ok(Json(body))
}

async fn update_status(
    State(app_state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> AppResult<impl IntoResponse> {
    let status: PaymentStatus = query.status.parse().map_err(AppError::ValidationError)?;
    let change = app_state.payment_use_cases.update_status(id, status).await?;
    Ok(Json(StatusChangeResponse {
        payment: change.payment.into(),
        subscription: change.subscription,
    }))
}
