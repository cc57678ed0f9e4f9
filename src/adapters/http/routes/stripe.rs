use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::{
        app_state::AppState,
        extract::{AdminUser, CurrentUser},
    },
    app_error::{AppError, AppResult},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-customer/{user_id}", post(create_customer))
        .route("/create-checkout-session", post(create_checkout_session))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutQuery {
    price_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerResponse {
    customer_id: String,
}

#[derive(Serialize)]
struct CheckoutResponse {
    url: String,
}

async fn create_customer(
    State(app_state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let customer_id = app_state.billing_use_cases.create_customer(user_id).await?;
    Ok(Json(CustomerResponse {
        customer_id: customer_id.0,
    }))
}

async fn create_checkout_session(
    State(app_state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Query(query): Query<CheckoutQuery>,
) -> AppResult<impl IntoResponse> {
    let result = app_state
        .billing_use_cases
        .create_checkout_session(identity.user_id, &query.price_id)
        .await?;
    let url = result
        .url
        .ok_or_else(|| AppError::ExternalService("Checkout session has no URL".into()))?;
    Ok(Json(CheckoutResponse { url }))
}
