use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{
        app_state::AppState,
        extract::{AdminUser, CurrentUser},
    },
    app_error::{AppError, AppResult},
    domain::entities::subscription_status::SubscriptionStatus,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/createSubscription", post(create_subscription))
        .route("/getMySubscription", get(get_my_subscription))
        .route(
            "/getSubscriptionByUserId/{user_id}",
            get(get_subscription_by_user_id),
        )
        .route("/{id}/status", patch(update_status))
}

#[derive(Deserialize)]
pub(super) struct StatusQuery {
    pub status: String,
}

async fn create_subscription(
    State(app_state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> AppResult<impl IntoResponse> {
    let subscription = app_state
        .subscription_use_cases
        .open_for_current_user(identity.user_id)
        .await?;
    Ok(Json(subscription))
}

async fn get_my_subscription(
    State(app_state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> AppResult<impl IntoResponse> {
    let subscription = app_state
        .subscription_use_cases
        .current_for_user(identity.user_id)
        .await?;
    Ok(Json(subscription))
}

async fn get_subscription_by_user_id(
    State(app_state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let subscription = app_state
        .subscription_use_cases
        .current_for_user(user_id)
        .await?;
    Ok(Json(subscription))
}

async fn update_status(
    State(app_state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> AppResult<impl IntoResponse> {
    let status: SubscriptionStatus = query.status.parse().map_err(AppError::ValidationError)?;
    let subscription = app_state
        .subscription_use_cases
        .set_status(id, status)
        .await?;
    Ok(Json(subscription))
}
