use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{
        app_state::AppState,
        extract::{AdminUser, CurrentUser},
    },
    app_error::AppResult,
    application::use_cases::event::EventInput,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/retrieve-all-events", get(list_events))
        .route("/retrieve-event/{id}", get(get_event))
        .route("/add-event", post(add_event))
        .route("/modify-event", put(modify_event))
        .route("/remove-event/{id}", post(remove_event).delete(remove_event))
        .route("/register/{id}", post(register))
        .route("/unregister/{id}", post(unregister))
        .route("/my-events", get(my_events))
}

#[derive(Deserialize)]
struct ModifyEventRequest {
    id: Uuid,
    #[serde(flatten)]
    event: EventInput,
}

async fn list_events(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let events = app_state.event_use_cases.list_events().await?;
    Ok(Json(events))
}

async fn get_event(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let event = app_state.event_use_cases.get_event(id).await?;
    Ok(Json(event))
}

async fn add_event(
    State(app_state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<EventInput>,
) -> AppResult<impl IntoResponse> {
    let event = app_state.event_use_cases.create_event(payload).await?;
    Ok(Json(event))
}

async fn modify_event(
    State(app_state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<ModifyEventRequest>,
) -> AppResult<impl IntoResponse> {
    let event = app_state
        .event_use_cases
        .update_event(payload.id, payload.event)
        .await?;
    Ok(Json(event))
}

async fn remove_event(
    State(app_state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    app_state.event_use_cases.remove_event(id).await?;
    Ok(StatusCode::OK)
}

async fn register(
    State(app_state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(event_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    app_state
        .registration_use_cases
        .register(identity.user_id, event_id)
        .await?;
    Ok(StatusCode::OK)
}

async fn unregister(
    State(app_state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(event_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    app_state
        .registration_use_cases
        .unregister(identity.user_id, event_id)
        .await?;
    Ok(StatusCode::OK)
}

async fn my_events(
    State(app_state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> AppResult<impl IntoResponse> {
    let events = app_state
        .registration_use_cases
        .list_my_events(identity.user_id)
        .await?;
    Ok(Json(events))
}
