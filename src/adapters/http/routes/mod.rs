pub mod event;
pub mod payment;
pub mod stripe;
pub mod subscription;
pub mod webhooks;

use axum::{Json, Router, routing::get};

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/event", event::router())
        .nest("/api/subscription", subscription::router())
        .nest("/api/payment", payment::router().merge(webhooks::router()))
        .nest("/api/stripe", stripe::router())
        .route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
