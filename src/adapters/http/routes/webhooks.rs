//! Payment provider webhook endpoint.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};

use crate::{adapters::http::app_state::AppState, app_error::AppError};

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(handle_webhook))
}

fn signature_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("stripe-signature")
        .or_else(|| headers.get("signature"))
        .and_then(|v| v.to_str().ok())
}

/// POST /api/payment/webhook
///
/// 200 once the delivery is applied, recognised as a duplicate, or deliberately
/// skipped. 400 for a bad signature or payload. 500 asks the provider to retry.
async fn handle_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(signature) = signature_header(&headers) else {
        tracing::warn!("Webhook delivery without signature header");
        return AppError::SignatureInvalid.into_response();
    };

    match app_state
        .webhook_use_cases
        .handle_delivery(&body, signature)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({ "received": true, "outcome": outcome.label() })),
        )
            .into_response(),
        Err(e @ (AppError::SignatureInvalid | AppError::ValidationError(_))) => e.into_response(),
        Err(e) if e.is_retryable() => webhook_retryable_error(&e).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, retryable = false, "Webhook delivery acknowledged without effect");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "received": true, "outcome": "skipped" })),
            )
                .into_response()
        }
    }
}

/// Returns 500 so the provider redelivers the event.
fn webhook_retryable_error(error: &AppError) -> StatusCode {
    tracing::error!(
        error = %error,
        retryable = true,
        "Webhook processing failed, returning 500 for provider retry"
    );
    StatusCode::INTERNAL_SERVER_ERROR
}
