use crate::app_error::AppError;
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::SignatureInvalid => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::InvariantViolation(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to clients. Server-side details stay in the logs.
    fn public_message(&self) -> Option<String> {
        match self {
            AppError::Conflict(msg) | AppError::ValidationError(msg) => Some(msg.clone()),
            AppError::ExternalService(_) => Some("Payment provider unavailable".into()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Log the error before it gets converted into a status response.
        if status.is_server_error() {
            tracing::error!(error = ?self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        error_resp(status, self.code().as_str(), self.public_message())
    }
}

fn error_resp(status: StatusCode, code: &str, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code, "message": msg }),
        None => serde_json::json!({ "code": code }),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_client_errors() {
        assert_eq!(
            AppError::Conflict("event full".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn storage_failures_are_server_errors() {
        assert_eq!(
            AppError::Database("connection reset".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::InvariantViolation("seats".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::ExternalService("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn database_details_are_not_exposed() {
        let error = AppError::Database("password authentication failed".into());
        assert!(error.public_message().is_none());
    }
}
