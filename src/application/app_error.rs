use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Payment provider error: {0}")]
    ExternalService(String),

    /// Stored state disagrees with itself. Aborts the enclosing transaction.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidCredentials,
    Forbidden,
    ValidationError,
    Conflict,
    SignatureInvalid,
    ExternalServiceError,
    InvariantViolation,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::SignatureInvalid => "SIGNATURE_INVALID",
            ErrorCode::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            ErrorCode::InvariantViolation => "INVARIANT_VIOLATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::Forbidden => ErrorCode::Forbidden,
            AppError::ValidationError(_) => ErrorCode::ValidationError,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::SignatureInvalid => ErrorCode::SignatureInvalid,
            AppError::ExternalService(_) => ErrorCode::ExternalServiceError,
            AppError::InvariantViolation(_) => ErrorCode::InvariantViolation,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether a webhook delivery that failed with this error should be retried by the
    /// provider (5xx) rather than acknowledged (2xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            // Transient errors - retry may succeed
            AppError::Database(_) => true,
            AppError::Internal(_) => true,
            AppError::ExternalService(_) => true,
            AppError::InvariantViolation(_) => true,

            // Expected conditions - won't change with retry
            AppError::NotFound => false,
            AppError::Conflict(_) => false,
            AppError::ValidationError(_) => false,
            AppError::SignatureInvalid => false,
            AppError::InvalidCredentials => false,
            AppError::Forbidden => false,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
