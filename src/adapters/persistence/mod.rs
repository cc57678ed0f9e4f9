use sqlx::PgPool;

use crate::app_error::AppError;

pub mod event;
pub mod payment;
pub mod reconciliation;
pub mod subscription;
pub mod user;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    tracing::debug!(constraint = db_err.constraint(), "Unique violation");
                    AppError::Conflict("A record with this value already exists".into())
                } else if db_err.is_foreign_key_violation() {
                    AppError::NotFound
                } else if db_err.is_check_violation() {
                    // Only invariants are expressed as CHECK constraints.
                    tracing::error!(
                        constraint = db_err.constraint(),
                        error = %db_err.message(),
                        "Check constraint violated"
                    );
                    AppError::InvariantViolation(format!(
                        "constraint {} violated",
                        db_err.constraint().unwrap_or("unknown")
                    ))
                } else {
                    // Log the actual error for debugging, but don't expose details
                    tracing::error!(error = ?err, "Database error");
                    AppError::Database("Database operation failed".into())
                }
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}
