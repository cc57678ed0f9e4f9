use thiserror::Error;

/// Infrastructure errors that can occur during application startup.
///
/// Display messages are safe for logs. Debug output includes the `#[source]` chain,
/// which may contain the connection string; log with `%e`, not `?e`.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("Database connection failed. Check DATABASE_URL and ensure the database is running.")]
    DatabaseConnection(#[source] sqlx::Error),

    #[error("Database migration failed")]
    Migration(#[source] sqlx::migrate::MigrateError),

    #[error("Configuration error: {var} is {reason}")]
    InvalidConfig {
        var: &'static str,
        reason: &'static str,
    },

    #[error("HTTP client initialization failed")]
    HttpClient(#[source] reqwest::Error),

    #[error("Log file could not be opened")]
    LogFile(#[source] std::io::Error),

    #[error("TCP bind failed")]
    TcpBind(#[source] std::io::Error),
}

impl From<sqlx::Error> for InfraError {
    fn from(e: sqlx::Error) -> Self {
        InfraError::DatabaseConnection(e)
    }
}

impl From<sqlx::migrate::MigrateError> for InfraError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        InfraError::Migration(e)
    }
}
