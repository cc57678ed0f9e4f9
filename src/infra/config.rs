use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::infra::error::InfraError;

pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Shared with the user service, which issues the identity tokens.
    pub jwt_secret: SecretString,
    pub stripe_secret_key: SecretString,
    pub stripe_webhook_secret: SecretString,
    /// Bound on every call to the payment provider, including the webhook re-fetch.
    pub stripe_timeout: Duration,
    pub webhook_tolerance_secs: i64,
    /// Frontend origin, used for checkout success/cancel redirects. Always ends in `/`.
    pub app_origin: Url,
    pub cors_origin: HeaderValue,
    pub bind_addr: SocketAddr,
    /// JSON log file. Console logging only when unset.
    pub log_file: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let database_url: String = get_env("DATABASE_URL");
        let db_max_connections: u32 = get_env_default("DB_MAX_CONNECTIONS", 5);

        let jwt_secret = SecretString::new(get_env::<String>("JWT_SECRET").into());
        let stripe_secret_key = SecretString::new(get_env::<String>("STRIPE_SECRET_KEY").into());
        let stripe_webhook_secret =
            SecretString::new(get_env::<String>("STRIPE_WEBHOOK_SECRET").into());
        let stripe_timeout_secs: u64 = get_env_default("STRIPE_TIMEOUT_SECS", 10);
        let webhook_tolerance_secs: i64 = get_env_default("WEBHOOK_TOLERANCE_SECS", 300);

        let app_origin = with_trailing_slash(get_env("APP_ORIGIN"));
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .map_err(|_| InfraError::InvalidConfig {
                    var: "CORS_ORIGIN",
                    reason: "not a valid header value",
                })?;
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 8080)));
        let log_file = std::env::var("LOG_FILE").ok().filter(|s| !s.is_empty());

        Ok(Self {
            database_url,
            db_max_connections,
            jwt_secret,
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_timeout: Duration::from_secs(stripe_timeout_secs),
            webhook_tolerance_secs,
            app_origin,
            cors_origin,
            bind_addr,
            log_file,
        })
    }
}

/// `Url::join` drops the last path segment unless the base ends in a slash.
pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
