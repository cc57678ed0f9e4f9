//! HTTP client factory with consistent timeout configuration.
//!
//! Outbound clients are built here rather than with `reqwest::Client::new()`, so every
//! external call has a bounded connect and request time.

use reqwest::Client;
use std::time::Duration;

/// Default connect timeout (TCP handshake + TLS).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client whose whole request/response cycle is bounded by `timeout`. The connect
/// timeout never exceeds it.
pub fn try_build_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
}
