//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::Client;

use crate::domain::{AppError, ConfigError};

/// Default timeout for every outbound request
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Build a client whose requests are all bounded by `timeout`
pub fn build_http_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            AppError::Config(ConfigError::InvalidValue {
                field: "http_client".to_string(),
                message: e.to_string(),
            })
        })
}
