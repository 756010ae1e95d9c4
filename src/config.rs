//! Validated runtime configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use tracing::warn;
use validator::Validate;

use crate::app::{Backoff, DEFAULT_MARKER, MAX_BACKOFF, MatchPolicy, RetryPolicy};
use crate::domain::{AppError, ValidationError};
use crate::infra::ChainKind;

/// Everything needed to start one watcher per address
#[derive(Debug, Validate)]
pub struct WatcherConfig {
    #[validate(length(min = 1, message = "At least one address is required"))]
    pub addresses: Vec<String>,
    #[validate(url(message = "Webhook URL must be an absolute URL"))]
    pub webhook_url: String,
    pub api_key: Option<SecretString>,
    pub chain: ChainKind,
    #[validate(url(message = "Chain API URL must be an absolute URL"))]
    pub chain_api_url: Option<String>,
    #[validate(range(min = 1, max = 86_400, message = "Poll interval must be 1-86400 seconds"))]
    pub poll_interval_secs: u64,
    #[validate(range(min = 1, max = 1000, message = "Fetch limit must be 1-1000"))]
    pub fetch_limit: usize,
    #[validate(range(min = 1, max = 100, message = "Fetch attempts must be 1-100"))]
    pub fetch_max_attempts: u32,
    #[validate(range(min = 1, max = 300, message = "Backoff base must be 1-300 seconds"))]
    pub fetch_backoff_secs: u64,
    pub fetch_backoff: Backoff,
    #[validate(range(min = 1, max = 300, message = "HTTP timeout must be 1-300 seconds"))]
    pub http_timeout_secs: u64,
    pub dedup_dir: PathBuf,
    pub order_markers: Vec<String>,
    pub order_id_pattern: Option<String>,
    pub inbound_only: bool,
    pub status_addr: Option<SocketAddr>,
}

impl WatcherConfig {
    /// Run field validation plus the cross-field checks derive can't express
    pub fn validated(self) -> Result<Self, AppError> {
        self.validate().map_err(|e| {
            warn!(error = %e, "Configuration rejected");
            AppError::Validation(ValidationError::Multiple(e.to_string()))
        })?;

        if self.chain.requires_api_key() && self.api_key.is_none() {
            return Err(AppError::Validation(ValidationError::InvalidField {
                field: "api_key".to_string(),
                message: format!("required for chain '{}'", self.chain),
            }));
        }

        if !self.retry_policy().delays_strictly_increase() {
            return Err(AppError::Validation(ValidationError::InvalidField {
                field: "fetch_backoff_secs".to_string(),
                message: format!(
                    "{} backoff from {}s over {} attempts would exceed the {}s sleep cap",
                    self.fetch_backoff,
                    self.fetch_backoff_secs,
                    self.fetch_max_attempts,
                    MAX_BACKOFF.as_secs()
                ),
            }));
        }
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.fetch_max_attempts,
            Duration::from_secs(self.fetch_backoff_secs),
            self.fetch_backoff,
        )
    }

    pub fn match_policy(&self) -> Result<MatchPolicy, AppError> {
        MatchPolicy::new(
            &self.order_markers,
            self.order_id_pattern.as_deref(),
            self.inbound_only,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Split a comma-separated list, trimming blanks and dropping repeats
pub fn split_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

/// Markers from a comma list, falling back to the default marker
pub fn parse_markers(raw: Option<&str>) -> Vec<String> {
    let markers = raw.map(split_list).unwrap_or_default();
    if markers.is_empty() {
        vec![DEFAULT_MARKER.to_string()]
    } else {
        markers
    }
}
