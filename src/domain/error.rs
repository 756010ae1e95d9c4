//! Error types for the watcher pipeline.

use thiserror::Error;

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Chain source error: {0}")]
    Chain(#[from] ChainError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Dedup store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while reading transactions from a chain data source
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Fetch exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl ChainError {
    /// Build a chain error from a reqwest transport failure
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors raised while POSTing a notification to the webhook receiver
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Receiver rejected notification (status {status_code}): {body}")]
    Rejected { status_code: u16, body: String },
}

impl DeliveryError {
    /// Build a delivery error from a reqwest transport failure
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors raised by the dedup store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Corrupt record for key {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error("Failed to record delivery for key {key}: {message}")]
    RecordWriteFailed { key: String, message: String },
}

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required input: {0}")]
    Missing(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation failed: {0}")]
    Multiple(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}
