//! Domain traits defining contracts for external systems.

use async_trait::async_trait;

use super::error::AppError;
use super::types::{DedupKey, NotificationRecord, Transaction};

/// Read-only source of recent transactions for an address
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fetch up to `limit` recent transactions for `address`, newest first.
    /// Makes exactly one remote call; retrying is the caller's concern.
    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, AppError>;
}

/// Durable record of delivered notifications
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// True if a delivery was recorded for this key in any process lifetime
    async fn exists(&self, key: &DedupKey) -> Result<bool, AppError>;

    /// Persist proof of delivery. Recording the same key twice is harmless.
    async fn record(&self, key: &DedupKey, record: &NotificationRecord) -> Result<(), AppError>;

    /// Load a stored record
    async fn get(&self, _key: &DedupKey) -> Result<Option<NotificationRecord>, AppError> {
        Err(AppError::Internal("get not supported by this store".to_string()))
    }
}

/// Webhook receiver client
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POST one notification. Any non-2xx status is an error.
    async fn send(&self, record: &NotificationRecord) -> Result<(), AppError>;
}
