//! Chain fetcher: bounded, retried reads of an address's recent transactions.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::{AppError, ChainSource, Transaction};

use super::retry::RetryPolicy;

/// Default number of recent transactions inspected per cycle
pub const DEFAULT_FETCH_LIMIT: usize = 20;

pub struct ChainFetcher {
    source: Arc<dyn ChainSource>,
    address: String,
    limit: usize,
    retry: RetryPolicy,
}

impl ChainFetcher {
    #[must_use]
    pub fn new(
        source: Arc<dyn ChainSource>,
        address: impl Into<String>,
        limit: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            address: address.into(),
            limit: limit.max(1),
            retry,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Fetch at most `limit` transactions in the order the source returned them.
    ///
    /// Fails with `ChainError::Exhausted` once the retry policy gives up.
    #[instrument(skip(self), fields(address = %self.address, source = self.source.name()))]
    pub async fn fetch(&self) -> Result<Vec<Transaction>, AppError> {
        let mut transactions = self
            .retry
            .run("fetch_transactions", |attempt| {
                debug!(attempt, "Fetching recent transactions");
                self.source.recent_transactions(&self.address, self.limit)
            })
            .await?;

        transactions.truncate(self.limit);
        debug!(count = transactions.len(), "Fetched transactions");
        Ok(transactions)
    }
}
