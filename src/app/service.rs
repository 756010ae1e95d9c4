//! Watcher service: one fetch → match → deliver pass over an address.

use tracing::{debug, error, info, instrument};

use crate::domain::{AppError, CycleReport};

use super::delivery::DeliveryEngine;
use super::fetcher::ChainFetcher;
use super::matcher::OrderMatcher;

/// Pipeline for a single watched address
pub struct WatcherService {
    fetcher: ChainFetcher,
    matcher: OrderMatcher,
    delivery: DeliveryEngine,
}

impl WatcherService {
    #[must_use]
    pub fn new(fetcher: ChainFetcher, matcher: OrderMatcher, delivery: DeliveryEngine) -> Self {
        Self {
            fetcher,
            matcher,
            delivery,
        }
    }

    pub fn address(&self) -> &str {
        self.fetcher.address()
    }

    /// Run one poll cycle.
    ///
    /// Only a fetch failure aborts the cycle. Per-transaction delivery errors are
    /// logged and counted as failures so the rest of the batch still runs.
    #[instrument(skip(self), fields(address = %self.address()))]
    pub async fn run_cycle(&self) -> Result<CycleReport, AppError> {
        let transactions = self.fetcher.fetch().await?;

        let mut report = CycleReport {
            fetched: transactions.len(),
            ..Default::default()
        };

        for tx in &transactions {
            let result = self.matcher.match_transaction(tx);
            if !result.is_tracked() {
                debug!(hash = %tx.hash, "Not tracked");
                continue;
            }
            report.tracked += 1;

            match self.delivery.deliver(tx, &result).await {
                Ok(outcome) => report.tally(&outcome),
                Err(e) => {
                    error!(hash = %tx.hash, error = ?e, "Failed to process transaction");
                    report.failed += 1;
                }
            }
        }

        if report.tracked > 0 {
            info!(
                fetched = report.fetched,
                tracked = report.tracked,
                delivered = report.delivered,
                skipped = report.skipped,
                failed = report.failed,
                unrecorded = report.unrecorded,
                "Poll cycle complete"
            );
        } else {
            debug!(fetched = report.fetched, "Poll cycle complete, nothing tracked");
        }

        Ok(report)
    }
}
