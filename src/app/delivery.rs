//! Delivery engine: one webhook attempt per tracked transaction per cycle,
//! with the dedup store as the commit point.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{
    AppError, DedupKey, DedupStore, DeliveryOutcome, MatchResult, NotificationRecord,
    Transaction, ValidationError, WebhookSender,
};

pub struct DeliveryEngine {
    store: Arc<dyn DedupStore>,
    webhook: Arc<dyn WebhookSender>,
}

impl DeliveryEngine {
    #[must_use]
    pub fn new(store: Arc<dyn DedupStore>, webhook: Arc<dyn WebhookSender>) -> Self {
        Self { store, webhook }
    }

    /// Deliver a tracked transaction.
    ///
    /// - `Skipped` if a record already exists (no network call).
    /// - `Failed` if the POST fails; nothing is recorded, so the next cycle retries.
    /// - `Delivered { recorded: false }` if the POST succeeded but the record write did not.
    ///
    /// An `Err` means the store could not be read; nothing was sent.
    #[instrument(skip(self, tx, result), fields(hash = %tx.hash))]
    pub async fn deliver(
        &self,
        tx: &Transaction,
        result: &MatchResult,
    ) -> Result<DeliveryOutcome, AppError> {
        let MatchResult::Tracked { order_id } = result else {
            return Err(AppError::Validation(ValidationError::InvalidField {
                field: "match_result".to_string(),
                message: format!("transaction {} is not tracked", tx.hash),
            }));
        };

        let key = DedupKey::from_hash(&tx.hash);
        if self.store.exists(&key).await? {
            debug!(key = %key, "Already delivered, skipping");
            return Ok(DeliveryOutcome::Skipped);
        }

        let time = tx.chain_time().unwrap_or_else(|| {
            warn!(timestamp = tx.timestamp, "Chain timestamp out of range, using current time");
            Utc::now()
        });
        let record = NotificationRecord::new(&tx.hash, time, order_id.clone(), tx.value.clone());

        if let Err(e) = self.webhook.send(&record).await {
            warn!(order_id = ?record.order_id, error = %e, "Webhook delivery failed");
            return Ok(DeliveryOutcome::Failed(e.to_string()));
        }

        match self.store.record(&key, &record).await {
            Ok(()) => {
                info!(order_id = ?record.order_id, "Webhook delivered");
                Ok(DeliveryOutcome::Delivered { recorded: true })
            }
            Err(e) => {
                error!(
                    key = %key,
                    order_id = ?record.order_id,
                    error = %e,
                    "RecordWriteFailed: webhook delivered but dedup record not written, \
                     transaction may be delivered again next cycle"
                );
                Ok(DeliveryOutcome::Delivered { recorded: false })
            }
        }
    }
}
