//! HTTP webhook sender.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::domain::{AppError, DeliveryError, NotificationRecord, WebhookSender};

/// POSTs notification records as JSON to a fixed URL
#[derive(Debug, Clone)]
pub struct HttpWebhookSender {
    http_client: Client,
    url: String,
}

impl HttpWebhookSender {
    #[must_use]
    pub fn new(http_client: Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    #[instrument(skip(self, record), fields(hash = %record.hash))]
    async fn send(&self, record: &NotificationRecord) -> Result<(), AppError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(record)
            .send()
            .await
            .map_err(|e| AppError::Delivery(DeliveryError::from_transport(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Delivery(DeliveryError::Rejected {
                status_code: status.as_u16(),
                body,
            }));
        }

        debug!(status = %status, "Webhook accepted");
        Ok(())
    }
}
