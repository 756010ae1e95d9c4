//! TON chain source backed by toncenter's v2 HTTP API.
//!
//! Payload text lives on message legs: the single `in_msg` and any number of
//! `out_msgs`. toncenter returns the comment both decoded (`message`) and as
//! base64 under `msg_data` when its type is `msg.dataText`.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::decode_rows;

use crate::domain::{
    AppError, ChainError, ChainSource, Direction, MessageLeg, Payload, Transaction,
};

/// Default toncenter API base URL
pub const DEFAULT_TONCENTER_URL: &str = "https://toncenter.com/api/v2";

#[derive(Debug, Deserialize)]
struct TonResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct TonTransaction {
    utime: i64,
    transaction_id: TonTransactionId,
    #[serde(default)]
    in_msg: Option<TonMessage>,
    #[serde(default)]
    out_msgs: Vec<TonMessage>,
}

#[derive(Debug, Deserialize)]
struct TonTransactionId {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct TonMessage {
    #[serde(default)]
    source: String,
    #[serde(default)]
    destination: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg_data: Option<TonMessageData>,
}

#[derive(Debug, Deserialize)]
struct TonMessageData {
    #[serde(rename = "@type")]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl TonMessage {
    fn payload(&self) -> Option<Payload> {
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            return Some(Payload::Text(message.to_string()));
        }
        let data = self.msg_data.as_ref()?;
        if data.kind.as_deref() != Some("msg.dataText") {
            return None;
        }
        data.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| Payload::Base64(t.to_string()))
    }

    fn into_leg(self, direction: Direction) -> MessageLeg {
        MessageLeg {
            direction,
            payload: self.payload(),
            source: non_empty(&self.source),
            destination: non_empty(&self.destination),
            value: self.value,
        }
    }
}

impl From<TonTransaction> for Transaction {
    fn from(tx: TonTransaction) -> Self {
        let mut messages = Vec::with_capacity(tx.out_msgs.len() + 1);
        let (mut from, mut to, mut value) = (None, None, None);

        if let Some(in_msg) = tx.in_msg {
            let leg = in_msg.into_leg(Direction::Inbound);
            from = leg.source.clone();
            to = leg.destination.clone();
            value = leg.value.clone();
            messages.push(leg);
        }
        messages.extend(
            tx.out_msgs
                .into_iter()
                .map(|m| m.into_leg(Direction::Outbound)),
        );

        Transaction {
            hash: tx.transaction_id.hash,
            from,
            to,
            direction: Direction::Unknown,
            timestamp: tx.utime,
            value,
            payload: None,
            messages,
        }
    }
}

/// toncenter `getTransactions` client
#[derive(Debug)]
pub struct TonCenterSource {
    http_client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl TonCenterSource {
    #[must_use]
    pub fn new(http_client: Client, base_url: Option<String>, api_key: Option<SecretString>) -> Self {
        Self {
            http_client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_TONCENTER_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl ChainSource for TonCenterSource {
    fn name(&self) -> &'static str {
        "toncenter"
    }

    #[instrument(skip(self))]
    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, AppError> {
        let url = format!("{}/getTransactions", self.base_url);
        let limit = limit.to_string();

        let mut request = self
            .http_client
            .get(&url)
            .query(&[("address", address), ("limit", limit.as_str()), ("archival", "true")]);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Chain(ChainError::from_transport(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Chain(ChainError::ApiError {
                status_code: status.as_u16(),
                message: body,
            }));
        }

        let body: TonResponse = response
            .json()
            .await
            .map_err(|e| AppError::Chain(ChainError::ParseError(e.to_string())))?;

        if !body.ok {
            return Err(AppError::Chain(ChainError::ApiError {
                status_code: body.code.unwrap_or(status.as_u16()),
                message: body.error.unwrap_or_else(|| "ok=false".to_string()),
            }));
        }

        debug!(count = body.result.len(), "toncenter transactions received");
        Ok(decode_rows::<TonTransaction, _>(
            self.name(),
            body.result,
            "/transaction_id/hash",
            |tx| Ok(Transaction::from(tx)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_in_and_out_messages() {
        let raw: TonTransaction = serde_json::from_value(serde_json::json!({
            "utime": 1714564800,
            "transaction_id": {"lt": "1", "hash": "abc+/="},
            "in_msg": {
                "source": "EQsender",
                "destination": "EQwatched",
                "value": "1500000000",
                "message": "Order: 123"
            },
            "out_msgs": [{
                "source": "EQwatched",
                "destination": "EQother",
                "value": "1",
                "message": "",
                "msg_data": {"@type": "msg.dataText", "text": "T3JkZXI6IDk="}
            }]
        }))
        .unwrap();

        let tx = Transaction::from(raw);

        assert_eq!(tx.hash, "abc+/=");
        assert_eq!(tx.timestamp, 1714564800);
        assert_eq!(tx.value.as_deref(), Some("1500000000"));
        assert_eq!(tx.from.as_deref(), Some("EQsender"));
        assert_eq!(tx.messages.len(), 2);
        assert_eq!(tx.messages[0].direction, Direction::Inbound);
        assert_eq!(
            tx.messages[0].payload,
            Some(Payload::Text("Order: 123".to_string()))
        );
        assert_eq!(tx.messages[1].direction, Direction::Outbound);
        assert_eq!(
            tx.messages[1].payload,
            Some(Payload::Base64("T3JkZXI6IDk=".to_string()))
        );
    }

    #[test]
    fn test_non_text_message_data_has_no_payload() {
        let raw: TonTransaction = serde_json::from_value(serde_json::json!({
            "utime": 1,
            "transaction_id": {"hash": "h"},
            "in_msg": {
                "source": "",
                "destination": "EQwatched",
                "value": "0",
                "msg_data": {"@type": "msg.dataRaw", "body": "te6cck..."}
            },
            "out_msgs": []
        }))
        .unwrap();

        let tx = Transaction::from(raw);

        assert!(tx.from.is_none());
        assert!(tx.messages[0].payload.is_none());
    }
}
