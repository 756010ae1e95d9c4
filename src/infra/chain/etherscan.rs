//! EVM chain source backed by the Etherscan `txlist` account API.
//!
//! Etherscan answers `status: "0"` both for real errors and for accounts with
//! no history; the latter is distinguished by its message.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::decode_rows;

use crate::domain::{AppError, ChainError, ChainSource, Direction, Payload, Transaction};

/// Default Etherscan API base URL
pub const DEFAULT_ETHERSCAN_URL: &str = "https://api.etherscan.io/api";

const NO_TRANSACTIONS: &str = "No transactions found";

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    /// A list on success, an error string otherwise
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtherscanTransaction {
    hash: String,
    time_stamp: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    input: String,
}

fn into_transaction(tx: EtherscanTransaction, watched: &str) -> Result<Transaction, AppError> {
    let timestamp = tx.time_stamp.parse::<i64>().map_err(|e| {
        AppError::Chain(ChainError::ParseError(format!(
            "timeStamp '{}' of {}: {}",
            tx.time_stamp, tx.hash, e
        )))
    })?;

    let direction = if tx.to.eq_ignore_ascii_case(watched) {
        Direction::Inbound
    } else if tx.from.eq_ignore_ascii_case(watched) {
        Direction::Outbound
    } else {
        Direction::Unknown
    };

    let input = tx.input.trim_start_matches("0x");
    let mut transaction = Transaction::new(tx.hash, timestamp);
    transaction.direction = direction;
    transaction.value = tx.value;
    transaction.payload = (!input.is_empty()).then(|| Payload::Hex(input.to_string()));
    transaction.from = (!tx.from.is_empty()).then_some(tx.from);
    transaction.to = (!tx.to.is_empty()).then_some(tx.to);
    Ok(transaction)
}

/// Etherscan `module=account&action=txlist` client
#[derive(Debug)]
pub struct EtherscanSource {
    http_client: Client,
    base_url: String,
    api_key: SecretString,
}

impl EtherscanSource {
    #[must_use]
    pub fn new(http_client: Client, base_url: Option<String>, api_key: SecretString) -> Self {
        Self {
            http_client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_ETHERSCAN_URL.to_string()),
            api_key,
        }
    }
}

#[async_trait]
impl ChainSource for EtherscanSource {
    fn name(&self) -> &'static str {
        "etherscan"
    }

    #[instrument(skip(self))]
    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, AppError> {
        let limit = limit.to_string();

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address),
                ("page", "1"),
                ("offset", limit.as_str()),
                ("sort", "desc"),
                ("apikey", self.api_key.expose_secret()),
            ])
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

        let body: EtherscanResponse = response
            .json()
            .await
            .map_err(|e| AppError::Chain(ChainError::ParseError(e.to_string())))?;

        if body.status != "1" {
            if body.message == NO_TRANSACTIONS {
                return Ok(Vec::new());
            }
            let detail = body.result.as_str().unwrap_or_default();
            return Err(AppError::Chain(ChainError::ApiError {
                status_code: status.as_u16(),
                message: format!("{} {}", body.message, detail).trim().to_string(),
            }));
        }

        let rows = match body.result {
            Value::Array(rows) => rows,
            other => {
                return Err(AppError::Chain(ChainError::ParseError(format!(
                    "expected a transaction list, got {other}"
                ))));
            }
        };

        debug!(count = rows.len(), "etherscan transactions received");
        Ok(decode_rows::<EtherscanTransaction, _>(
            self.name(),
            rows,
            "/hash",
            |tx| into_transaction(tx, address),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(from: &str, to: &str, input: &str) -> EtherscanTransaction {
        serde_json::from_value(serde_json::json!({
            "blockNumber": "19000000",
            "timeStamp": "1714564800",
            "hash": "0xabc",
            "from": from,
            "to": to,
            "value": "1000000000000000000",
            "input": input,
            "isError": "0"
        }))
        .unwrap()
    }

    #[test]
    fn test_direction_ignores_address_case() {
        let tx = into_transaction(
            raw("0xsender", "0xAbCdEf", "0x4f726465723a2031"),
            "0xabcdef",
        )
        .unwrap();

        assert_eq!(tx.direction, Direction::Inbound);
        assert_eq!(tx.timestamp, 1_714_564_800);
        assert_eq!(tx.payload, Some(Payload::Hex("4f726465723a2031".to_string())));
    }

    #[test]
    fn test_empty_input_has_no_payload() {
        let tx = into_transaction(raw("0xabcdef", "0xother", "0x"), "0xABCDEF").unwrap();

        assert_eq!(tx.direction, Direction::Outbound);
        assert!(tx.payload.is_none());
    }

    #[test]
    fn test_bad_timestamp_is_parse_error() {
        let mut tx = raw("0xa", "0xb", "0x");
        tx.time_stamp = "soon".to_string();

        assert!(matches!(
            into_transaction(tx, "0xb"),
            Err(AppError::Chain(ChainError::ParseError(_)))
        ));
    }
}
