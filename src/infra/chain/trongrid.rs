//! Tron chain source backed by TronGrid's account transactions endpoint.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::decode_rows;

use crate::domain::{AppError, ChainError, ChainSource, Direction, Payload, Transaction};

/// Default TronGrid API base URL
pub const DEFAULT_TRONGRID_URL: &str = "https://api.trongrid.io";

#[derive(Debug, Deserialize)]
struct TronResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TronTransaction {
    #[serde(rename = "txID")]
    tx_id: String,
    /// Milliseconds since epoch
    block_timestamp: i64,
    raw_data: TronRawData,
}

#[derive(Debug, Default, Deserialize)]
struct TronRawData {
    /// Hex-encoded memo
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    contract: Vec<TronContract>,
}

#[derive(Debug, Deserialize)]
struct TronContract {
    parameter: TronParameter,
}

#[derive(Debug, Deserialize)]
struct TronParameter {
    value: TronContractValue,
}

#[derive(Debug, Default, Deserialize)]
struct TronContractValue {
    #[serde(default)]
    amount: Option<u64>,
    #[serde(default)]
    owner_address: Option<String>,
    #[serde(default)]
    to_address: Option<String>,
}

fn into_transaction(tx: TronTransaction, watched: &str) -> Transaction {
    let value = tx
        .raw_data
        .contract
        .into_iter()
        .next()
        .map(|c| c.parameter.value)
        .unwrap_or_default();

    let direction = if value.to_address.as_deref() == Some(watched) {
        Direction::Inbound
    } else if value.owner_address.as_deref() == Some(watched) {
        Direction::Outbound
    } else {
        Direction::Unknown
    };

    let mut transaction = Transaction::new(tx.tx_id, tx.block_timestamp.div_euclid(1000));
    transaction.from = value.owner_address;
    transaction.to = value.to_address;
    transaction.value = value.amount.map(|a| a.to_string());
    transaction.direction = direction;
    transaction.payload = tx
        .raw_data
        .data
        .filter(|d| !d.is_empty())
        .map(Payload::Hex);
    transaction
}

/// TronGrid `/v1/accounts/{address}/transactions` client
#[derive(Debug)]
pub struct TronGridSource {
    http_client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl TronGridSource {
    #[must_use]
    pub fn new(http_client: Client, base_url: Option<String>, api_key: Option<SecretString>) -> Self {
        Self {
            http_client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_TRONGRID_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl ChainSource for TronGridSource {
    fn name(&self) -> &'static str {
        "trongrid"
    }

    #[instrument(skip(self))]
    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, AppError> {
        let url = format!("{}/v1/accounts/{}/transactions", self.base_url, address);
        let limit = limit.to_string();

        let mut request = self.http_client.get(&url).query(&[
            ("limit", limit.as_str()),
            ("only_confirmed", "true"),
            ("visible", "true"),
            ("order_by", "block_timestamp,desc"),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("TRON-PRO-API-KEY", key.expose_secret());
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

        let body: TronResponse = response
            .json()
            .await
            .map_err(|e| AppError::Chain(ChainError::ParseError(e.to_string())))?;

        if !body.success {
            return Err(AppError::Chain(ChainError::ApiError {
                status_code: status.as_u16(),
                message: body.error.unwrap_or_else(|| "success=false".to_string()),
            }));
        }

        debug!(count = body.data.len(), "trongrid transactions received");
        Ok(decode_rows::<TronTransaction, _>(
            self.name(),
            body.data,
            "/txID",
            |tx| Ok(into_transaction(tx, address)),
        ))
    }
}
