//! Chain explorer clients implementing [`ChainSource`].

pub mod etherscan;
pub mod toncenter;
pub mod trongrid;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::Client;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::domain::{AppError, ChainError, ChainSource, ConfigError, Transaction};

pub use etherscan::{DEFAULT_ETHERSCAN_URL, EtherscanSource};
pub use toncenter::{DEFAULT_TONCENTER_URL, TonCenterSource};
pub use trongrid::{DEFAULT_TRONGRID_URL, TronGridSource};

/// Supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainKind {
    /// TON via toncenter
    #[default]
    Ton,
    /// Tron via TronGrid
    Tron,
    /// Any Etherscan-compatible EVM explorer
    Evm,
}

impl ChainKind {
    /// Get a human-readable name for logging
    pub fn name(&self) -> &'static str {
        match self {
            ChainKind::Ton => "ton",
            ChainKind::Tron => "tron",
            ChainKind::Evm => "evm",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ChainKind::Ton => DEFAULT_TONCENTER_URL,
            ChainKind::Tron => DEFAULT_TRONGRID_URL,
            ChainKind::Evm => DEFAULT_ETHERSCAN_URL,
        }
    }

    /// Etherscan rejects keyless requests; the others only rate-limit them
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ChainKind::Evm)
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChainKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ton" => Ok(ChainKind::Ton),
            "tron" => Ok(ChainKind::Tron),
            "evm" | "eth" | "ethereum" => Ok(ChainKind::Evm),
            other => Err(AppError::Config(ConfigError::InvalidValue {
                field: "chain".to_string(),
                message: format!("unsupported chain '{other}' (expected ton, tron or evm)"),
            })),
        }
    }
}

/// Build the explorer client for `kind`
pub fn build_chain_source(
    kind: ChainKind,
    base_url: Option<String>,
    api_key: Option<SecretString>,
    http_client: Client,
) -> Result<Arc<dyn ChainSource>, AppError> {
    let source: Arc<dyn ChainSource> = match kind {
        ChainKind::Ton => Arc::new(TonCenterSource::new(http_client, base_url, api_key)),
        ChainKind::Tron => Arc::new(TronGridSource::new(http_client, base_url, api_key)),
        ChainKind::Evm => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config(ConfigError::Missing("api_key (required for evm)".to_string()))
            })?;
            Arc::new(EtherscanSource::new(http_client, base_url, api_key))
        }
    };
    Ok(source)
}

/// Convert explorer rows one at a time.
///
/// A row that does not deserialize into `T`, or that `convert` rejects, is
/// logged with the hash found at `hash_pointer` and left out of the result.
pub(crate) fn decode_rows<T, F>(
    source: &str,
    rows: Vec<Value>,
    hash_pointer: &str,
    mut convert: F,
) -> Vec<Transaction>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Result<Transaction, AppError>,
{
    rows.into_iter()
        .filter_map(|row| {
            let result = T::deserialize(&row)
                .map_err(|e| AppError::Chain(ChainError::ParseError(e.to_string())))
                .and_then(&mut convert);
            match result {
                Ok(tx) => Some(tx),
                Err(e) => {
                    let hash = row
                        .pointer(hash_pointer)
                        .and_then(Value::as_str)
                        .unwrap_or("<unknown>");
                    warn!(source, hash, error = %e, "Skipping malformed transaction");
                    None
                }
            }
        })
        .collect()
}
