//! Domain types for the watcher pipeline.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Direction of a transfer or message leg relative to the watched address
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Funds or message arriving at the watched address
    Inbound,
    /// Funds or message leaving the watched address
    Outbound,
    /// The source does not expose direction for this payload
    #[default]
    Unknown,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message payload attached to a transaction, in the encoding the chain source returned
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "encoding", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Already-decoded UTF-8 text
    Text(String),
    /// Hex-encoded bytes, with or without a `0x` prefix
    Hex(String),
    /// Standard base64-encoded bytes
    Base64(String),
}

impl Payload {
    /// True when there is nothing to decode
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) | Self::Base64(s) => s.trim().is_empty(),
            Self::Hex(s) => {
                let s = s.trim();
                s.is_empty() || s == "0x" || s == "0X"
            }
        }
    }
}

/// One message leg of a transaction on chains that carry payloads per message
/// (e.g. TON's `in_msg` / `out_msgs`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MessageLeg {
    pub direction: Direction,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub value: Option<String>,
    pub payload: Option<Payload>,
}

/// A transaction as returned by a chain source. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Transaction {
    /// Chain-specific transaction hash
    pub hash: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Direction of the transfer-level payload, if any
    pub direction: Direction,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    /// Transferred amount in the chain's smallest unit, as a decimal string
    pub value: Option<String>,
    /// Payload attached to the transfer itself
    pub payload: Option<Payload>,
    /// Payloads attached to separate message legs
    pub messages: Vec<MessageLeg>,
}

impl Transaction {
    #[must_use]
    pub fn new(hash: impl Into<String>, timestamp: i64) -> Self {
        Self {
            hash: hash.into(),
            timestamp,
            ..Default::default()
        }
    }

    /// Attach a transfer-level payload (builder pattern)
    #[must_use]
    pub fn with_payload(mut self, direction: Direction, payload: Payload) -> Self {
        self.direction = direction;
        self.payload = Some(payload);
        self
    }

    /// Attach a message leg (builder pattern)
    #[must_use]
    pub fn with_message(mut self, leg: MessageLeg) -> Self {
        self.messages.push(leg);
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Chain timestamp as a UTC datetime, `None` if out of range
    pub fn chain_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Outcome of matching a transaction against the order policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    NotTracked,
    /// The payload carries a marker. The order id is `None` when no id could be parsed.
    Tracked { order_id: Option<String> },
}

impl MatchResult {
    pub fn is_tracked(&self) -> bool {
        matches!(self, Self::Tracked { .. })
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::Tracked { order_id } => order_id.as_deref(),
            Self::NotTracked => None,
        }
    }
}

/// Webhook payload and durable proof of delivery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Transaction hash
    #[schema(example = "b6f1c3a9e0d24f7e")]
    pub hash: String,
    /// ISO-8601 UTC time derived from the chain timestamp
    #[schema(example = "2024-05-01T12:00:00.000Z")]
    pub time: String,
    /// Order identifier extracted from the payload
    #[schema(example = "123")]
    pub order_id: Option<String>,
    /// Transferred value, when the chain reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "1500000000")]
    pub value: Option<String>,
}

impl NotificationRecord {
    #[must_use]
    pub fn new(
        hash: impl Into<String>,
        time: DateTime<Utc>,
        order_id: Option<String>,
        value: Option<String>,
    ) -> Self {
        Self {
            hash: hash.into(),
            time: time.to_rfc3339_opts(SecondsFormat::Millis, true),
            order_id,
            value,
        }
    }
}

/// Filesystem-safe, injective key derived from a transaction hash.
///
/// ASCII alphanumerics and `-` are kept; every other byte becomes `_XX`.
/// `_` itself is always escaped, so no two hashes share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    #[must_use]
    pub fn from_hash(hash: &str) -> Self {
        Self(sanitize(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Injective escape used for dedup keys and per-address namespaces
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            let _ = write!(out, "_{:02X}", byte);
        }
    }
    out
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Receiver accepted the webhook. `recorded` is false when the dedup write failed.
    Delivered { recorded: bool },
    /// A record already exists, no network call was made
    Skipped,
    /// The webhook POST did not succeed; the transaction stays unrecorded
    Failed(String),
}

/// Counters for one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CycleReport {
    pub fetched: usize,
    pub tracked: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Delivered but the dedup record could not be written
    pub unrecorded: usize,
}

impl CycleReport {
    pub fn tally(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered { recorded } => {
                self.delivered += 1;
                if !recorded {
                    self.unrecorded += 1;
                }
            }
            DeliveryOutcome::Skipped => self.skipped += 1,
            DeliveryOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Last cycle completed
    Healthy,
    /// Recent fetches failing, or no cycle has completed yet
    Degraded,
    /// Chain source unreachable for several consecutive cycles
    Unhealthy,
}

/// Status snapshot of one watched address
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WatcherHealth {
    #[schema(example = "EQD...address")]
    pub address: String,
    pub status: HealthStatus,
    pub cycles: u64,
    pub consecutive_fetch_failures: u32,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status
    pub status: HealthStatus,
    pub watchers: Vec<WatcherHealth>,
    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
    /// Application version
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(watchers: Vec<WatcherHealth>) -> Self {
        let status = if watchers.is_empty()
            || watchers.iter().all(|w| w.status == HealthStatus::Unhealthy)
        {
            HealthStatus::Unhealthy
        } else if watchers.iter().all(|w| w.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        Self {
            status,
            watchers,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Error type identifier
    #[schema(example = "not_found")]
    pub r#type: String,
    /// Human-readable error message
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_keeps_safe_characters() {
        assert_eq!(DedupKey::from_hash("abc-DEF-123").as_str(), "abc-DEF-123");
    }

    #[test]
    fn test_dedup_key_escapes_unsafe_characters() {
        assert_eq!(DedupKey::from_hash("a/b+c=").as_str(), "a_2Fb_2Bc_3D");
        assert_eq!(DedupKey::from_hash("a_b").as_str(), "a_5Fb");
    }

    #[test]
    fn test_dedup_key_is_injective_on_lossy_replacements() {
        // A naive `/` -> `_` replacement would collide these
        let slash = DedupKey::from_hash("ab/cd");
        let underscore = DedupKey::from_hash("ab_cd");
        let escaped_lookalike = DedupKey::from_hash("ab_2Fcd");
        assert_ne!(slash, underscore);
        assert_ne!(slash, escaped_lookalike);
        assert_ne!(underscore, escaped_lookalike);
    }

    #[test]
    fn test_notification_record_serialization_shape() {
        let time = DateTime::from_timestamp(1_714_564_800, 0).unwrap();
        let record = NotificationRecord::new("tx2", time, Some("123".to_string()), None);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["hash"], "tx2");
        assert_eq!(json["time"], "2024-05-01T12:00:00.000Z");
        assert_eq!(json["orderId"], "123");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_notification_record_null_order_id_is_serialized() {
        let time = DateTime::from_timestamp(0, 0).unwrap();
        let record = NotificationRecord::new("tx", time, None, Some("42".to_string()));
        let json = serde_json::to_value(&record).unwrap();

        assert!(json["orderId"].is_null());
        assert_eq!(json["value"], "42");
        assert_eq!(json["time"], "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_payload_is_empty() {
        assert!(Payload::Text("   ".to_string()).is_empty());
        assert!(Payload::Hex("0x".to_string()).is_empty());
        assert!(Payload::Base64(String::new()).is_empty());
        assert!(!Payload::Hex("0x4f".to_string()).is_empty());
    }

    #[test]
    fn test_cycle_report_tally() {
        let mut report = CycleReport::default();
        report.tally(&DeliveryOutcome::Delivered { recorded: true });
        report.tally(&DeliveryOutcome::Delivered { recorded: false });
        report.tally(&DeliveryOutcome::Skipped);
        report.tally(&DeliveryOutcome::Failed("500".to_string()));

        assert_eq!(report.delivered, 2);
        assert_eq!(report.unrecorded, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_health_response_aggregation() {
        let watcher = |status| WatcherHealth {
            address: "addr".to_string(),
            status,
            cycles: 1,
            consecutive_fetch_failures: 0,
            last_cycle_at: None,
            last_report: None,
            last_error: None,
        };

        let all_ok = HealthResponse::new(vec![watcher(HealthStatus::Healthy)]);
        assert_eq!(all_ok.status, HealthStatus::Healthy);

        let mixed = HealthResponse::new(vec![
            watcher(HealthStatus::Healthy),
            watcher(HealthStatus::Unhealthy),
        ]);
        assert_eq!(mixed.status, HealthStatus::Degraded);

        let down = HealthResponse::new(vec![watcher(HealthStatus::Unhealthy)]);
        assert_eq!(down.status, HealthStatus::Unhealthy);
    }
}
