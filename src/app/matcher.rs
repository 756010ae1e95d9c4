//! Order matcher: decides whether a transaction is a tracked payment and
//! extracts its order identifier.
//!
//! Matching is pure. Malformed payloads, undecodable bytes and missing
//! ids never produce an error; they just mean "not tracked" or "no id".

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;

use crate::domain::{AppError, ConfigError, Direction, MatchResult, Payload, Transaction};

/// Marker used when none is configured
pub const DEFAULT_MARKER: &str = "order:";

/// Matching policy: which markers count and how the order id is extracted
#[derive(Debug, Clone)]
pub struct MatchPolicy {
    /// Lowercased marker substrings
    markers: Vec<String>,
    /// Capture group 1 is the order id
    order_id_pattern: Regex,
    /// Only inspect payloads arriving at the watched address
    inbound_only: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        let markers = vec![DEFAULT_MARKER.to_string()];
        let order_id_pattern = default_pattern(&markers);
        Self {
            markers,
            order_id_pattern,
            inbound_only: true,
        }
    }
}

/// `(?i)(?:m1|m2)\s*([^\s,;|]+)`: the id runs from the marker to the next delimiter
fn default_pattern(markers: &[String]) -> Regex {
    let alternatives: Vec<String> = markers.iter().map(|m| regex::escape(m)).collect();
    let pattern = format!(r"(?i)(?:{})\s*([^\s,;|]+)", alternatives.join("|"));
    // Escaped literals joined by `|` always form a valid pattern
    Regex::new(&pattern).expect("escaped marker pattern is valid")
}

impl MatchPolicy {
    /// Build a policy from configured markers and an optional custom id pattern.
    pub fn new(
        markers: &[String],
        order_id_pattern: Option<&str>,
        inbound_only: bool,
    ) -> Result<Self, AppError> {
        let markers: Vec<String> = markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        if markers.is_empty() {
            return Err(AppError::Config(ConfigError::InvalidValue {
                field: "markers".to_string(),
                message: "at least one non-empty marker is required".to_string(),
            }));
        }

        let order_id_pattern = match order_id_pattern.filter(|p| !p.trim().is_empty()) {
            Some(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| {
                    AppError::Config(ConfigError::InvalidValue {
                        field: "order_id_pattern".to_string(),
                        message: e.to_string(),
                    })
                })?;
                if regex.captures_len() < 2 {
                    return Err(AppError::Config(ConfigError::InvalidValue {
                        field: "order_id_pattern".to_string(),
                        message: "pattern must contain a capture group for the order id"
                            .to_string(),
                    }));
                }
                regex
            }
            None => default_pattern(&markers),
        };

        Ok(Self {
            markers,
            order_id_pattern,
            inbound_only,
        })
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn inbound_only(&self) -> bool {
        self.inbound_only
    }
}

/// Applies a [`MatchPolicy`] to transactions
#[derive(Debug, Clone, Default)]
pub struct OrderMatcher {
    policy: MatchPolicy,
}

impl OrderMatcher {
    #[must_use]
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    /// Classify a transaction. The first candidate payload carrying a marker wins.
    pub fn match_transaction(&self, tx: &Transaction) -> MatchResult {
        self.candidate_payloads(tx)
            .filter_map(decode_payload)
            .find_map(|text| self.match_text(&text))
            .unwrap_or(MatchResult::NotTracked)
    }

    /// Match already-decoded text. `None` when no marker is present.
    pub fn match_text(&self, text: &str) -> Option<MatchResult> {
        let lowered = text.to_lowercase();
        if !self.policy.markers.iter().any(|m| lowered.contains(m)) {
            return None;
        }

        let order_id = self
            .policy
            .order_id_pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|id| !id.is_empty());

        Some(MatchResult::Tracked { order_id })
    }

    fn candidate_payloads<'a>(&'a self, tx: &'a Transaction) -> impl Iterator<Item = &'a Payload> {
        let inbound_only = self.policy.inbound_only;

        let legs = tx
            .messages
            .iter()
            .filter(move |leg| !inbound_only || leg.direction == Direction::Inbound)
            .filter_map(|leg| leg.payload.as_ref());

        let transfer = tx
            .payload
            .as_ref()
            .filter(|_| !inbound_only || tx.direction != Direction::Outbound);

        legs.chain(transfer)
    }
}

/// Decode a payload to text. `None` for empty payloads and decode failures.
pub fn decode_payload(payload: &Payload) -> Option<String> {
    if payload.is_empty() {
        return None;
    }

    let text = match payload {
        Payload::Text(text) => text.clone(),
        Payload::Hex(data) => {
            let data = data.trim();
            let data = data
                .strip_prefix("0x")
                .or_else(|| data.strip_prefix("0X"))
                .unwrap_or(data);
            String::from_utf8(hex::decode(data).ok()?).ok()?
        }
        Payload::Base64(data) => String::from_utf8(BASE64.decode(data.trim()).ok()?).ok()?,
    };

    let text = text.trim_end_matches('\0');
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageLeg;

    fn inbound_text(hash: &str, text: &str) -> Transaction {
        Transaction::new(hash, 1_700_000_000)
            .with_payload(Direction::Inbound, Payload::Text(text.to_string()))
    }

    fn tracked(id: Option<&str>) -> MatchResult {
        MatchResult::Tracked {
            order_id: id.map(str::to_string),
        }
    }

    #[test]
    fn test_no_payload_is_not_tracked() {
        let matcher = OrderMatcher::default();
        let tx = Transaction::new("tx", 1);
        assert_eq!(matcher.match_transaction(&tx), MatchResult::NotTracked);
    }

    #[test]
    fn test_empty_payloads_are_not_tracked() {
        let matcher = OrderMatcher::default();
        for payload in [
            Payload::Text(String::new()),
            Payload::Text("   ".to_string()),
            Payload::Hex("0x".to_string()),
            Payload::Base64(String::new()),
        ] {
            let tx = Transaction::new("tx", 1).with_payload(Direction::Inbound, payload);
            assert_eq!(matcher.match_transaction(&tx), MatchResult::NotTracked);
        }
    }

    #[test]
    fn test_marker_extracts_order_id() {
        let matcher = OrderMatcher::default();
        let tx = inbound_text("tx2", "Order: 123");
        assert_eq!(matcher.match_transaction(&tx), tracked(Some("123")));
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        let matcher = OrderMatcher::default();
        assert_eq!(
            matcher.match_transaction(&inbound_text("tx", "payment for ORDER:abc-9, thanks")),
            tracked(Some("abc-9"))
        );
    }

    #[test]
    fn test_marker_without_id_is_still_tracked() {
        let matcher = OrderMatcher::default();
        assert_eq!(
            matcher.match_transaction(&inbound_text("tx", "order:   ")),
            tracked(None)
        );
        assert_eq!(
            matcher.match_transaction(&inbound_text("tx", "order:;")),
            tracked(None)
        );
    }

    #[test]
    fn test_text_without_marker_is_not_tracked() {
        let matcher = OrderMatcher::default();
        assert_eq!(
            matcher.match_transaction(&inbound_text("tx", "gm, sending 5 TON")),
            MatchResult::NotTracked
        );
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let matcher = OrderMatcher::default();
        let tx = inbound_text("tx", "Order: 777|extra");
        let first = matcher.match_transaction(&tx);
        let second = matcher.match_transaction(&tx);
        assert_eq!(first, second);
        assert_eq!(first.order_id(), Some("777"));
    }

    #[test]
    fn test_hex_payload_is_decoded() {
        let matcher = OrderMatcher::default();
        let tx = Transaction::new("tx", 1).with_payload(
            Direction::Inbound,
            Payload::Hex(format!("0x{}", hex::encode("Order: 55"))),
        );
        assert_eq!(matcher.match_transaction(&tx), tracked(Some("55")));
    }

    #[test]
    fn test_hex_payload_with_trailing_nul_padding() {
        let matcher = OrderMatcher::default();
        let mut bytes = b"order:42".to_vec();
        bytes.extend_from_slice(&[0, 0, 0]);
        let tx = Transaction::new("tx", 1)
            .with_payload(Direction::Unknown, Payload::Hex(hex::encode(bytes)));
        assert_eq!(matcher.match_transaction(&tx), tracked(Some("42")));
    }

    #[test]
    fn test_undecodable_payloads_are_not_tracked() {
        let matcher = OrderMatcher::default();
        for payload in [
            Payload::Hex("zz-not-hex".to_string()),
            Payload::Hex("abc".to_string()),
            Payload::Hex("ff fe".to_string()),
            Payload::Hex("fffe".to_string()),
            Payload::Base64("***".to_string()),
        ] {
            let tx = Transaction::new("tx", 1).with_payload(Direction::Inbound, payload);
            assert_eq!(matcher.match_transaction(&tx), MatchResult::NotTracked);
        }
    }

    #[test]
    fn test_base64_payload_is_decoded() {
        let matcher = OrderMatcher::default();
        let tx = Transaction::new("tx", 1).with_payload(
            Direction::Inbound,
            Payload::Base64(BASE64.encode("Order: X1")),
        );
        assert_eq!(matcher.match_transaction(&tx), tracked(Some("X1")));
    }

    #[test]
    fn test_outbound_payload_ignored_when_inbound_only() {
        let matcher = OrderMatcher::default();
        let tx = Transaction::new("tx", 1)
            .with_payload(Direction::Outbound, Payload::Text("Order: 1".to_string()));
        assert_eq!(matcher.match_transaction(&tx), MatchResult::NotTracked);

        let any_direction = OrderMatcher::new(
            MatchPolicy::new(&[DEFAULT_MARKER.to_string()], None, false).unwrap(),
        );
        assert_eq!(any_direction.match_transaction(&tx), tracked(Some("1")));
    }

    #[test]
    fn test_unknown_direction_transfer_payload_is_inspected() {
        let matcher = OrderMatcher::default();
        let tx = Transaction::new("tx", 1)
            .with_payload(Direction::Unknown, Payload::Text("Order: 9".to_string()));
        assert_eq!(matcher.match_transaction(&tx), tracked(Some("9")));
    }

    #[test]
    fn test_message_legs_only_inbound_counts() {
        let matcher = OrderMatcher::default();
        let outbound = MessageLeg {
            direction: Direction::Outbound,
            payload: Some(Payload::Text("Order: out".to_string())),
            ..Default::default()
        };
        let inbound = MessageLeg {
            direction: Direction::Inbound,
            payload: Some(Payload::Text("Order: in".to_string())),
            ..Default::default()
        };

        let only_out = Transaction::new("tx", 1).with_message(outbound.clone());
        assert_eq!(matcher.match_transaction(&only_out), MatchResult::NotTracked);

        let both = Transaction::new("tx", 1)
            .with_message(outbound)
            .with_message(inbound);
        assert_eq!(matcher.match_transaction(&both), tracked(Some("in")));
    }

    #[test]
    fn test_domain_marker() {
        let policy = MatchPolicy::new(&["pay.example.com".to_string()], None, true).unwrap();
        let matcher = OrderMatcher::new(policy);

        assert_eq!(
            matcher.match_transaction(&inbound_text("tx", "Pay.Example.com 8812")),
            tracked(Some("8812"))
        );
        assert_eq!(
            matcher.match_transaction(&inbound_text("tx", "pay.example.org 8812")),
            MatchResult::NotTracked
        );
    }

    #[test]
    fn test_custom_order_pattern() {
        let policy = MatchPolicy::new(
            &["shop.example.com".to_string()],
            Some(r"(?i)shop\.example\.com/orders/(\d+)"),
            true,
        )
        .unwrap();
        let matcher = OrderMatcher::new(policy);

        assert_eq!(
            matcher.match_transaction(&inbound_text("tx", "https://shop.example.com/orders/991")),
            tracked(Some("991"))
        );
        // Marker present but the pattern does not match
        assert_eq!(
            matcher.match_transaction(&inbound_text("tx", "shop.example.com thanks")),
            tracked(None)
        );
    }

    #[test]
    fn test_policy_rejects_bad_configuration() {
        assert!(matches!(
            MatchPolicy::new(&[" ".to_string()], None, true),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            MatchPolicy::new(&["order:".to_string()], Some("("), true),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            MatchPolicy::new(&["order:".to_string()], Some("order:\\d+"), true),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_marker_with_regex_metacharacters_is_literal() {
        let policy = MatchPolicy::new(&["#order(".to_string()], None, true).unwrap();
        let matcher = OrderMatcher::new(policy);
        assert_eq!(
            matcher.match_transaction(&inbound_text("tx", "#ORDER( 5")),
            tracked(Some("5"))
        );
    }
}
