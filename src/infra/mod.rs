//! Infrastructure layer implementations.

pub mod chain;
pub mod dedup;
pub mod http;
pub mod webhook;

pub use chain::{ChainKind, build_chain_source};
pub use dedup::{DEFAULT_DEDUP_DIR, FileDedupStore};
pub use http::{DEFAULT_HTTP_TIMEOUT, build_http_client};
pub use webhook::HttpWebhookSender;
