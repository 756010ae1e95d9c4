//! Domain layer containing core types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    AppError, ChainError, ConfigError, DeliveryError, StoreError, ValidationError,
};
pub use traits::{ChainSource, DedupStore, WebhookSender};
pub use types::{
    CycleReport, DedupKey, DeliveryOutcome, Direction, ErrorDetail, ErrorResponse,
    HealthResponse, HealthStatus, MatchResult, MessageLeg, NotificationRecord, Payload,
    Transaction, WatcherHealth, sanitize,
};
