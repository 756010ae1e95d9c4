//! Test doubles for the watcher pipeline.

pub mod mocks;

pub use mocks::{
    InMemoryDedupStore, ManualTicker, MockChainSource, MockConfig, MockWebhookSender,
};
