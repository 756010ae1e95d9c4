//! Order webhook watcher.
//!
//! Polls an address's recent transactions, picks out the ones that carry a
//! payment-order marker and delivers one webhook per transaction, using a
//! durable dedup store as the commit point.

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
