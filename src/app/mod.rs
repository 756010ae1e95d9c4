//! Application layer: the poll → filter → deduplicate → deliver → record pipeline.

pub mod delivery;
pub mod fetcher;
pub mod matcher;
pub mod retry;
pub mod service;
pub mod state;
pub mod worker;

pub use delivery::DeliveryEngine;
pub use fetcher::{ChainFetcher, DEFAULT_FETCH_LIMIT};
pub use matcher::{DEFAULT_MARKER, MatchPolicy, OrderMatcher, decode_payload};
pub use retry::{Backoff, DEFAULT_MAX_ATTEMPTS, MAX_BACKOFF, RetryPolicy};
pub use service::WatcherService;
pub use state::{AppState, WatcherStatus};
pub use worker::{
    DEFAULT_POLL_INTERVAL, IntervalTicker, PollLoop, Ticker, spawn_poll_loop,
    spawn_poll_loop_with_ticker,
};
