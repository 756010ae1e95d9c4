//! Shared watcher status and application state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::domain::{AppError, CycleReport, DedupStore, HealthStatus, WatcherHealth};

/// Consecutive exhausted fetches before a watcher is reported unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Default)]
struct StatusInner {
    cycles: u64,
    consecutive_fetch_failures: u32,
    last_cycle_at: Option<DateTime<Utc>>,
    last_report: Option<CycleReport>,
    last_error: Option<String>,
}

/// Status of one poll loop, updated after every cycle
#[derive(Debug)]
pub struct WatcherStatus {
    address: String,
    inner: RwLock<StatusInner>,
}

impl WatcherStatus {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            inner: RwLock::new(StatusInner::default()),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn record_success(&self, report: CycleReport) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.cycles += 1;
        inner.consecutive_fetch_failures = 0;
        inner.last_cycle_at = Some(Utc::now());
        inner.last_report = Some(report);
        inner.last_error = None;
    }

    pub fn record_failure(&self, error: &AppError) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.cycles += 1;
        inner.consecutive_fetch_failures += 1;
        inner.last_cycle_at = Some(Utc::now());
        inner.last_error = Some(error.to_string());
    }

    pub fn snapshot(&self) -> WatcherHealth {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let status = if inner.consecutive_fetch_failures >= UNHEALTHY_AFTER_FAILURES {
            HealthStatus::Unhealthy
        } else if inner.consecutive_fetch_failures > 0 || inner.cycles == 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        WatcherHealth {
            address: self.address.clone(),
            status,
            cycles: inner.cycles,
            consecutive_fetch_failures: inner.consecutive_fetch_failures,
            last_cycle_at: inner.last_cycle_at,
            last_report: inner.last_report.clone(),
            last_error: inner.last_error.clone(),
        }
    }
}

/// State shared with the status API
#[derive(Clone, Default)]
pub struct AppState {
    pub watchers: Vec<Arc<WatcherStatus>>,
    /// Dedup stores keyed by watched address
    pub stores: HashMap<String, Arc<dyn DedupStore>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watcher and its dedup store (builder pattern)
    #[must_use]
    pub fn with_watcher(mut self, status: Arc<WatcherStatus>, store: Arc<dyn DedupStore>) -> Self {
        self.stores.insert(status.address().to_string(), store);
        self.watchers.push(status);
        self
    }

    pub fn store_for(&self, address: &str) -> Option<&Arc<dyn DedupStore>> {
        self.stores.get(address)
    }
}
