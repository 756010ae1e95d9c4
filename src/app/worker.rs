//! Poll loop: drives the watcher service on a fixed interval.
//!
//! The loop is Idle between ticks and Cycle-Running while a cycle executes.
//! Shutdown is only observed between cycles, so an in-flight delivery is
//! never abandoned half way through.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info, warn};

use super::service::WatcherService;
use super::state::WatcherStatus;

/// Default interval between poll cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Source of poll ticks
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. `false` means no more ticks will arrive.
    async fn tick(&mut self) -> bool;
}

/// Wall-clock ticker. The first tick completes immediately.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Poll loop for one watched address
pub struct PollLoop {
    service: Arc<WatcherService>,
    status: Arc<WatcherStatus>,
}

impl PollLoop {
    #[must_use]
    pub fn new(service: Arc<WatcherService>, status: Arc<WatcherStatus>) -> Self {
        Self { service, status }
    }

    /// Run until shutdown is signalled or the ticker is exhausted
    pub async fn run<T: Ticker>(&self, mut ticker: T, mut shutdown_rx: watch::Receiver<bool>) {
        let address = self.service.address().to_string();
        info!(address = %address, "Poll loop started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                ticked = ticker.tick() => {
                    if !ticked {
                        break;
                    }
                    self.run_cycle().await;
                }
            }
        }

        info!(address = %address, "Poll loop stopped");
    }

    /// Run one cycle and publish its outcome. Never fails.
    pub async fn run_cycle(&self) {
        match self.service.run_cycle().await {
            Ok(report) => {
                if report.unrecorded > 0 {
                    warn!(
                        address = %self.service.address(),
                        unrecorded = report.unrecorded,
                        "Some deliveries could not be recorded"
                    );
                }
                self.status.record_success(report);
            }
            Err(e) => {
                error!(address = %self.service.address(), error = %e, "Poll cycle aborted");
                self.status.record_failure(&e);
            }
        }
    }
}

/// Spawn a poll loop on the wall-clock interval
pub fn spawn_poll_loop(
    poll_loop: PollLoop,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_poll_loop_with_ticker(poll_loop, IntervalTicker::new(interval), shutdown_rx)
}

/// Spawn a poll loop driven by a custom ticker
pub fn spawn_poll_loop_with_ticker<T: Ticker + 'static>(
    poll_loop: PollLoop,
    ticker: T,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        poll_loop.run(ticker, shutdown_rx).await;
    })
}
