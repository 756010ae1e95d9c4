//! Bounded retry with increasing backoff for chain reads.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::{AppError, ChainError};

/// Default number of attempts, counting the first one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Upper bound on a single backoff sleep (5 minutes)
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Shape of the delay curve between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// `attempt * base`
    #[default]
    Linear,
    /// `2^(attempt - 1) * base`
    Exponential,
}

impl Backoff {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Exponential => "exponential",
        }
    }
}

impl std::str::FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            _ => Err(format!("Invalid backoff: {}", s)),
        }
    }
}

impl std::fmt::Display for Backoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Retry policy applied to remote reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts before giving up (at least 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
            backoff: Backoff::Linear,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff,
        }
    }

    /// True when every sleep is longer than the one before it.
    ///
    /// Fails for a zero base delay and for schedules whose later sleeps would
    /// be clipped to [`MAX_BACKOFF`].
    pub fn delays_strictly_increase(&self) -> bool {
        let retries = self.max_attempts.saturating_sub(1);
        if retries == 0 {
            return true;
        }
        if self.base_delay.is_zero() {
            return false;
        }
        let last = match self.backoff {
            Backoff::Linear => self.base_delay.checked_mul(retries),
            // delay_for stops doubling after the 17th attempt
            Backoff::Exponential if retries > 17 => None,
            Backoff::Exponential => self.base_delay.checked_mul(1 << (retries - 1)),
        };
        last.is_some_and(|delay| delay <= MAX_BACKOFF)
    }

    /// Sleep before the retry that follows failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => self
                .base_delay
                .saturating_mul(2_u32.saturating_pow((attempt - 1).min(16))),
        };
        delay.min(MAX_BACKOFF)
    }

    /// Run `op` until it succeeds or `max_attempts` attempts have failed.
    ///
    /// `op` receives the 1-based attempt number. Exhaustion is reported as
    /// [`ChainError::Exhausted`] carrying the last underlying error.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= max_attempts => {
                    error!(operation, attempts = attempt, error = %e, "Retries exhausted");
                    return Err(AppError::Chain(ChainError::Exhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    }));
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn network_error() -> AppError {
        AppError::Chain(ChainError::Network("connection refused".to_string()))
    }

    #[test]
    fn test_linear_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(9), Duration::from_secs(9));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Backoff::Exponential);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(9), Duration::from_secs(256));
        assert_eq!(policy.delay_for(12), MAX_BACKOFF);
    }

    #[test]
    fn test_delays_strictly_increase_within_default_attempts() {
        for backoff in [Backoff::Linear, Backoff::Exponential] {
            let policy = RetryPolicy::new(DEFAULT_MAX_ATTEMPTS, Duration::from_secs(1), backoff);
            let delays: Vec<Duration> = (1..DEFAULT_MAX_ATTEMPTS)
                .map(|a| policy.delay_for(a))
                .collect();
            assert!(delays.windows(2).all(|w| w[0] < w[1]), "{backoff}: {delays:?}");
        }
    }

    #[test]
    fn test_flat_schedules_are_detected() {
        let secs = Duration::from_secs;
        assert!(RetryPolicy::default().delays_strictly_increase());
        assert!(RetryPolicy::new(1, Duration::ZERO, Backoff::Linear).delays_strictly_increase());
        assert!(RetryPolicy::new(10, secs(1), Backoff::Exponential).delays_strictly_increase());
        assert!(RetryPolicy::new(2, secs(300), Backoff::Linear).delays_strictly_increase());

        assert!(!RetryPolicy::new(10, Duration::ZERO, Backoff::Linear).delays_strictly_increase());
        assert!(!RetryPolicy::new(10, secs(60), Backoff::Linear).delays_strictly_increase());
        assert!(!RetryPolicy::new(11, secs(1), Backoff::Exponential).delays_strictly_increase());
        assert!(!RetryPolicy::new(3, secs(300), Backoff::Linear).delays_strictly_increase());
    }

    #[test]
    fn test_backoff_parsing() {
        assert_eq!("linear".parse::<Backoff>().unwrap(), Backoff::Linear);
        assert_eq!("Exponential".parse::<Backoff>().unwrap(), Backoff::Exponential);
        assert!("fibonacci".parse::<Backoff>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_exactly_max_attempts() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let counter = Arc::clone(&calls);
        let result: Result<(), AppError> = policy
            .run("test", |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(network_error())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 10);
        match result {
            Err(AppError::Chain(ChainError::Exhausted { attempts, last_error })) => {
                assert_eq!(attempts, 10);
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        // 1 + 2 + ... + 9 seconds of backoff, no sleep after the final attempt
        assert_eq!(started.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_third_attempt_stops_immediately() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let counter = Arc::clone(&calls);
        let result = policy
            .run("test", |attempt| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        Err(network_error())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy_never_sleeps() {
        let policy = RetryPolicy::new(0, Duration::from_secs(5), Backoff::Linear);
        let started = Instant::now();
        let result: Result<(), AppError> = policy.run("test", |_| async { Err(network_error()) }).await;

        assert!(matches!(
            result,
            Err(AppError::Chain(ChainError::Exhausted { attempts: 1, .. }))
        ));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
