//! Mock implementations for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::app::Ticker;
use crate::domain::{
    AppError, ChainError, ChainSource, DedupKey, DedupStore, DeliveryError, NotificationRecord,
    StoreError, Transaction, WebhookSender,
};

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }

    fn message(&self) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| "Mock error".to_string())
    }
}

/// Mock chain source.
///
/// Scripted responses queued with `push_ok` / `push_error` are served first;
/// after that every call returns the default transaction list (or fails).
pub struct MockChainSource {
    script: Mutex<VecDeque<Result<Vec<Transaction>, ChainError>>>,
    transactions: Mutex<Vec<Transaction>>,
    config: MockConfig,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, usize)>>,
}

impl MockChainSource {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            transactions: Mutex::new(Vec::new()),
            config,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        let source = Self::new();
        source.set_transactions(transactions);
        source
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_transactions(&self, transactions: Vec<Transaction>) {
        *self.transactions.lock().unwrap() = transactions;
    }

    pub fn push_ok(&self, transactions: Vec<Transaction>) {
        self.script.lock().unwrap().push_back(Ok(transactions));
    }

    pub fn push_error(&self, error: ChainError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(String, usize)> {
        self.last_request.lock().unwrap().clone()
    }
}

impl Default for MockChainSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainSource for MockChainSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((address.to_string(), limit));

        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted.map_err(AppError::Chain);
        }
        if self.config.should_fail {
            return Err(AppError::Chain(ChainError::Network(self.config.message())));
        }
        Ok(self.transactions.lock().unwrap().clone())
    }
}

/// Mock webhook receiver that records every attempt
pub struct MockWebhookSender {
    sent: Mutex<Vec<NotificationRecord>>,
    attempts: AtomicUsize,
    failing_status: Mutex<Option<u16>>,
    failing_hashes: Mutex<HashSet<String>>,
}

impl MockWebhookSender {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            failing_status: Mutex::new(None),
            failing_hashes: Mutex::new(HashSet::new()),
        }
    }

    /// Every delivery is rejected with `status`
    #[must_use]
    pub fn failing(status: u16) -> Self {
        let sender = Self::new();
        sender.set_failing(Some(status));
        sender
    }

    pub fn set_failing(&self, status: Option<u16>) {
        *self.failing_status.lock().unwrap() = status;
    }

    /// Reject deliveries for one transaction hash with a 500
    pub fn fail_hash(&self, hash: impl Into<String>) {
        self.failing_hashes.lock().unwrap().insert(hash.into());
    }

    /// Successfully delivered notifications
    pub fn sent(&self) -> Vec<NotificationRecord> {
        self.sent.lock().unwrap().clone()
    }

    /// All attempts, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for MockWebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookSender for MockWebhookSender {
    async fn send(&self, record: &NotificationRecord) -> Result<(), AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let status = if self.failing_hashes.lock().unwrap().contains(&record.hash) {
            Some(500)
        } else {
            *self.failing_status.lock().unwrap()
        };

        if let Some(status_code) = status {
            return Err(AppError::Delivery(DeliveryError::Rejected {
                status_code,
                body: "Mock rejection".to_string(),
            }));
        }

        self.sent.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// In-memory dedup store
pub struct InMemoryDedupStore {
    records: Mutex<HashMap<DedupKey, NotificationRecord>>,
    fail_reads: bool,
    fail_writes: bool,
    writes: AtomicUsize,
}

impl InMemoryDedupStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_reads: false,
            fail_writes: false,
            writes: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::new()
        }
    }

    /// Look up a record by raw transaction hash
    pub fn get_record(&self, hash: &str) -> Option<NotificationRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&DedupKey::from_hash(hash))
            .cloned()
    }

    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryDedupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn exists(&self, key: &DedupKey) -> Result<bool, AppError> {
        if self.fail_reads {
            return Err(AppError::Store(StoreError::Io("Mock read failure".to_string())));
        }
        Ok(self.records.lock().unwrap().contains_key(key))
    }

    async fn record(&self, key: &DedupKey, record: &NotificationRecord) -> Result<(), AppError> {
        if self.fail_writes {
            return Err(AppError::Store(StoreError::RecordWriteFailed {
                key: key.to_string(),
                message: "Mock write failure".to_string(),
            }));
        }
        self.records
            .lock()
            .unwrap()
            .insert(key.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &DedupKey) -> Result<Option<NotificationRecord>, AppError> {
        if self.fail_reads {
            return Err(AppError::Store(StoreError::Io("Mock read failure".to_string())));
        }
        Ok(self.records.lock().unwrap().get(key).cloned())
    }
}

/// Ticker driven by the test instead of the wall clock
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

impl ManualTicker {
    /// Ticker plus the handle used to fire ticks. Dropping the handle ends the ticker.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedSender<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }

    /// Ticker that fires `ticks` times and then reports exhaustion
    #[must_use]
    pub fn with_ticks(ticks: usize) -> Self {
        let (ticker, tx) = Self::new();
        for _ in 0..ticks {
            let _ = tx.send(());
        }
        ticker
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
