//! In-memory backend double with knobs for failure, latency and push.

use crate::backend::{ChangeStream, CounterBackend};
use crate::errors::ClientError;
use crate::models::{ChangeEvent, CountryCode, CountryTaps};
use futures::stream::{self, StreamExt};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};
use tokio::sync::{Semaphore, mpsc};

pub(crate) struct FakeBackend {
    increments: Mutex<Vec<(CountryCode, u64)>>,
    total: AtomicU64,
    rows: Mutex<Vec<CountryTaps>>,
    pub total_reads: AtomicUsize,
    pub leaderboard_reads: AtomicUsize,
    pub fail_increments: AtomicBool,
    pub fail_reads: AtomicBool,
    gate: Option<Arc<Semaphore>>,
    push_rx: Mutex<Option<mpsc::UnboundedReceiver<ChangeEvent>>>,
    push_tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        Self {
            increments: Mutex::new(Vec::new()),
            total: AtomicU64::new(0),
            rows: Mutex::new(Vec::new()),
            total_reads: AtomicUsize::new(0),
            leaderboard_reads: AtomicUsize::new(0),
            fail_increments: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            gate: None,
            push_rx: Mutex::new(Some(push_rx)),
            push_tx,
        }
    }

    /// Increments block until [`FakeBackend::release`] hands out a permit.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new()
        };
        (backend, gate)
    }

    /// Subscribing fails, as when the push transport is blocked.
    pub fn without_push(self) -> Self {
        self.push_rx.lock().unwrap().take();
        self
    }

    pub fn increments(&self) -> Vec<(CountryCode, u64)> {
        self.increments.lock().unwrap().clone()
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn set_rows(&self, rows: &[(&str, u64)]) {
        *self.rows.lock().unwrap() = rows
            .iter()
            .map(|(code, taps)| CountryTaps {
                country_code: CountryCode::parse(code).unwrap(),
                taps: *taps,
            })
            .collect();
    }

    pub fn push(&self, event: ChangeEvent) {
        let _ = self.push_tx.send(event);
    }
}

impl CounterBackend for FakeBackend {
    async fn increment_taps(&self, country: &CountryCode, amount: u64) -> Result<(), ClientError> {
        self.increments.lock().unwrap().push((country.clone(), amount));
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(ClientError::Backend("increment refused".to_string()));
        }
        Ok(())
    }

    async fn global_total(&self) -> Result<u64, ClientError> {
        self.total_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ClientError::Backend("read refused".to_string()));
        }
        Ok(self.total.load(Ordering::SeqCst))
    }

    async fn top_countries(&self, limit: usize) -> Result<Vec<CountryTaps>, ClientError> {
        self.leaderboard_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ClientError::Backend("read refused".to_string()));
        }
        let mut rows = self.rows.lock().unwrap().clone();
        rows.truncate(limit);
        Ok(rows)
    }

    async fn subscribe_changes(&self) -> Result<ChangeStream, ClientError> {
        let rx = self.push_rx.lock().unwrap().take();
        let rx = rx.ok_or_else(|| ClientError::Backend("push unavailable".to_string()))?;
        Ok(stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) }).boxed())
    }
}
