use crate::backend::CounterBackend;
use crate::models::CountryCode;
use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One recorded tap per physical press. Release, cancel and pointer-leave all
/// end a press.
#[derive(Debug, Default)]
pub struct PressTracker {
    active: AtomicBool,
}

impl PressTracker {
    /// Returns true when this starts a new press.
    pub fn begin(&self) -> bool {
        !self.active.swap(true, Ordering::SeqCst)
    }

    pub fn end(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Accumulates taps and commits them to the backend in debounced batches.
///
/// Delivery is at most once: the pending amount is zeroed when a flush is
/// dispatched, and a failed call drops it.
pub struct IncrementBatcher<B: CounterBackend> {
    inner: Arc<Inner<B>>,
}

struct Inner<B> {
    backend: Arc<B>,
    country: CountryCode,
    delay: Duration,
    pending: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<B: CounterBackend> Clone for IncrementBatcher<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn lock_timer(timer: &Mutex<Option<JoinHandle<()>>>) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<B: CounterBackend> IncrementBatcher<B> {
    pub fn new(backend: Arc<B>, country: CountryCode, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                country,
                delay,
                pending: AtomicU64::new(0),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn country(&self) -> &CountryCode {
        &self.inner.country
    }

    pub fn pending(&self) -> u64 {
        self.inner.pending.load(Ordering::SeqCst)
    }

    pub fn record_tap(&self) {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_flush_scheduled(&self) -> bool {
        lock_timer(&self.inner.timer).is_some()
    }

    /// Arms the debounce timer unless it is already armed, so a burst of taps
    /// produces one flush per window.
    pub fn schedule_flush(&self) {
        let mut timer = lock_timer(&self.inner.timer);
        if timer.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            // Teardown may have claimed the timer while we slept.
            if lock_timer(&inner.timer).take().is_none() {
                return;
            }
            inner.flush().await;
        }));
    }

    /// Sends everything pending now, bypassing the timer. Returns the amount
    /// dispatched.
    pub async fn flush(&self) -> u64 {
        self.inner.flush().await
    }

    /// Cancels an armed timer. A flush the timer already dispatched keeps
    /// running.
    pub fn cancel_scheduled(&self) {
        if let Some(timer) = lock_timer(&self.inner.timer).take() {
            timer.abort();
        }
    }

    /// Final flush for session end.
    pub async fn shutdown(&self) -> u64 {
        self.cancel_scheduled();
        self.flush().await
    }
}

impl<B: CounterBackend> Inner<B> {
    async fn flush(&self) -> u64 {
        // Zero before the call: taps landing while it is in flight belong to
        // the next batch.
        let amount = self.pending.swap(0, Ordering::SeqCst);
        if amount == 0 {
            return 0;
        }

        debug!(country = %self.country, amount, "flushing taps");
        if let Err(err) = self.backend.increment_taps(&self.country, amount).await {
            warn!(country = %self.country, amount, "dropping tap batch: {err}");
        }
        amount
    }
}
