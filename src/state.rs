use crate::backend::{ChangeStream, CounterBackend};
use crate::errors::{AppError, ClientError};
use crate::leaderboard::top_countries;
use crate::models::{ChangeEvent, CountryCode, CountryTaps, TapData};
use crate::storage::persist_tap_data;
use futures::stream::{self, Stream, StreamExt};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::{Mutex, broadcast, broadcast::error::RecvError};
use tracing::debug;

const CHANGE_BUFFER: usize = 256;

/// Authoritative counter state behind the HTTP server. It also serves as an
/// in-process [`CounterBackend`].
#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub data: Arc<Mutex<TapData>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl AppState {
    pub fn new(data_path: PathBuf, data: TapData) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            data_path,
            data: Arc::new(Mutex::new(data)),
            changes,
        }
    }

    /// Adds `amount` to the total and to the country's row, creating the row
    /// if needed. Returns the new total.
    pub async fn increment(&self, country: &CountryCode, amount: u64) -> Result<u64, AppError> {
        if amount == 0 {
            return Err(AppError::bad_request("amount must be positive"));
        }

        // Memory only changes once the new aggregates are on disk.
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        next.total_taps = next.total_taps.saturating_add(amount);
        let row = next.countries.entry(country.as_str().to_string()).or_default();
        *row = row.saturating_add(amount);
        let total = next.total_taps;

        persist_tap_data(&self.data_path, &next).await?;
        *data = next;
        drop(data);

        // No subscribers is fine.
        let _ = self.changes.send(ChangeEvent::GlobalState {
            total_taps: Some(total),
        });
        let _ = self.changes.send(ChangeEvent::CountryTaps {
            country_code: country.clone(),
        });
        debug!(country = %country, amount, total, "taps recorded");

        Ok(total)
    }

    pub async fn total(&self) -> u64 {
        self.data.lock().await.total_taps
    }

    pub async fn top(&self, limit: usize) -> Vec<CountryTaps> {
        top_countries(&*self.data.lock().await, limit)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

/// Turns a broadcast receiver into a change stream. A subscriber that falls
/// behind gets a single `Resync` instead of the events it missed.
pub fn change_feed(rx: broadcast::Receiver<ChangeEvent>) -> impl Stream<Item = ChangeEvent> + Send + 'static {
    stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(event) => Some((event, rx)),
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "change subscriber lagged");
                Some((ChangeEvent::Resync, rx))
            }
            Err(RecvError::Closed) => None,
        }
    })
}

impl CounterBackend for AppState {
    async fn increment_taps(&self, country: &CountryCode, amount: u64) -> Result<(), ClientError> {
        self.increment(country, amount).await?;
        Ok(())
    }

    async fn global_total(&self) -> Result<u64, ClientError> {
        Ok(self.total().await)
    }

    async fn top_countries(&self, limit: usize) -> Result<Vec<CountryTaps>, ClientError> {
        Ok(self.top(limit).await)
    }

    async fn subscribe_changes(&self) -> Result<ChangeStream, ClientError> {
        Ok(change_feed(self.subscribe()).boxed())
    }
}

#[cfg(test)]
pub(crate) fn scratch_state(tag: &str) -> AppState {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = std::env::temp_dir().join(format!(
        "tap_counter_state_{tag}_{}_{nanos}.json",
        std::process::id()
    ));
    AppState::new(path, TapData::default())
}
