//! Keeps a [`ViewState`] in step with the backend: one initial load, push
//! notifications when they work, and fixed-interval polling when they don't.

use crate::backend::{ChangeStream, CounterBackend};
use crate::config::SessionSettings;
use crate::errors::ClientError;
use crate::leaderboard::rank_entries;
use crate::models::{ChangeEvent, Snapshot};
use crate::view::ViewState;
use futures::StreamExt;
use std::{future, sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    AwaitingFirstPush,
    PushConfirmed,
    PollingFallback,
}

impl SyncMode {
    pub fn on_push(self) -> Self {
        match self {
            Self::AwaitingFirstPush => Self::PushConfirmed,
            other => other,
        }
    }

    /// Only a session still waiting for its first push falls back. Both
    /// other states are final.
    pub fn on_grace_elapsed(self) -> Self {
        match self {
            Self::AwaitingFirstPush => Self::PollingFallback,
            other => other,
        }
    }
}

pub struct SyncClient<B: CounterBackend> {
    backend: Arc<B>,
    view: ViewState,
    settings: SessionSettings,
}

impl<B: CounterBackend> SyncClient<B> {
    pub fn new(backend: Arc<B>, view: ViewState, settings: SessionSettings) -> Self {
        Self {
            backend,
            view,
            settings,
        }
    }

    pub async fn load_initial(&self) -> Result<Snapshot, ClientError> {
        let limit = self.settings.leaderboard_limit;
        let (total, rows) = tokio::try_join!(self.backend.global_total(), self.backend.top_countries(limit))?;
        Ok(Snapshot {
            total,
            leaderboard: rank_entries(rows, limit),
        })
    }

    /// Spawns the sync loop. The returned handle owns every timer and the push
    /// channel.
    pub fn start(self) -> SyncHandle {
        let (mode_tx, mode_rx) = watch::channel(SyncMode::AwaitingFirstPush);
        let view = self.view.clone();
        let task = tokio::spawn(self.run(mode_tx));
        SyncHandle {
            task,
            mode: mode_rx,
            view,
        }
    }

    async fn run(self, mode_tx: watch::Sender<SyncMode>) {
        let grace = time::sleep(self.settings.grace_period);
        tokio::pin!(grace);

        let mut changes = match self.backend.subscribe_changes().await {
            Ok(stream) => Some(stream),
            Err(err) => {
                warn!("push subscription failed, waiting for polling fallback: {err}");
                None
            }
        };

        match self.load_initial().await {
            Ok(snapshot) => self.view.apply_snapshot(snapshot),
            Err(err) => warn!("initial load failed: {err}"),
        }

        let mut mode = SyncMode::AwaitingFirstPush;
        let mut poll: Option<Interval> = None;

        loop {
            tokio::select! {
                event = next_change(&mut changes) => match event {
                    Some(event) => {
                        mode = self.transition(&mode_tx, mode, mode.on_push());
                        self.apply(event).await;
                    }
                    None => {
                        warn!("push channel closed");
                        changes = None;
                    }
                },
                () = &mut grace, if mode == SyncMode::AwaitingFirstPush => {
                    mode = self.transition(&mode_tx, mode, mode.on_grace_elapsed());
                    let period = self.settings.poll_interval.max(MIN_POLL_INTERVAL);
                    let mut interval = time::interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    poll = Some(interval);
                },
                () = next_tick(&mut poll) => self.poll().await,
            }
        }
    }

    fn transition(&self, mode_tx: &watch::Sender<SyncMode>, from: SyncMode, to: SyncMode) -> SyncMode {
        if from != to {
            match to {
                SyncMode::PollingFallback => {
                    info!(interval = ?self.settings.poll_interval, "no push within grace period, polling")
                }
                _ => debug!("push confirmed"),
            }
            mode_tx.send_replace(to);
        }
        to
    }

    async fn apply(&self, event: ChangeEvent) {
        match event {
            ChangeEvent::GlobalState {
                total_taps: Some(total),
            } => self.view.apply_total(total),
            ChangeEvent::GlobalState { total_taps: None } => self.refresh_total().await,
            // Re-read rather than patch so ordering stays right.
            ChangeEvent::CountryTaps { .. } => self.refresh_leaderboard().await,
            ChangeEvent::Resync => self.poll().await,
        }
    }

    async fn poll(&self) {
        tokio::join!(self.refresh_total(), self.refresh_leaderboard());
    }

    async fn refresh_total(&self) {
        match self.backend.global_total().await {
            Ok(total) => self.view.apply_total(total),
            Err(err) => warn!("total refresh failed, keeping last value: {err}"),
        }
    }

    async fn refresh_leaderboard(&self) {
        match self.backend.top_countries(self.settings.leaderboard_limit).await {
            Ok(rows) => self.view.apply_leaderboard(rows),
            Err(err) => warn!("leaderboard refresh failed, keeping last value: {err}"),
        }
    }
}

async fn next_change(changes: &mut Option<ChangeStream>) -> Option<ChangeEvent> {
    match changes {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

/// Running sync loop. Dropping it has the same effect as `shutdown`.
pub struct SyncHandle {
    task: JoinHandle<()>,
    mode: watch::Receiver<SyncMode>,
    view: ViewState,
}

impl SyncHandle {
    pub fn mode(&self) -> SyncMode {
        *self.mode.borrow()
    }

    /// Cancels the push channel, grace timer and polling interval, and closes
    /// the view against late updates.
    pub fn shutdown(&self) {
        self.task.abort();
        self.view.close();
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
