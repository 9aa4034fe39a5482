use crate::backend::CounterBackend;
use crate::batcher::{IncrementBatcher, PressTracker};
use crate::config::SessionSettings;
use crate::models::CountryCode;
use crate::sync::{SyncClient, SyncHandle, SyncMode};
use crate::view::ViewState;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything one player session owns: the press tracker, the batcher, the
/// sync loop and the view it feeds.
///
/// End a session with [`TapSession::teardown`]; it is the only path that sends
/// the last batch. Dropping the session instead stops syncing and discards
/// whatever is still pending.
pub struct TapSession<B: CounterBackend> {
    batcher: IncrementBatcher<B>,
    press: PressTracker,
    view: ViewState,
    sync: SyncHandle,
}

impl<B: CounterBackend> TapSession<B> {
    pub fn start(backend: Arc<B>, settings: &SessionSettings, country: CountryCode) -> Self {
        info!(country = %country, "starting tap session");
        let view = ViewState::new(settings.leaderboard_limit);
        let sync = SyncClient::new(Arc::clone(&backend), view.clone(), settings.clone()).start();
        let batcher = IncrementBatcher::new(backend, country, settings.flush_delay);

        Self {
            batcher,
            press: PressTracker::default(),
            view,
            sync,
        }
    }

    /// Records a tap unless a press is already active.
    pub fn press_start(&self) -> bool {
        if !self.press.begin() {
            return false;
        }
        self.batcher.record_tap();
        self.batcher.schedule_flush();
        true
    }

    /// Release, cancel or leave.
    pub fn press_end(&self) {
        self.press.end();
    }

    /// Backgrounding flushes right away instead of waiting for the timer.
    pub async fn visibility_changed(&self, hidden: bool) {
        if hidden {
            let sent = self.batcher.flush().await;
            debug!(sent, "flushed on hide");
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn country(&self) -> &CountryCode {
        self.batcher.country()
    }

    pub fn pending(&self) -> u64 {
        self.batcher.pending()
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync.mode()
    }

    /// Stops syncing, then sends whatever is still pending. Returns the amount
    /// of that final batch.
    pub async fn teardown(self) -> u64 {
        self.sync.shutdown();
        let sent = self.batcher.shutdown().await;
        info!(sent, "tap session ended");
        sent
    }
}

impl<B: CounterBackend> Drop for TapSession<B> {
    fn drop(&mut self) {
        self.batcher.cancel_scheduled();
    }
}
