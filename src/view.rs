use crate::leaderboard::rank_entries;
use crate::models::{CountryTaps, Snapshot};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::watch;

/// What the player sees. Values come only from the backend, via push or
/// poll; taps that have not round-tripped are never added, so nothing is
/// counted twice.
#[derive(Clone)]
pub struct ViewState {
    inner: Arc<ViewInner>,
}

struct ViewInner {
    tx: watch::Sender<Snapshot>,
    closed: AtomicBool,
    limit: usize,
}

impl ViewState {
    pub fn new(limit: usize) -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self {
            inner: Arc::new(ViewInner {
                tx,
                closed: AtomicBool::new(false),
                limit,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.tx.subscribe()
    }

    pub fn current(&self) -> Snapshot {
        self.inner.tx.borrow().clone()
    }

    pub fn total(&self) -> u64 {
        self.inner.tx.borrow().total
    }

    /// Latest value wins, even if it is lower than what is shown.
    pub fn apply_total(&self, total: u64) {
        if self.is_closed() {
            return;
        }
        self.inner.tx.send_if_modified(|view| {
            if view.total == total {
                return false;
            }
            view.total = total;
            true
        });
    }

    pub fn apply_leaderboard(&self, rows: Vec<CountryTaps>) {
        if self.is_closed() {
            return;
        }
        let entries = rank_entries(rows, self.inner.limit);
        self.inner.tx.send_if_modified(|view| {
            if view.leaderboard == entries {
                return false;
            }
            view.leaderboard = entries;
            true
        });
    }

    pub fn apply_snapshot(&self, snapshot: Snapshot) {
        if self.is_closed() {
            return;
        }
        self.inner.tx.send_if_modified(|view| {
            if *view == snapshot {
                return false;
            }
            *view = snapshot;
            true
        });
    }

    /// Stops accepting updates; late network completions become no-ops.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CountryCode;

    fn rows(raw: &[(&str, u64)]) -> Vec<CountryTaps> {
        raw.iter()
            .map(|(code, taps)| CountryTaps {
                country_code: CountryCode::parse(code).unwrap(),
                taps: *taps,
            })
            .collect()
    }

    #[test]
    fn latest_total_wins() {
        let view = ViewState::new(20);
        view.apply_total(50);
        view.apply_total(42);
        assert_eq!(view.total(), 42);
    }

    #[test]
    fn leaderboard_is_sorted_on_apply() {
        let view = ViewState::new(20);
        view.apply_leaderboard(rows(&[("US", 10), ("FR", 25), ("unknown", 5)]));
        let order: Vec<String> = view
            .current()
            .leaderboard
            .iter()
            .map(|e| e.country_code.to_string())
            .collect();
        assert_eq!(order, ["FR", "US", "unknown"]);
    }

    #[tokio::test]
    async fn subscribers_see_changes_only() {
        let view = ViewState::new(20);
        let mut rx = view.subscribe();

        view.apply_total(0);
        assert!(!rx.has_changed().unwrap());

        view.apply_total(3);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().total, 3);
    }

    #[test]
    fn closed_view_ignores_updates() {
        let view = ViewState::new(20);
        view.apply_total(7);
        view.close();
        view.apply_total(9);
        view.apply_leaderboard(rows(&[("US", 1)]));
        assert_eq!(view.total(), 7);
        assert!(view.current().leaderboard.is_empty());
    }
}
