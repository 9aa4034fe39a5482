pub mod app;
pub mod backend;
pub mod batcher;
pub mod config;
pub mod consent;
pub mod errors;
pub mod geo;
pub mod handlers;
pub mod leaderboard;
pub mod models;
pub mod session;
pub mod state;
pub mod storage;
pub mod sync;
pub mod ui;
pub mod view;

#[cfg(test)]
mod testing;

pub use app::router;
pub use backend::{CounterBackend, HttpBackend};
pub use config::{Config, SessionSettings};
pub use session::TapSession;
pub use state::AppState;
pub use storage::load_tap_data;
