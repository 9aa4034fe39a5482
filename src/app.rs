use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/rpc/increment_taps", post(handlers::increment_taps))
        .route("/api/total", get(handlers::get_total))
        .route("/api/leaderboard", get(handlers::get_leaderboard))
        .route("/api/changes", get(handlers::changes))
        .with_state(state)
}
