use crate::config::LEADERBOARD_SIZE;
use crate::errors::AppError;
use crate::leaderboard::{MAX_LIMIT, rank_entries};
use crate::models::{CountryCode, CountryTaps, IncrementRequest, LeaderboardQuery, TotalResponse};
use crate::state::{AppState, change_feed};
use crate::ui::render_scoreboard;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::{Stream, StreamExt};

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let total = state.total().await;
    let entries = rank_entries(state.top(LEADERBOARD_SIZE).await, LEADERBOARD_SIZE);
    Html(render_scoreboard(total, &entries))
}

pub async fn increment_taps(
    State(state): State<AppState>,
    Json(payload): Json<IncrementRequest>,
) -> Result<StatusCode, AppError> {
    let country = CountryCode::parse(&payload.country_code)
        .ok_or_else(|| AppError::bad_request("country_code must be two letters or 'unknown'"))?;
    state.increment(&country, payload.amount).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_total(State(state): State<AppState>) -> Json<TotalResponse> {
    Json(TotalResponse {
        total_taps: state.total().await,
    })
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<CountryTaps>> {
    let limit = query.limit.unwrap_or(LEADERBOARD_SIZE).min(MAX_LIMIT);
    Json(state.top(limit).await)
}

pub async fn changes(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = change_feed(state.subscribe()).map(|event| Event::default().json_data(event));
    Sse::new(events).keep_alive(KeepAlive::default())
}
