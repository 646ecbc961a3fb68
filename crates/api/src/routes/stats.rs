//! Relay statistics endpoint (read-only)

use axum::{extract::State, Json};

use crate::state::AppState;
use crate::websocket::RelayStats;

/// Connected users, active rooms and per-room member counts
pub async fn stats(State(state): State<AppState>) -> Json<RelayStats> {
    Json(state.relay.get_stats().await)
}
