//! Liveness of the serving process itself.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use vitals_core::DaemonHealth;
use vitals_store::Store;

use crate::state::AppState;

pub fn health_routes<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new().route("/health", get(daemon_health::<S>))
}

async fn daemon_health<S: Store + 'static>(State(state): State<AppState<S>>) -> Json<DaemonHealth> {
    // Lock-free store read; an unreadable stamp just reports no uptime.
    let uptime_seconds = state
        .registry
        .server_uptime_seconds(Utc::now())
        .unwrap_or(None);
    Json(DaemonHealth {
        ok: true,
        uptime_seconds,
    })
}
