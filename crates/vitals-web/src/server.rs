use std::net::SocketAddr;

use axum::Router;
use chrono::Utc;

use vitals_config::AppConfig;
use vitals_registry::Registry;
use vitals_store::{SharedStore, Store};

use crate::routes::{health_routes, service_routes, worker_routes};
use crate::state::AppState;
use crate::{Result, WebError};

/// Assembles the full route surface over any store implementation; tests
/// run it against the in-memory store.
pub fn app<S: Store + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .merge(health_routes::<S>())
        .merge(service_routes(&state))
        .merge(worker_routes(&state))
        .with_state(state)
}

/// Opens the shared store, stamps the process start, and serves until the
/// listener fails. Store initialization failure is fatal here; nothing
/// falls back to private state.
pub async fn start_server(config: AppConfig) -> Result<()> {
    let store = SharedStore::open(&config.store_name, config.store_dir.as_deref())?;
    let registry = Registry::new(store);
    registry.ensure_server_start(Utc::now())?;

    if !config.auth_enabled() {
        tracing::warn!("no api key configured, mutating endpoints are unauthenticated");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| WebError::Startup(format!("invalid listen address: {e}")))?;

    let router = app(AppState::new(registry, config));

    tracing::info!("vitals registry listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
