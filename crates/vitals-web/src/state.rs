use std::sync::Arc;

use vitals_config::AppConfig;
use vitals_registry::{Registry, RegistryError};
use vitals_store::Store;

use crate::WebError;

/// Shared handler state: the registry over its injected store, plus the
/// effective configuration.
pub struct AppState<S: Store> {
    pub registry: Arc<Registry<S>>,
    pub config: Arc<AppConfig>,
}

impl<S: Store> AppState<S> {
    pub fn new(registry: Registry<S>, config: AppConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            config: self.config.clone(),
        }
    }
}

/// Runs a lock-taking registry operation off the async executor. Lock-free
/// cache reads don't need this; anything that acquires the store lock does,
/// so a contended lock stalls a blocking thread instead of the runtime.
pub(crate) async fn with_registry<S, T, F>(state: &AppState<S>, op: F) -> Result<T, WebError>
where
    S: Store + 'static,
    T: Send + 'static,
    F: FnOnce(&Registry<S>) -> Result<T, RegistryError> + Send + 'static,
{
    let registry = state.registry.clone();
    tokio::task::spawn_blocking(move || op(&registry))
        .await
        .map_err(|err| WebError::Internal(format!("registry task failed: {err}")))?
        .map_err(WebError::from)
}
