//! Per-worker status reads and probe report intake.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};

use vitals_core::{ServiceStatusHealth, ServiceWorkerResponse};
use vitals_store::Store;

use crate::auth::require_bearer;
use crate::state::{with_registry, AppState};
use crate::{Result, WebError};

pub fn worker_routes<S: Store + 'static>(state: &AppState<S>) -> Router<AppState<S>> {
    Router::new()
        .route(
            "/health/service/{name}/worker/{worker}",
            get(get_worker::<S>),
        )
        .route(
            "/health/service/{name}/worker/{worker}",
            post(report_worker::<S>).layer(middleware::from_fn_with_state(
                state.clone(),
                require_bearer::<S>,
            )),
        )
}

async fn get_worker<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path((name, worker)): Path<(String, String)>,
) -> Result<Json<ServiceWorkerResponse>> {
    let lookup = name.clone();
    let service = with_registry(&state, move |registry| registry.get_service(&lookup))
        .await?
        .ok_or(WebError::ServiceNotFound)?;
    let status = service
        .workers
        .find(&worker)
        .cloned()
        .ok_or(WebError::WorkerNotFound)?;
    Ok(Json(ServiceWorkerResponse { worker, status }))
}

async fn report_worker<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path((name, worker)): Path<(String, String)>,
    Json(health): Json<ServiceStatusHealth>,
) -> Result<Json<ServiceWorkerResponse>> {
    let (service_name, worker_name) = (name, worker.clone());
    let service = with_registry(&state, move |registry| {
        registry.upsert_worker(&service_name, &worker_name, health)
    })
    .await?;

    let status = service
        .workers
        .find(&worker)
        .cloned()
        .ok_or(WebError::WorkerNotFound)?;
    Ok(Json(ServiceWorkerResponse { worker, status }))
}
