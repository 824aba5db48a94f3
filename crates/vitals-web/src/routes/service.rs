//! Service-level verdicts and configuration.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use chrono::Utc;

use vitals_core::{ServiceConfig, ServiceListResponse, ServiceResponse};
use vitals_store::Store;

use crate::auth::require_bearer;
use crate::state::{with_registry, AppState};
use crate::{Result, WebError};

pub fn service_routes<S: Store + 'static>(state: &AppState<S>) -> Router<AppState<S>> {
    Router::new()
        .route("/health/service", get(list_services::<S>))
        .route("/health/service/{name}", get(get_service::<S>))
        .route(
            "/health/service/{name}/config",
            post(update_config::<S>).layer(middleware::from_fn_with_state(
                state.clone(),
                require_bearer::<S>,
            )),
        )
}

async fn list_services<S: Store + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<ServiceListResponse>> {
    let now = Utc::now();
    let uptime = state.registry.server_uptime_seconds(now).unwrap_or(None);

    // Cache first; fall back to aggregating the raw table.
    let mut services = state.registry.cached_responses().unwrap_or_default();
    if services.is_empty() {
        let raw = with_registry(&state, |registry| registry.list_services()).await?;
        services = raw
            .iter()
            .map(|service| ServiceResponse::from_service(service, now))
            .collect();
    }
    for response in &mut services {
        response.server_uptime_seconds = uptime;
    }
    Ok(Json(ServiceListResponse { services }))
}

async fn get_service<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
) -> Result<Json<ServiceResponse>> {
    let now = Utc::now();
    let uptime = state.registry.server_uptime_seconds(now).unwrap_or(None);

    if let Some(mut response) = state.registry.cached_response(&name).unwrap_or(None) {
        response.server_uptime_seconds = uptime;
        return Ok(Json(response));
    }

    let lookup = name.clone();
    let service = with_registry(&state, move |registry| registry.get_service(&lookup))
        .await?
        .ok_or(WebError::ServiceNotFound)?;
    let mut response = ServiceResponse::from_service(&service, now);
    response.server_uptime_seconds = uptime;
    Ok(Json(response))
}

async fn update_config<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(name): Path<String>,
    Json(config): Json<ServiceConfig>,
) -> Result<Json<ServiceResponse>> {
    let now = Utc::now();
    let service = with_registry(&state, move |registry| {
        registry.update_config(&name, config)
    })
    .await?;

    let mut response = ServiceResponse::from_service(&service, now);
    response.server_uptime_seconds = state.registry.server_uptime_seconds(now).unwrap_or(None);
    Ok(Json(response))
}
