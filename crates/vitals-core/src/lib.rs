//! Core types and aggregation logic for the vitals health registry.
//!
//! Everything in this crate is pure data plus pure functions: probes report
//! per-worker health, and [`aggregate`] reduces a worker list to one
//! service-level verdict under the service's configured policy. Persistence
//! and transport live in the `vitals-store`, `vitals-registry` and
//! `vitals-web` crates.

mod aggregate;
mod model;
mod response;

pub use aggregate::{aggregate, try_aggregate, Aggregate, AggregationUndefined};
pub use model::{
    Service, ServiceConfig, ServiceHealth, ServiceHealthWorkerPolicy, ServiceKnownType,
    ServiceMode, ServiceStatus, ServiceStatusHealth, ServiceWorkers, DEFAULT_INTERVAL_SECONDS,
    DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECONDS,
};
pub use response::{DaemonHealth, ServiceListResponse, ServiceResponse, ServiceWorkerResponse};
