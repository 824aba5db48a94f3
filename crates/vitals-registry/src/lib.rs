//! CRUD of [`Service`] records against the shared store, under its lock
//! discipline.
//!
//! Every compound mutation — worker upsert, config replacement, and the
//! paired response-cache refresh — happens inside one lock acquisition, so a
//! reader never observes the `services` table updated without its matching
//! `responses` entry. Cached reads go through [`Registry::cached_response`]
//! and friends without the lock; staleness of at most one in-flight mutation
//! is accepted there.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use vitals_core::{
    Service, ServiceConfig, ServiceMode, ServiceResponse, ServiceStatus, ServiceStatusHealth,
};
use vitals_store::{Store, StoreError};

const SERVICES_KEY: &str = "services";
const RESPONSES_KEY: &str = "responses";
const SERVER_START_KEY: &str = "server_start";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Worker reports must carry a non-empty worker name; anonymous entries
    /// would accumulate without bound (they can never be upserted).
    #[error("worker reports must carry a non-empty worker name")]
    UnnamedWorker,
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// The service registry over an injected store implementation.
pub struct Registry<S: Store> {
    store: S,
}

impl<S: Store> Registry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads one service. Persisted data that fails to decode is treated as
    /// absent, never surfaced as an error.
    pub fn get_service(&self, name: &str) -> RegistryResult<Option<Service>> {
        let _guard = self.store.acquire()?;
        let services = self.object_at(SERVICES_KEY)?;
        Ok(services
            .get(name)
            .cloned()
            .and_then(|raw| decode_service(name, raw)))
    }

    /// All decodable services, in table order. Corrupt entries are skipped.
    pub fn list_services(&self) -> RegistryResult<Vec<Service>> {
        let _guard = self.store.acquire()?;
        let services = self.object_at(SERVICES_KEY)?;
        Ok(services
            .into_iter()
            .filter_map(|(name, raw)| decode_service(&name, raw))
            .collect())
    }

    /// Applies one worker report: loads or implicitly creates the service,
    /// upserts the worker's status with `checked_at` restamped to now,
    /// maintains `first_running_at`, and refreshes the response cache. One
    /// lock acquisition covers the whole read-modify-write.
    pub fn upsert_worker(
        &self,
        service_name: &str,
        worker_name: &str,
        health: ServiceStatusHealth,
    ) -> RegistryResult<Service> {
        if worker_name.trim().is_empty() {
            return Err(RegistryError::UnnamedWorker);
        }
        let now = Utc::now();

        let _guard = self.store.acquire()?;
        let mut services = self.object_at(SERVICES_KEY)?;
        let mut service = services
            .get(service_name)
            .cloned()
            .and_then(|raw| decode_service(service_name, raw))
            .unwrap_or_else(|| Service::new(service_name));

        let mut status = service
            .workers
            .find(worker_name)
            .cloned()
            .unwrap_or_else(|| ServiceStatus::named(worker_name));
        let entered_running = health.mode == ServiceMode::Running;
        status.health = health;
        status.checked_at = now;
        service.workers.upsert(status);

        if entered_running && service.first_running_at.is_none() {
            service.first_running_at = Some(now);
        }
        if !service.workers.any_running() {
            service.first_running_at = None;
        }

        self.persist(services, service, now)
    }

    /// Replaces the service's config, implicitly creating the service when
    /// unknown. Workers and `first_running_at` are left untouched.
    pub fn update_config(
        &self,
        service_name: &str,
        config: ServiceConfig,
    ) -> RegistryResult<Service> {
        let now = Utc::now();

        let _guard = self.store.acquire()?;
        let mut services = self.object_at(SERVICES_KEY)?;
        let mut service = services
            .get(service_name)
            .cloned()
            .and_then(|raw| decode_service(service_name, raw))
            .unwrap_or_else(|| Service::new(service_name));
        service.config = config;

        self.persist(services, service, now)
    }

    /// Pre-aggregated document for one service, read without the lock.
    /// Corrupt cache entries read as a miss; the caller recomputes from the
    /// raw service and must not write the cache back (the read path is
    /// side-effect-free).
    pub fn cached_response(&self, name: &str) -> RegistryResult<Option<ServiceResponse>> {
        let responses = self.object_at(RESPONSES_KEY)?;
        Ok(responses
            .get(name)
            .cloned()
            .and_then(|raw| serde_json::from_value(raw).ok()))
    }

    /// All decodable cached response documents, read without the lock.
    pub fn cached_responses(&self) -> RegistryResult<Vec<ServiceResponse>> {
        let responses = self.object_at(RESPONSES_KEY)?;
        Ok(responses
            .into_iter()
            .filter_map(|(_, raw)| serde_json::from_value(raw).ok())
            .collect())
    }

    /// Records the process-start timestamp once per store lifetime; later
    /// calls (and restarts of sibling processes) keep the original stamp.
    pub fn ensure_server_start(&self, now: DateTime<Utc>) -> RegistryResult<()> {
        let _guard = self.store.acquire()?;
        let already = self
            .store
            .get(SERVER_START_KEY)?
            .and_then(|v| v.as_f64())
            .is_some();
        if !already {
            self.store
                .set(SERVER_START_KEY, Value::from(epoch_seconds(now)))?;
        }
        Ok(())
    }

    /// Seconds since the recorded server start, read without the lock.
    /// Absent or unreadable stamps read as `None`.
    pub fn server_uptime_seconds(&self, now: DateTime<Utc>) -> RegistryResult<Option<f64>> {
        let started = self.store.get(SERVER_START_KEY)?.and_then(|v| v.as_f64());
        Ok(started.map(|s| (epoch_seconds(now) - s).max(0.0)))
    }

    /// Writes the mutated service and its refreshed response document.
    /// Callers hold the store lock.
    fn persist(
        &self,
        mut services: Map<String, Value>,
        service: Service,
        now: DateTime<Utc>,
    ) -> RegistryResult<Service> {
        services.insert(
            service.name.clone(),
            serde_json::to_value(&service).map_err(StoreError::from)?,
        );
        self.store.set(SERVICES_KEY, Value::Object(services))?;

        let response = ServiceResponse::from_service(&service, now);
        let mut responses = self.object_at(RESPONSES_KEY)?;
        responses.insert(
            service.name.clone(),
            serde_json::to_value(&response).map_err(StoreError::from)?,
        );
        self.store.set(RESPONSES_KEY, Value::Object(responses))?;

        Ok(service)
    }

    /// The JSON object stored under `key`; anything else (absent, corrupt)
    /// reads as empty.
    fn object_at(&self, key: &str) -> RegistryResult<Map<String, Value>> {
        match self.store.get(key)? {
            Some(Value::Object(map)) => Ok(map),
            Some(_) => {
                tracing::warn!(key, "store entry is not an object, treating as empty");
                Ok(Map::new())
            }
            None => Ok(Map::new()),
        }
    }
}

fn decode_service(name: &str, raw: Value) -> Option<Service> {
    match serde_json::from_value(raw) {
        Ok(service) => Some(service),
        Err(err) => {
            tracing::warn!(service = name, %err, "dropping corrupt service record");
            None
        }
    }
}

fn epoch_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vitals_core::{ServiceHealth, ServiceHealthWorkerPolicy, ServiceMode};
    use vitals_store::MemoryStore;

    fn registry() -> Registry<MemoryStore> {
        Registry::new(MemoryStore::new())
    }

    fn report(status: ServiceHealth, mode: ServiceMode) -> ServiceStatusHealth {
        ServiceStatusHealth {
            mode,
            status,
            details: String::new(),
            stacktrace: None,
        }
    }

    #[test]
    fn first_report_creates_the_service() {
        let registry = registry();
        let service = registry
            .upsert_worker("db", "w1", report(ServiceHealth::Ok, ServiceMode::Running))
            .unwrap();

        assert_eq!(service.name, "db");
        assert_eq!(service.workers.len(), 1);
        assert!(registry.get_service("db").unwrap().is_some());
        assert!(registry.get_service("other").unwrap().is_none());
    }

    #[test]
    fn repeated_identical_report_keeps_one_worker() {
        let registry = registry();
        let health = report(ServiceHealth::Ok, ServiceMode::Running);
        let first = registry.upsert_worker("db", "w1", health.clone()).unwrap();
        let second = registry.upsert_worker("db", "w1", health).unwrap();

        assert_eq!(first.workers.len(), 1);
        assert_eq!(second.workers.len(), 1);
        // Identical content modulo the restamped checked_at.
        let a = first.workers.find("w1").unwrap();
        let b = second.workers.find("w1").unwrap();
        assert_eq!(a.health, b.health);
        assert_eq!(a.retries, b.retries);
        assert_eq!(first.first_running_at, second.first_running_at);
    }

    #[test]
    fn empty_worker_name_is_rejected() {
        let registry = registry();
        let err = registry
            .upsert_worker("db", "  ", report(ServiceHealth::Ok, ServiceMode::Running))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnnamedWorker));
        assert!(registry.get_service("db").unwrap().is_none());
    }

    #[test]
    fn first_running_at_sets_once_and_clears_when_nothing_runs() {
        let registry = registry();

        let svc = registry
            .upsert_worker("db", "w1", report(ServiceHealth::Ok, ServiceMode::Starting))
            .unwrap();
        assert!(svc.first_running_at.is_none());

        let svc = registry
            .upsert_worker("db", "w1", report(ServiceHealth::Ok, ServiceMode::Running))
            .unwrap();
        let started = svc.first_running_at.expect("set on first running worker");

        // Unrelated worker updates keep the original stamp.
        let svc = registry
            .upsert_worker("db", "w2", report(ServiceHealth::Ok, ServiceMode::Running))
            .unwrap();
        assert_eq!(svc.first_running_at, Some(started));

        // Still one worker running: stamp stays.
        let svc = registry
            .upsert_worker("db", "w2", report(ServiceHealth::Error, ServiceMode::Failed))
            .unwrap();
        assert_eq!(svc.first_running_at, Some(started));

        // Last running worker leaves: stamp clears.
        let svc = registry
            .upsert_worker("db", "w1", report(ServiceHealth::Ok, ServiceMode::Stopped))
            .unwrap();
        assert!(svc.first_running_at.is_none());

        // And a fresh running transition stamps anew.
        let svc = registry
            .upsert_worker("db", "w1", report(ServiceHealth::Ok, ServiceMode::Running))
            .unwrap();
        assert!(svc.first_running_at.is_some());
    }

    #[test]
    fn update_config_preserves_workers_and_uptime_stamp() {
        let registry = registry();
        registry
            .upsert_worker("db", "w1", report(ServiceHealth::Ok, ServiceMode::Running))
            .unwrap();
        let before = registry.get_service("db").unwrap().unwrap();

        let config = ServiceConfig {
            policy: ServiceHealthWorkerPolicy::Majority,
            ..ServiceConfig::default()
        };
        let after = registry.update_config("db", config).unwrap();

        assert_eq!(after.config.policy, ServiceHealthWorkerPolicy::Majority);
        assert_eq!(after.workers, before.workers);
        assert_eq!(after.first_running_at, before.first_running_at);
    }

    #[test]
    fn config_update_creates_unknown_service() {
        let registry = registry();
        let service = registry
            .update_config("queue", ServiceConfig::default())
            .unwrap();
        assert_eq!(service.name, "queue");
        assert!(service.workers.is_empty());
    }

    #[test]
    fn mutation_refreshes_the_response_cache() {
        let registry = registry();
        assert!(registry.cached_response("db").unwrap().is_none());

        registry
            .upsert_worker("db", "w1", report(ServiceHealth::Ok, ServiceMode::Running))
            .unwrap();
        let cached = registry.cached_response("db").unwrap().unwrap();
        assert_eq!(cached.aggregate_status, ServiceHealth::Ok);
        assert_eq!(cached.aggregate_mode, ServiceMode::Running);

        registry
            .upsert_worker("db", "w1", report(ServiceHealth::Error, ServiceMode::Failed))
            .unwrap();
        let cached = registry.cached_response("db").unwrap().unwrap();
        assert_eq!(cached.aggregate_status, ServiceHealth::Error);
        assert_eq!(registry.cached_responses().unwrap().len(), 1);
    }

    #[test]
    fn corrupt_service_record_is_recreated_fresh() {
        let registry = registry();
        registry
            .upsert_worker("db", "w1", report(ServiceHealth::Ok, ServiceMode::Running))
            .unwrap();

        // Sabotage the persisted record.
        registry
            .store
            .set(SERVICES_KEY, json!({"db": {"name": 42}}))
            .unwrap();

        assert!(registry.get_service("db").unwrap().is_none());
        let service = registry
            .upsert_worker("db", "w2", report(ServiceHealth::Ok, ServiceMode::Running))
            .unwrap();
        assert_eq!(service.workers.len(), 1);
        assert!(service.workers.find("w2").is_some());
    }

    #[test]
    fn list_skips_corrupt_records() {
        let registry = registry();
        registry
            .upsert_worker("db", "w1", report(ServiceHealth::Ok, ServiceMode::Running))
            .unwrap();
        let mut services = match registry.store.get(SERVICES_KEY).unwrap().unwrap() {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        services.insert("broken".into(), json!("not a service"));
        registry
            .store
            .set(SERVICES_KEY, Value::Object(services))
            .unwrap();

        let listed = registry.list_services().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "db");
    }

    #[test]
    fn server_start_is_stamped_once() {
        let registry = registry();
        let t0 = Utc::now();
        registry.ensure_server_start(t0).unwrap();
        let later = t0 + chrono::Duration::seconds(90);
        registry.ensure_server_start(later).unwrap();

        let uptime = registry.server_uptime_seconds(later).unwrap().unwrap();
        assert!((uptime - 90.0).abs() < 0.01, "uptime was {uptime}");
    }

    #[test]
    fn server_uptime_is_none_before_startup() {
        let registry = registry();
        assert_eq!(registry.server_uptime_seconds(Utc::now()).unwrap(), None);
    }
}
