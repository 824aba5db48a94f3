//! Persisted entities: services, workers and their health reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_INTERVAL_SECONDS: u64 = 10;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Kind of probe a service expects. Purely informational; aggregation never
/// looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKnownType {
    #[default]
    Unknown,
    Icmp,
    Dns,
    Http,
    Redis,
    Postgres,
    Rabbitmq,
    CeleryWorker,
    CeleryBeat,
    CeleryFlower,
}

impl ServiceKnownType {
    pub const ALL: [ServiceKnownType; 10] = [
        ServiceKnownType::Unknown,
        ServiceKnownType::Icmp,
        ServiceKnownType::Dns,
        ServiceKnownType::Http,
        ServiceKnownType::Redis,
        ServiceKnownType::Postgres,
        ServiceKnownType::Rabbitmq,
        ServiceKnownType::CeleryWorker,
        ServiceKnownType::CeleryBeat,
        ServiceKnownType::CeleryFlower,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKnownType::Unknown => "unknown",
            ServiceKnownType::Icmp => "icmp",
            ServiceKnownType::Dns => "dns",
            ServiceKnownType::Http => "http",
            ServiceKnownType::Redis => "redis",
            ServiceKnownType::Postgres => "postgres",
            ServiceKnownType::Rabbitmq => "rabbitmq",
            ServiceKnownType::CeleryWorker => "celery-worker",
            ServiceKnownType::CeleryBeat => "celery-beat",
            ServiceKnownType::CeleryFlower => "celery-flower",
        }
    }
}

impl std::fmt::Display for ServiceKnownType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a worker, or of a whole service once aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    #[default]
    Unknown,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl ServiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMode::Unknown => "unknown",
            ServiceMode::Starting => "starting",
            ServiceMode::Running => "running",
            ServiceMode::Stopping => "stopping",
            ServiceMode::Stopped => "stopped",
            ServiceMode::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health verdict, distinct from the lifecycle mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    #[default]
    Unknown,
    Ok,
    Error,
}

impl ServiceHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceHealth::Unknown => "unknown",
            ServiceHealth::Ok => "ok",
            ServiceHealth::Error => "error",
        }
    }
}

impl std::fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy for reducing the health of N workers to one service verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealthWorkerPolicy {
    /// OK as soon as one worker is OK.
    Any,
    /// OK only when every worker is OK.
    #[default]
    All,
    /// OK when a strict majority of workers is OK.
    Majority,
}

impl ServiceHealthWorkerPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceHealthWorkerPolicy::Any => "any",
            ServiceHealthWorkerPolicy::All => "all",
            ServiceHealthWorkerPolicy::Majority => "majority",
        }
    }
}

impl std::fmt::Display for ServiceHealthWorkerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One health report as submitted by a probe.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceStatusHealth {
    #[serde(default)]
    pub mode: ServiceMode,
    #[serde(default)]
    pub status: ServiceHealth,
    #[serde(default)]
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

/// The latest report of a single worker, plus reporter-supplied retry
/// metadata. The registry never drives retries itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<String>,
    #[serde(default)]
    pub health: ServiceStatusHealth,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "Utc::now")]
    pub checked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<DateTime<Utc>>,
}

impl ServiceStatus {
    pub fn named(worker_name: impl Into<String>) -> Self {
        Self {
            worker_name: Some(worker_name.into()),
            ..Self::default()
        }
    }
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self {
            worker_name: None,
            health: ServiceStatusHealth::default(),
            retries: 0,
            checked_at: Utc::now(),
            last_retry_at: None,
        }
    }
}

/// Ordered worker list, unique by worker name.
///
/// A status without a worker name never matches an existing entry and is
/// appended verbatim; such entries are legal but carry no identity, so the
/// registry refuses to create them through its public API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceWorkers(Vec<ServiceStatus>);

impl ServiceWorkers {
    pub fn new(workers: Vec<ServiceStatus>) -> Self {
        Self(workers)
    }

    pub fn find(&self, worker_name: &str) -> Option<&ServiceStatus> {
        self.0
            .iter()
            .find(|s| s.worker_name.as_deref() == Some(worker_name))
    }

    /// Replaces the entry with the same worker name, or appends. Unnamed
    /// statuses are always appended.
    pub fn upsert(&mut self, status: ServiceStatus) {
        let name = match status.worker_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => {
                self.0.push(status);
                return;
            }
        };
        match self
            .0
            .iter()
            .position(|s| s.worker_name.as_deref() == Some(name.as_str()))
        {
            Some(idx) => self.0[idx] = status,
            None => self.0.push(status),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceStatus> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ServiceStatus] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn any_running(&self) -> bool {
        self.0
            .iter()
            .any(|s| s.health.mode == ServiceMode::Running)
    }
}

/// Per-service policy. `interval`, `timeout` and `max_retries` are advisory
/// metadata for external probers; the registry stores but never enforces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(rename = "type", default)]
    pub kind: ServiceKnownType,
    #[serde(default)]
    pub policy: ServiceHealthWorkerPolicy,
    #[serde(default = "default_interval")]
    pub interval: Option<u64>,
    #[serde(default = "default_timeout")]
    pub timeout: Option<u64>,
    #[serde(default = "default_max_retries")]
    pub max_retries: Option<u32>,
}

fn default_interval() -> Option<u64> {
    Some(DEFAULT_INTERVAL_SECONDS)
}

fn default_timeout() -> Option<u64> {
    Some(DEFAULT_TIMEOUT_SECONDS)
}

fn default_max_retries() -> Option<u32> {
    Some(DEFAULT_MAX_RETRIES)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            kind: ServiceKnownType::Unknown,
            policy: ServiceHealthWorkerPolicy::All,
            interval: default_interval(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// The persisted entity: one tracked service keyed by name.
///
/// `first_running_at` is set exactly once, when any worker first enters
/// `running` while it was unset, and cleared whenever an update leaves no
/// worker in `running` mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub config: ServiceConfig,
    #[serde(default)]
    pub workers: ServiceWorkers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_running_at: Option<DateTime<Utc>>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ServiceConfig::default(),
            workers: ServiceWorkers::default(),
            first_running_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(worker: Option<&str>) -> ServiceStatus {
        ServiceStatus {
            worker_name: worker.map(str::to_owned),
            ..ServiceStatus::default()
        }
    }

    #[test]
    fn upsert_replaces_entry_with_same_name() {
        let mut workers = ServiceWorkers::default();
        workers.upsert(report(Some("w1")));
        let mut updated = report(Some("w1"));
        updated.health.status = ServiceHealth::Error;
        workers.upsert(updated);

        assert_eq!(workers.len(), 1);
        assert_eq!(
            workers.find("w1").unwrap().health.status,
            ServiceHealth::Error
        );
    }

    #[test]
    fn upsert_appends_new_names_in_order() {
        let mut workers = ServiceWorkers::default();
        workers.upsert(report(Some("w1")));
        workers.upsert(report(Some("w2")));

        let names: Vec<_> = workers
            .iter()
            .map(|s| s.worker_name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["w1", "w2"]);
    }

    #[test]
    fn unnamed_statuses_always_append() {
        let mut workers = ServiceWorkers::default();
        workers.upsert(report(None));
        workers.upsert(report(None));
        workers.upsert(report(Some("")));

        assert_eq!(workers.len(), 3);
        assert!(workers.find("").is_none());
    }

    #[test]
    fn known_type_serializes_kebab_case() {
        let json = serde_json::to_string(&ServiceKnownType::CeleryWorker).unwrap();
        assert_eq!(json, "\"celery-worker\"");
        let back: ServiceKnownType = serde_json::from_str("\"celery-beat\"").unwrap();
        assert_eq!(back, ServiceKnownType::CeleryBeat);
    }

    #[test]
    fn config_defaults_from_empty_document() {
        let config: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.kind, ServiceKnownType::Unknown);
        assert_eq!(config.policy, ServiceHealthWorkerPolicy::All);
        assert_eq!(config.interval, Some(DEFAULT_INTERVAL_SECONDS));
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT_SECONDS));
        assert_eq!(config.max_retries, Some(DEFAULT_MAX_RETRIES));
    }

    #[test]
    fn config_type_field_name_on_the_wire() {
        let json = serde_json::to_value(ServiceConfig::default()).unwrap();
        assert!(json.get("type").is_some());
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn health_report_defaults_from_empty_document() {
        let health: ServiceStatusHealth = serde_json::from_str("{}").unwrap();
        assert_eq!(health.mode, ServiceMode::Unknown);
        assert_eq!(health.status, ServiceHealth::Unknown);
        assert_eq!(health.details, "");
        assert!(health.stacktrace.is_none());
    }
}
