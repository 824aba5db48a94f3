//! Derived response documents served to readers. None of these are a source
//! of truth; the registry caches their serialized form purely to skip
//! recomputation on the read path.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate;
use crate::model::{Service, ServiceConfig, ServiceHealth, ServiceMode, ServiceStatus, ServiceWorkers};

/// Service-level verdict: the persisted fields plus everything computed at
/// read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub name: String,
    #[serde(default)]
    pub config: ServiceConfig,
    #[serde(default)]
    pub workers: ServiceWorkers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_running_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub timestamp_now: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Seconds since the reference check, fractional.
    #[serde(
        default,
        with = "duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub since_last_check: Option<Duration>,
    #[serde(default)]
    pub aggregate_status: ServiceHealth,
    #[serde(default)]
    pub aggregate_mode: ServiceMode,
    /// Seconds the service has been continuously running, fractional.
    #[serde(
        default,
        with = "duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub uptime: Option<Duration>,
    /// Stamped by the serving process, not by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_uptime_seconds: Option<f64>,
}

impl ServiceResponse {
    /// Computes the verdict for `service` as of `now`. Aggregation failures
    /// degrade to unknown inside [`aggregate`]; this never fails.
    pub fn from_service(service: &Service, now: DateTime<Utc>) -> Self {
        let agg = aggregate(service.config.policy, service.workers.as_slice());
        Self {
            name: service.name.clone(),
            config: service.config.clone(),
            workers: service.workers.clone(),
            first_running_at: service.first_running_at,
            timestamp_now: now,
            last_checked_at: agg.last_checked_at,
            since_last_check: agg.last_checked_at.map(|t| now.signed_duration_since(t)),
            aggregate_status: agg.status,
            aggregate_mode: agg.mode,
            uptime: service
                .first_running_at
                .map(|t| now.signed_duration_since(t)),
            server_uptime_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceListResponse {
    pub services: Vec<ServiceResponse>,
}

impl ServiceListResponse {
    pub fn from_services(services: &[Service], now: DateTime<Utc>) -> Self {
        Self {
            services: services
                .iter()
                .map(|s| ServiceResponse::from_service(s, now))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceWorkerResponse {
    pub worker: String,
    pub status: ServiceStatus,
}

/// Liveness of the serving process itself, independent of tracked services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonHealth {
    pub ok: bool,
    pub uptime_seconds: Option<f64>,
}

/// `Option<chrono::Duration>` as fractional seconds on the wire.
mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.num_milliseconds() as f64 / 1000.0)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs.map(|s| Duration::milliseconds((s * 1000.0) as i64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ServiceHealthWorkerPolicy, ServiceStatus};
    use chrono::TimeZone;

    fn sample_service() -> Service {
        let mut service = Service::new("db");
        service.config.policy = ServiceHealthWorkerPolicy::All;
        let mut w1 = ServiceStatus::named("w1");
        w1.health.status = ServiceHealth::Ok;
        w1.health.mode = ServiceMode::Running;
        w1.checked_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        service.workers.upsert(w1);
        service.first_running_at = Some(Utc.timestamp_opt(1_699_999_000, 0).unwrap());
        service
    }

    #[test]
    fn response_computes_verdict_and_durations() {
        let service = sample_service();
        let now = Utc.timestamp_opt(1_700_000_060, 0).unwrap();
        let resp = ServiceResponse::from_service(&service, now);

        assert_eq!(resp.aggregate_status, ServiceHealth::Ok);
        assert_eq!(resp.aggregate_mode, ServiceMode::Running);
        assert_eq!(
            resp.last_checked_at,
            Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        );
        assert_eq!(resp.since_last_check, Some(Duration::seconds(60)));
        assert_eq!(resp.uptime, Some(Duration::seconds(1060)));
        assert!(resp.server_uptime_seconds.is_none());
    }

    #[test]
    fn workerless_service_yields_unknown_verdict() {
        let service = Service::new("fresh");
        let resp = ServiceResponse::from_service(&service, Utc::now());
        assert_eq!(resp.aggregate_status, ServiceHealth::Unknown);
        assert_eq!(resp.aggregate_mode, ServiceMode::Unknown);
        assert!(resp.last_checked_at.is_none());
        assert!(resp.since_last_check.is_none());
        assert!(resp.uptime.is_none());
    }

    #[test]
    fn round_trip_preserves_identity_fields() {
        let service = sample_service();
        let now = Utc.timestamp_opt(1_700_000_060, 0).unwrap();
        let resp = ServiceResponse::from_service(&service, now);

        let json = serde_json::to_string(&resp).unwrap();
        let back: ServiceResponse = serde_json::from_str(&json).unwrap();

        assert_eq!(back.name, service.name);
        assert_eq!(back.config, service.config);
        assert_eq!(back.workers, service.workers);
        assert_eq!(back.first_running_at, service.first_running_at);
        assert_eq!(back.aggregate_status, resp.aggregate_status);
        assert_eq!(back.aggregate_mode, resp.aggregate_mode);
    }

    #[test]
    fn durations_serialize_as_fractional_seconds() {
        let service = sample_service();
        let now = Utc.timestamp_opt(1_700_000_060, 500_000_000).unwrap();
        let resp = ServiceResponse::from_service(&service, now);
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["since_last_check"].as_f64(), Some(60.5));
        assert_eq!(json["uptime"].as_f64(), Some(1060.5));
        assert!(json["timestamp_now"].is_string());
    }
}
