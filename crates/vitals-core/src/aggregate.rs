//! Policy-driven reduction of worker reports to one service verdict.

use chrono::{DateTime, Utc};

use crate::model::{ServiceHealth, ServiceHealthWorkerPolicy, ServiceMode, ServiceStatus};

/// Mode precedence used by the `any`/`all` policies, most alive first.
const MODE_PRECEDENCE: [ServiceMode; 5] = [
    ServiceMode::Running,
    ServiceMode::Starting,
    ServiceMode::Stopping,
    ServiceMode::Stopped,
    ServiceMode::Failed,
];

/// Outcome of reducing a worker list under a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregate {
    pub status: ServiceHealth,
    pub mode: ServiceMode,
    /// Reference timestamp of the verdict: max/min/median of the workers'
    /// `checked_at`, depending on the policy.
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Aggregate {
    pub const UNKNOWN: Aggregate = Aggregate {
        status: ServiceHealth::Unknown,
        mode: ServiceMode::Unknown,
        last_checked_at: None,
    };
}

/// The one partial operation in the engine: the median reference timestamp
/// for an even worker count needs midpoint arithmetic that can, in theory,
/// leave the representable time range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationUndefined {
    #[error("midpoint of median timestamps is not representable")]
    MedianOverflow,
}

/// Reduces `workers` under `policy`, degrading any undefined outcome to
/// `(unknown, unknown, None)`. Aggregation is never fatal to the caller.
pub fn aggregate(policy: ServiceHealthWorkerPolicy, workers: &[ServiceStatus]) -> Aggregate {
    try_aggregate(policy, workers).unwrap_or(Aggregate::UNKNOWN)
}

/// Like [`aggregate`], but surfaces the undefined outcome instead of
/// degrading it, for callers that want to observe the distinction.
pub fn try_aggregate(
    policy: ServiceHealthWorkerPolicy,
    workers: &[ServiceStatus],
) -> Result<Aggregate, AggregationUndefined> {
    if workers.is_empty() {
        return Ok(Aggregate::UNKNOWN);
    }

    let any_status = |status: ServiceHealth| workers.iter().any(|w| w.health.status == status);
    let all_status = |status: ServiceHealth| workers.iter().all(|w| w.health.status == status);
    let any_mode = |mode: ServiceMode| workers.iter().any(|w| w.health.mode == mode);
    let all_mode = |mode: ServiceMode| workers.iter().all(|w| w.health.mode == mode);

    match policy {
        ServiceHealthWorkerPolicy::Any => {
            let status = if any_status(ServiceHealth::Ok) {
                ServiceHealth::Ok
            } else if any_status(ServiceHealth::Error) {
                ServiceHealth::Error
            } else {
                ServiceHealth::Unknown
            };
            let mode = MODE_PRECEDENCE
                .into_iter()
                .find(|m| any_mode(*m))
                .unwrap_or(ServiceMode::Unknown);
            Ok(Aggregate {
                status,
                mode,
                last_checked_at: workers.iter().map(|w| w.checked_at).max(),
            })
        }
        ServiceHealthWorkerPolicy::All => {
            let status = if all_status(ServiceHealth::Ok) {
                ServiceHealth::Ok
            } else if any_status(ServiceHealth::Error) {
                ServiceHealth::Error
            } else {
                ServiceHealth::Unknown
            };
            let mode = if all_mode(ServiceMode::Running) {
                ServiceMode::Running
            } else if any_mode(ServiceMode::Starting) {
                ServiceMode::Starting
            } else if any_mode(ServiceMode::Stopping) {
                ServiceMode::Stopping
            } else if all_mode(ServiceMode::Stopped) {
                ServiceMode::Stopped
            } else if any_mode(ServiceMode::Failed) {
                ServiceMode::Failed
            } else {
                ServiceMode::Unknown
            };
            Ok(Aggregate {
                status,
                mode,
                last_checked_at: workers.iter().map(|w| w.checked_at).min(),
            })
        }
        ServiceHealthWorkerPolicy::Majority => {
            let total = workers.len();
            let ok = workers
                .iter()
                .filter(|w| w.health.status == ServiceHealth::Ok)
                .count();
            let err = workers
                .iter()
                .filter(|w| w.health.status == ServiceHealth::Error)
                .count();
            let status = if ok * 2 > total {
                ServiceHealth::Ok
            } else if err * 2 > total {
                ServiceHealth::Error
            } else {
                ServiceHealth::Unknown
            };
            Ok(Aggregate {
                status,
                mode: most_common_mode(workers),
                last_checked_at: median_checked_at(workers)?,
            })
        }
    }
}

/// Mode with the highest occurrence count; ties go to the mode seen first
/// in worker order.
fn most_common_mode(workers: &[ServiceStatus]) -> ServiceMode {
    let mut tally: Vec<(ServiceMode, usize)> = Vec::new();
    for worker in workers {
        match tally.iter_mut().find(|(m, _)| *m == worker.health.mode) {
            Some((_, count)) => *count += 1,
            None => tally.push((worker.health.mode, 1)),
        }
    }
    let mut best = (ServiceMode::Unknown, 0usize);
    for (mode, count) in tally {
        if count > best.1 {
            best = (mode, count);
        }
    }
    best.0
}

/// Median of the workers' `checked_at`. An even count takes the midpoint of
/// the two middle values by duration.
fn median_checked_at(
    workers: &[ServiceStatus],
) -> Result<Option<DateTime<Utc>>, AggregationUndefined> {
    let mut times: Vec<DateTime<Utc>> = workers.iter().map(|w| w.checked_at).collect();
    if times.is_empty() {
        return Ok(None);
    }
    times.sort_unstable();
    let n = times.len();
    if n % 2 == 1 {
        return Ok(Some(times[n / 2]));
    }
    let lower = times[n / 2 - 1];
    let upper = times[n / 2];
    let half = upper.signed_duration_since(lower) / 2;
    let midpoint = lower
        .checked_add_signed(half)
        .ok_or(AggregationUndefined::MedianOverflow)?;
    Ok(Some(midpoint))
}
