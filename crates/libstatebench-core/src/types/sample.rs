use serde::{Deserialize, Serialize};

use crate::metrics::MetricKind;

/// One observed value for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric: MetricKind,
    pub value: f64,
    pub ts_unix_ms: u64,
}

impl MetricSample {
    pub fn now(metric: MetricKind, value: f64) -> Self {
        Self {
            metric,
            value,
            ts_unix_ms: current_timestamp_ms(),
        }
    }
}

/// One tick of the resource sampler
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceSample {
    pub ts_unix_ms: u64,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub event_loop_lag_ms: f64,
}

/// Get current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
