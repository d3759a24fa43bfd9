// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Immutable point-in-time views of a run.
//!
//! A snapshot is a pure value: taking one never resets the collector, and
//! two snapshots taken at different times are independent. The JSON report
//! serializes these structures field for field, so every addition here is a
//! report-format change.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

fn duration_ms<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1_000.0)
}

/// Aggregate statistics over every recorded operation result.
#[derive(Debug, Clone, Serialize)]
pub struct CoreStats {
    /// Total operations recorded.
    pub total: u64,
    /// Operations that succeeded.
    pub success: u64,
    /// Operations that failed, regardless of kind.
    pub failed: u64,
    /// Operations classified as reads.
    pub read: u64,
    /// Operations classified as writes.
    pub write: u64,
    /// Success share in percent, `0` when nothing was recorded.
    pub success_rate: f64,
    /// Mean latency over every result that carried a duration.
    #[serde(serialize_with = "duration_ms", rename = "avg_latency_ms")]
    pub avg_latency: Duration,
    /// Smallest latency observed since the last reset.
    #[serde(serialize_with = "duration_ms", rename = "min_latency_ms")]
    pub min_latency: Duration,
    /// Largest latency observed since the last reset.
    #[serde(serialize_with = "duration_ms", rename = "max_latency_ms")]
    pub max_latency: Duration,
    /// 50th percentile over the sampled latency history.
    #[serde(serialize_with = "duration_ms", rename = "p50_latency_ms")]
    pub p50_latency: Duration,
    /// 90th percentile over the sampled latency history.
    #[serde(serialize_with = "duration_ms", rename = "p90_latency_ms")]
    pub p90_latency: Duration,
    /// 95th percentile over the sampled latency history.
    #[serde(serialize_with = "duration_ms", rename = "p95_latency_ms")]
    pub p95_latency: Duration,
    /// 99th percentile over the sampled latency history.
    #[serde(serialize_with = "duration_ms", rename = "p99_latency_ms")]
    pub p99_latency: Duration,
    /// Recorded operations per elapsed second.
    pub rps: f64,
    /// Monotonic time between the first record and this snapshot.
    #[serde(serialize_with = "duration_ms", rename = "elapsed_ms")]
    pub elapsed: Duration,
    /// Wall-clock time of the first recorded result.
    pub start_time: DateTime<Utc>,
    /// Wall-clock time this snapshot was taken.
    pub end_time: DateTime<Utc>,
    /// Number of latency samples the percentiles were computed from.
    pub latency_samples: usize,
    /// Configured sampling rate, reported so consumers can judge precision.
    pub latency_sample_rate: f64,
    /// Failure counts per error kind; only non-zero kinds appear.
    pub errors: BTreeMap<String, u64>,
}

impl CoreStats {
    /// An all-zero block with both timestamps set to `now`.
    #[must_use]
    pub fn zero(now: DateTime<Utc>) -> Self {
        CoreStats {
            total: 0,
            success: 0,
            failed: 0,
            read: 0,
            write: 0,
            success_rate: 0.0,
            avg_latency: Duration::ZERO,
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
            p50_latency: Duration::ZERO,
            p90_latency: Duration::ZERO,
            p95_latency: Duration::ZERO,
            p99_latency: Duration::ZERO,
            rps: 0.0,
            elapsed: Duration::ZERO,
            start_time: now,
            end_time: now,
            latency_samples: 0,
            latency_sample_rate: 1.0,
            errors: BTreeMap::new(),
        }
    }
}

/// Process and runtime health captured by the system monitor.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    /// Resident set size of this process, in bytes.
    pub memory_bytes: u64,
    /// Virtual memory of this process, in bytes.
    pub virtual_memory_bytes: u64,
    /// Total memory of the machine, in bytes.
    pub total_memory_bytes: u64,
    /// CPU usage of this process in percent of one core.
    pub cpu_percent: f32,
    /// Workers currently alive inside the engine.
    pub active_workers: usize,
    /// When this sample was taken.
    pub sampled_at: DateTime<Utc>,
}

/// A non-fatal threshold violation observed by the system monitor.
#[derive(Debug, Clone, Serialize)]
pub struct HealthIssue {
    /// What was violated, e.g. `memory_usage`.
    pub subject: String,
    /// Human-readable description.
    pub message: String,
    /// The observed value.
    pub value: f64,
    /// The configured threshold the value crossed.
    pub threshold: f64,
    /// When the violation was observed.
    pub at: DateTime<Utc>,
}

/// Immutable aggregate view of a run: core statistics, the most recent
/// system sample, and the adapter's protocol-specific counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Aggregate operation statistics.
    pub core: CoreStats,
    /// Most recent system sample, absent when the monitor never ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemStats>,
    /// Adapter-specific counters, keyed by the adapter's metric names.
    /// Opaque to the engine.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub protocol: HashMap<String, serde_json::Value>,
    /// Threshold violations recorded during the run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub health_issues: Vec<HealthIssue>,
}
