// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! The metrics collector: the only shared mutable state of a run.
//!
//! `record` is the hot path and stays near-lock-free: totals, the
//! read/write split, per-kind failure counts and the min/max latency bounds
//! are plain atomics; mutexes guard only the latency-ring insertion (skipped
//! for most records under a sub-unit sampling rate) and the fold of
//! result-carried metadata, which only results that actually carry tags pay
//! for. Snapshotting copies the counters, sorts a copy of the live samples
//! for percentiles and never disturbs concurrent recording.

use crate::error::ErrorKind;
use crate::latency::{LatencyRing, percentile};
use crate::op::OperationResult;
use crate::snapshot::{CoreStats, HealthIssue, MetricsSnapshot, SystemStats};
use blitz_config::LatencySettings;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Sentinel meaning "no record seen yet" in `first_record_nanos`.
const UNSET: u64 = u64::MAX;

/// Concurrent collector of operation outcomes.
///
/// Created at run start, fed by every worker, queried for snapshots on
/// demand and explicitly stopped when the run ends. `reset` is a hard
/// transition between logical runs; workers that keep recording afterward
/// simply contribute to the new window.
pub struct MetricsCollector {
    sample_rate: f64,
    anchor: Instant,
    anchor_wall: DateTime<Utc>,
    /// Nanoseconds from `anchor` to the first record, or [`UNSET`].
    first_record_nanos: AtomicU64,
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    read: AtomicU64,
    write: AtomicU64,
    lat_sum_nanos: AtomicU64,
    lat_count: AtomicU64,
    lat_min_nanos: AtomicU64,
    lat_max_nanos: AtomicU64,
    errors: [AtomicU64; ErrorKind::ALL.len()],
    ring: Mutex<LatencyRing>,
    /// Result-carried tags, folded into the snapshot's protocol layer.
    /// Last write wins per key. Locked only for results that carry tags.
    result_metadata: Mutex<HashMap<String, serde_json::Value>>,
    stopped: AtomicBool,
}

impl MetricsCollector {
    /// Creates an open collector with the given latency settings.
    #[must_use]
    pub fn new(latency: &LatencySettings) -> Self {
        MetricsCollector {
            sample_rate: latency.sample_rate.clamp(0.0, 1.0),
            anchor: Instant::now(),
            anchor_wall: Utc::now(),
            first_record_nanos: AtomicU64::new(UNSET),
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            read: AtomicU64::new(0),
            write: AtomicU64::new(0),
            lat_sum_nanos: AtomicU64::new(0),
            lat_count: AtomicU64::new(0),
            lat_min_nanos: AtomicU64::new(UNSET),
            lat_max_nanos: AtomicU64::new(0),
            errors: Default::default(),
            ring: Mutex::new(LatencyRing::new(latency.capacity)),
            result_metadata: Mutex::new(HashMap::new()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Records one operation outcome.
    ///
    /// Anomalous inputs (a failure without a descriptor, a result without a
    /// duration) are logged and absorbed; one bad record must not poison the
    /// aggregate state or abort a worker.
    pub fn record(&self, result: &OperationResult) {
        if self.stopped.load(Ordering::Acquire) {
            tracing::debug!("dropping record observed after collector stop");
            return;
        }

        if self.first_record_nanos.load(Ordering::Relaxed) == UNSET {
            let offset = clamp_nanos(self.anchor.elapsed());
            let _ = self.first_record_nanos.compare_exchange(
                UNSET,
                offset,
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }

        let _ = self.total.fetch_add(1, Ordering::Relaxed);
        if result.success {
            let _ = self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            let _ = self.failed.fetch_add(1, Ordering::Relaxed);
            let kind = result.error_kind().unwrap_or_else(|| {
                tracing::error!("failed result without error descriptor; counting as internal");
                ErrorKind::Internal
            });
            let _ = self.errors[kind.index()].fetch_add(1, Ordering::Relaxed);
        }
        if result.is_read {
            let _ = self.read.fetch_add(1, Ordering::Relaxed);
        } else {
            let _ = self.write.fetch_add(1, Ordering::Relaxed);
        }

        if !result.metadata.is_empty() {
            let mut metadata = self.result_metadata.lock();
            for (name, value) in &result.metadata {
                let _ = metadata.insert(name.clone(), value.clone());
            }
        }

        match result.duration {
            Some(duration) => {
                let nanos = clamp_nanos(duration);
                let _ = self.lat_sum_nanos.fetch_add(nanos, Ordering::Relaxed);
                let _ = self.lat_count.fetch_add(1, Ordering::Relaxed);
                let _ = self.lat_min_nanos.fetch_min(nanos, Ordering::Relaxed);
                let _ = self.lat_max_nanos.fetch_max(nanos, Ordering::Relaxed);
                if self.should_sample() {
                    self.ring.lock().push(nanos);
                }
            }
            None => tracing::debug!("result recorded without a duration"),
        }
    }

    fn should_sample(&self) -> bool {
        if self.sample_rate >= 1.0 {
            return true;
        }
        if self.sample_rate <= 0.0 {
            return false;
        }
        rand::rng().random::<f64>() < self.sample_rate
    }

    /// Takes an immutable snapshot of the core statistics. Does not reset
    /// anything.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot_with(None, HashMap::new(), Vec::new())
    }

    /// Takes a snapshot and attaches a system sample and the adapter's
    /// protocol counters.
    ///
    /// The protocol layer is the union of result-carried metadata and the
    /// adapter's own counters; the adapter's counters win on key clashes.
    #[must_use]
    pub fn snapshot_with(
        &self,
        system: Option<SystemStats>,
        protocol: HashMap<String, serde_json::Value>,
        health_issues: Vec<HealthIssue>,
    ) -> MetricsSnapshot {
        let mut merged = self.result_metadata.lock().clone();
        merged.extend(protocol);
        MetricsSnapshot {
            core: self.core_stats(),
            system,
            protocol: merged,
            health_issues,
        }
    }

    fn core_stats(&self) -> CoreStats {
        let now = Utc::now();
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            let mut zero = CoreStats::zero(now);
            zero.latency_sample_rate = self.sample_rate;
            return zero;
        }

        let success = self.success.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Relaxed);
        let lat_sum = self.lat_sum_nanos.load(Ordering::Relaxed);
        let lat_count = self.lat_count.load(Ordering::Relaxed);
        let lat_min = self.lat_min_nanos.load(Ordering::Relaxed);
        let lat_max = self.lat_max_nanos.load(Ordering::Relaxed);

        let (sorted, samples) = {
            let ring = self.ring.lock();
            (ring.sorted(), ring.len())
        };

        let first_offset = self.first_record_nanos.load(Ordering::Acquire);
        let (start_time, elapsed) = if first_offset == UNSET {
            (now, Duration::ZERO)
        } else {
            let offset = Duration::from_nanos(first_offset);
            (
                self.anchor_wall
                    + chrono::Duration::from_std(offset).unwrap_or_else(|_| chrono::Duration::zero()),
                self.anchor.elapsed().saturating_sub(offset),
            )
        };

        let mut errors = BTreeMap::new();
        for kind in ErrorKind::ALL {
            let count = self.errors[kind.index()].load(Ordering::Relaxed);
            if count > 0 {
                let _ = errors.insert(kind.label().to_owned(), count);
            }
        }

        let avg = if lat_count > 0 { lat_sum / lat_count } else { 0 };
        let elapsed_secs = elapsed.as_secs_f64();
        CoreStats {
            total,
            success,
            failed,
            read,
            write,
            success_rate: success as f64 / total as f64 * 100.0,
            avg_latency: Duration::from_nanos(avg),
            min_latency: Duration::from_nanos(if lat_min == UNSET { 0 } else { lat_min }),
            max_latency: Duration::from_nanos(lat_max),
            p50_latency: Duration::from_nanos(percentile(&sorted, 0.50)),
            p90_latency: Duration::from_nanos(percentile(&sorted, 0.90)),
            p95_latency: Duration::from_nanos(percentile(&sorted, 0.95)),
            p99_latency: Duration::from_nanos(percentile(&sorted, 0.99)),
            rps: if elapsed_secs > 0.0 {
                total as f64 / elapsed_secs
            } else {
                0.0
            },
            elapsed,
            start_time,
            end_time: now,
            latency_samples: samples,
            latency_sample_rate: self.sample_rate,
            errors,
        }
    }

    /// Zeros every counter, empties the ring and clears the start time.
    /// A hard transition between logical runs.
    pub fn reset(&self) {
        self.first_record_nanos.store(UNSET, Ordering::Release);
        self.total.store(0, Ordering::Relaxed);
        self.success.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.read.store(0, Ordering::Relaxed);
        self.write.store(0, Ordering::Relaxed);
        self.lat_sum_nanos.store(0, Ordering::Relaxed);
        self.lat_count.store(0, Ordering::Relaxed);
        self.lat_min_nanos.store(UNSET, Ordering::Relaxed);
        self.lat_max_nanos.store(0, Ordering::Relaxed);
        for counter in &self.errors {
            counter.store(0, Ordering::Relaxed);
        }
        self.ring.lock().clear();
        self.result_metadata.lock().clear();
    }

    /// Stops the collector; later records are dropped.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Whether `stop` has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

fn clamp_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX - 1)
}
