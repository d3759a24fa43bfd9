// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Periodic process-health sampling.
//!
//! The monitor runs on its own schedule from run start to run stop and
//! keeps a bounded ring of recent samples. Threshold violations become
//! [`HealthIssue`] entries on the snapshot; they are never fatal to the
//! run.

use crate::snapshot::{HealthIssue, SystemStats};
use blitz_config::MonitorSettings;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;

struct MonitorShared {
    settings: MonitorSettings,
    samples: Mutex<VecDeque<SystemStats>>,
    issues: Mutex<Vec<HealthIssue>>,
    active_workers: Arc<AtomicUsize>,
}

/// Samples process memory, CPU and worker count on a fixed interval.
pub struct SystemMonitor {
    shared: Arc<MonitorShared>,
    token: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl SystemMonitor {
    /// Starts the sampling task. `active_workers` is the engine's live
    /// worker gauge, shared with the runner.
    #[must_use]
    pub fn start(settings: MonitorSettings, active_workers: Arc<AtomicUsize>) -> Self {
        let shared = Arc::new(MonitorShared {
            settings,
            samples: Mutex::new(VecDeque::new()),
            issues: Mutex::new(Vec::new()),
            active_workers,
        });
        let token = CancellationToken::new();
        let task = tokio::spawn(sampling_loop(shared.clone(), token.clone()));
        SystemMonitor {
            shared,
            token,
            task,
        }
    }

    /// The most recent sample, if any was taken yet.
    #[must_use]
    pub fn latest(&self) -> Option<SystemStats> {
        self.shared.samples.lock().back().cloned()
    }

    /// Every threshold violation observed so far.
    #[must_use]
    pub fn health_issues(&self) -> Vec<HealthIssue> {
        self.shared.issues.lock().clone()
    }

    /// Stops the sampling task and waits for it to exit.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(err) = self.task.await {
            tracing::warn!(%err, "system monitor task did not shut down cleanly");
        }
    }
}

async fn sampling_loop(shared: Arc<MonitorShared>, token: CancellationToken) {
    let mut interval = tokio::time::interval(shared.settings.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut sys = System::new();
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(err) => {
            tracing::warn!(err, "cannot resolve own pid; system monitoring disabled");
            return;
        }
    };
    let mut over_threshold = false;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                take_sample(&shared, &mut sys, pid, &mut over_threshold);
            }
        }
    }
}

fn take_sample(shared: &MonitorShared, sys: &mut System, pid: Pid, over_threshold: &mut bool) {
    sys.refresh_memory();
    let _ = sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    let Some(process) = sys.process(pid) else {
        tracing::debug!("own process missing from refresh; skipping sample");
        return;
    };

    let sample = SystemStats {
        memory_bytes: process.memory(),
        virtual_memory_bytes: process.virtual_memory(),
        total_memory_bytes: sys.total_memory(),
        cpu_percent: process.cpu_usage(),
        active_workers: shared.active_workers.load(Ordering::Relaxed),
        sampled_at: Utc::now(),
    };

    check_memory_threshold(shared, &sample, over_threshold);

    let mut samples = shared.samples.lock();
    if samples.len() >= shared.settings.history {
        let _ = samples.pop_front();
    }
    samples.push_back(sample);
}

/// Records a health issue on the rising edge of a memory-threshold
/// violation. Repeated samples above the threshold do not spam the list.
fn check_memory_threshold(shared: &MonitorShared, sample: &SystemStats, over_threshold: &mut bool) {
    if sample.total_memory_bytes == 0 {
        return;
    }
    let used_percent = sample.memory_bytes as f64 / sample.total_memory_bytes as f64 * 100.0;
    let threshold = shared.settings.memory_threshold_percent;
    if used_percent > threshold {
        if !*over_threshold {
            *over_threshold = true;
            let mut issues = shared.issues.lock();
            // Bound the list the same way the sample ring is bounded.
            if issues.len() < shared.settings.history {
                issues.push(HealthIssue {
                    subject: "memory_usage".to_owned(),
                    message: format!(
                        "process memory at {used_percent:.1}% of total exceeds {threshold:.1}%"
                    ),
                    value: used_percent,
                    threshold,
                    at: sample.sampled_at,
                });
            }
            tracing::warn!(used_percent, threshold, "memory threshold exceeded");
        }
    } else {
        *over_threshold = false;
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;
    use std::time::Duration;

    fn settings(interval_ms: u64, threshold: f64) -> MonitorSettings {
        MonitorSettings {
            interval: Duration::from_millis(interval_ms),
            history: 3,
            memory_threshold_percent: threshold,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn monitor_produces_samples() {
        let workers = Arc::new(AtomicUsize::new(7));
        let monitor = SystemMonitor::start(settings(10, 80.0), workers);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let sample = monitor.latest().expect("at least one sample");
        assert!(sample.memory_bytes > 0);
        assert_eq!(sample.active_workers, 7);
        monitor.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn history_ring_is_bounded() {
        let monitor = SystemMonitor::start(settings(5, 80.0), Arc::new(AtomicUsize::new(0)));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(monitor.shared.samples.lock().len() <= 3);
        monitor.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn zero_threshold_records_issue_without_spam() {
        let monitor = SystemMonitor::start(settings(5, 0.0), Arc::new(AtomicUsize::new(0)));
        tokio::time::sleep(Duration::from_millis(120)).await;
        let issues = monitor.health_issues();
        // Rising-edge detection: many samples, one issue.
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].subject, "memory_usage");
        monitor.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_terminates_promptly() {
        let monitor = SystemMonitor::start(settings(1_000, 80.0), Arc::new(AtomicUsize::new(0)));
        tokio::time::timeout(Duration::from_secs(1), monitor.stop())
            .await
            .expect("stop must not hang on a long interval");
    }
}
