// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! The run orchestrator.
//!
//! One [`Runner::run`] call drives a complete benchmark: connect the
//! adapter, open the collector, start the system monitor, spawn exactly
//! `parallels` workers over a bounded job channel, produce jobs until the
//! total or the duration bound fires, then drain, stop and snapshot.
//!
//! The job channel is the backpressure point: its capacity is a small
//! multiple of the worker count, so a slow adapter stalls the producer
//! instead of buffering unboundedly. The producer never blocks past
//! cancellation; it always selects between sending and the run token.

use crate::adapter::ProtocolAdapter;
use crate::error::{Error, ErrorKind};
use crate::factory::OperationFactory;
use crate::metrics::MetricsCollector;
use crate::monitor::SystemMonitor;
use crate::op::OperationResult;
use crate::snapshot::MetricsSnapshot;
use blitz_config::{CoreSettings, LatencySettings, MonitorSettings, WorkloadConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How long the dispatcher waits for workers to settle after cancellation
/// before aborting them outright.
const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Job-channel capacity per worker.
const JOBS_PER_WORKER: usize = 2;

/// Orchestrates workers, producer, collector and monitor for one run.
#[derive(Debug, Clone)]
pub struct Runner {
    latency: LatencySettings,
    monitor: MonitorSettings,
    grace: Duration,
}

impl Default for Runner {
    fn default() -> Self {
        Runner::new()
    }
}

impl Runner {
    /// A runner with default latency, monitor and grace settings.
    #[must_use]
    pub fn new() -> Self {
        Runner {
            latency: LatencySettings::default(),
            monitor: MonitorSettings::default(),
            grace: DEFAULT_GRACE,
        }
    }

    /// A runner configured from the core settings layer.
    #[must_use]
    pub fn from_settings(settings: &CoreSettings) -> Self {
        Runner {
            latency: settings.latency.clone(),
            monitor: settings.monitor.clone(),
            grace: DEFAULT_GRACE,
        }
    }

    /// Overrides the post-cancellation grace period.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Executes one benchmark run to completion and returns the final
    /// snapshot.
    ///
    /// Connect and configuration failures abort before any metric is
    /// recorded. Cancellation is not an error: the run drains, and the
    /// snapshot covers whatever completed.
    pub async fn run(
        &self,
        token: CancellationToken,
        adapter: Arc<dyn ProtocolAdapter>,
        config: &WorkloadConfig,
        factory: Arc<dyn OperationFactory>,
    ) -> Result<MetricsSnapshot, Error> {
        config.validate()?;
        adapter.connect().await?;
        tracing::info!(
            protocol = adapter.name(),
            total = config.total,
            parallels = config.parallels,
            duration = ?config.duration,
            "starting run"
        );

        let collector = Arc::new(MetricsCollector::new(&self.latency));
        let active_workers = Arc::new(AtomicUsize::new(0));
        let monitor = SystemMonitor::start(self.monitor.clone(), active_workers.clone());

        let capacity = config.parallels.saturating_mul(JOBS_PER_WORKER).max(1);
        let (job_tx, job_rx) = flume::bounded::<u64>(capacity);

        let producer = tokio::spawn(produce_jobs(
            job_tx,
            config.total,
            config.duration,
            token.clone(),
        ));

        let run_started = Instant::now();
        let mut workers = JoinSet::new();
        for worker_id in 0..config.parallels {
            let ctx = WorkerContext {
                worker_id,
                run_started,
                config: config.clone(),
                adapter: adapter.clone(),
                factory: factory.clone(),
                collector: collector.clone(),
                jobs: job_rx.clone(),
                token: token.clone(),
                active: active_workers.clone(),
            };
            let _ = workers.spawn(worker_loop(ctx));
        }
        drop(job_rx);

        self.drain_workers(&mut workers, &token).await;

        match producer.await {
            Ok(produced) => tracing::debug!(produced, "job production finished"),
            Err(err) if err.is_cancelled() => {}
            Err(err) => tracing::error!(%err, "job producer failed"),
        }

        let system = monitor.latest();
        let health_issues = monitor.health_issues();
        monitor.stop().await;

        let snapshot =
            collector.snapshot_with(system, adapter.protocol_metrics(), health_issues);
        collector.stop();

        if let Err(err) = adapter.close().await {
            tracing::warn!(%err, protocol = adapter.name(), "adapter close failed");
        }

        tracing::info!(
            total = snapshot.core.total,
            success = snapshot.core.success,
            failed = snapshot.core.failed,
            rps = snapshot.core.rps,
            "run finished"
        );
        Ok(snapshot)
    }

    /// Waits for every worker to exit. After cancellation, workers get the
    /// grace period to settle before being aborted.
    async fn drain_workers(&self, workers: &mut JoinSet<()>, token: &CancellationToken) {
        let grace = self.grace;
        let cancel_deadline = async {
            token.cancelled().await;
            tokio::time::sleep(grace).await;
        };
        tokio::pin!(cancel_deadline);
        let mut aborted = false;

        while !workers.is_empty() {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(err)) if err.is_cancelled() => {}
                    Some(Err(err)) => tracing::error!(%err, "worker task failed"),
                },
                _ = &mut cancel_deadline, if !aborted => {
                    aborted = true;
                    tracing::warn!(
                        grace = ?grace,
                        "grace period expired; aborting outstanding workers"
                    );
                    workers.abort_all();
                }
            }
        }
    }
}

/// Emits job indices until the total or duration bound fires, then closes
/// the channel by dropping the sender. Returns the number of jobs emitted.
async fn produce_jobs(
    jobs: flume::Sender<u64>,
    total: u64,
    duration: Option<Duration>,
    token: CancellationToken,
) -> u64 {
    let deadline = duration
        .filter(|d| !d.is_zero())
        .map(|d| Instant::now() + d);
    let mut produced = 0u64;

    loop {
        if total > 0 && produced >= total {
            break;
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = deadline_elapsed(deadline) => break,
            sent = jobs.send_async(produced) => {
                if sent.is_err() {
                    // Every worker is gone; nothing left to feed.
                    break;
                }
                produced += 1;
            }
        }
    }
    produced
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

struct WorkerContext {
    worker_id: usize,
    run_started: Instant,
    config: WorkloadConfig,
    adapter: Arc<dyn ProtocolAdapter>,
    factory: Arc<dyn OperationFactory>,
    collector: Arc<MetricsCollector>,
    jobs: flume::Receiver<u64>,
    token: CancellationToken,
    active: Arc<AtomicUsize>,
}

/// One worker: wait out the ramp-up slot, then pull jobs until the channel
/// closes or the run is cancelled. Strictly sequential within the worker.
async fn worker_loop(ctx: WorkerContext) {
    if let Some(ramp) = ctx.config.ramp_up.filter(|r| !r.is_zero()) {
        let slot = ramp.mul_f64(ctx.worker_id as f64 / ctx.config.parallels.max(1) as f64);
        tokio::select! {
            _ = ctx.token.cancelled() => return,
            _ = tokio::time::sleep_until(ctx.run_started + slot) => {}
        }
    }

    let _ = ctx.active.fetch_add(1, Ordering::Relaxed);
    loop {
        let job = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => break,
            job = ctx.jobs.recv_async() => match job {
                Ok(job) => job,
                // Producer closed the channel and the queue is drained.
                Err(_) => break,
            },
        };
        execute_one(&ctx, job).await;
    }
    let _ = ctx.active.fetch_sub(1, Ordering::Relaxed);
}

/// Executes a single job and records its outcome.
///
/// The per-operation deadline is enforced here; an in-flight operation
/// interrupted by cancellation is recorded as a `canceled` failure. The
/// adapter's own duration wins; the dispatch wall clock is only the
/// fallback.
async fn execute_one(ctx: &WorkerContext, job: u64) {
    let op = ctx.factory.create(job, &ctx.config);
    let is_read = op.is_read_hint();
    let dispatched = Instant::now();

    let outcome = tokio::select! {
        biased;
        _ = ctx.token.cancelled() => None,
        result = tokio::time::timeout(ctx.config.timeout, ctx.adapter.execute(op)) => Some(result),
    };

    let result = match outcome {
        Some(Ok(result)) => result.or_duration(dispatched.elapsed()),
        Some(Err(_)) => {
            OperationResult::failure(ErrorKind::Timeout, "per-operation deadline elapsed")
                .with_read(is_read)
                .with_duration(ctx.config.timeout)
        }
        None => OperationResult::failure(ErrorKind::Canceled, "run canceled mid-operation")
            .with_read(is_read)
            .with_duration(dispatched.elapsed().min(ctx.config.timeout)),
    };
    ctx.collector.record(&result);
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;
    use crate::factory::FixedOpFactory;
    use crate::testing::MockAdapter;

    fn workload(total: u64, parallels: usize) -> WorkloadConfig {
        WorkloadConfig {
            total,
            parallels,
            timeout: Duration::from_secs(1),
            ..WorkloadConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn connect_failure_aborts_without_metrics() {
        let adapter = Arc::new(MockAdapter::new().with_connect_failure());
        let config = workload(10, 2);
        let factory = Arc::new(FixedOpFactory::new("set", false, &config));
        let err = Runner::new()
            .run(CancellationToken::new(), adapter, &config, factory)
            .await
            .expect_err("connect failure must abort the run");
        assert_eq!(err.kind(), ErrorKind::Connect);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn invalid_workload_aborts_before_connect() {
        let adapter = Arc::new(MockAdapter::new());
        let mut config = workload(0, 2);
        config.duration = None;
        let factory = Arc::new(FixedOpFactory::new("set", false, &config));
        let err = Runner::new()
            .run(CancellationToken::new(), adapter.clone(), &config, factory)
            .await
            .expect_err("unbounded workload must be rejected");
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(adapter.executed(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn adapter_is_closed_after_the_run() {
        let adapter = Arc::new(MockAdapter::new());
        let config = workload(25, 5);
        let factory = Arc::new(FixedOpFactory::new("set", false, &config));
        let snapshot = Runner::new()
            .run(CancellationToken::new(), adapter.clone(), &config, factory)
            .await
            .expect("run succeeds");
        assert_eq!(snapshot.core.total, 25);
        assert_eq!(adapter.closes(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn protocol_metrics_are_merged() {
        let adapter = Arc::new(MockAdapter::new());
        let config = workload(10, 2);
        let factory = Arc::new(FixedOpFactory::new("set", false, &config));
        let snapshot = Runner::new()
            .run(CancellationToken::new(), adapter, &config, factory)
            .await
            .expect("run succeeds");
        assert_eq!(
            snapshot.protocol.get("operations_executed"),
            Some(&serde_json::json!(10))
        );
    }
}
