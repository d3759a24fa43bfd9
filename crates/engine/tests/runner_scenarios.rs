// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs of the engine against scripted adapters: deterministic
//! counts, read/write split, timeouts, cancellation, duration mode and
//! bounded memory.

use blitz_config::{CoreSettings, LatencySettings, WorkloadConfig};
use blitz_engine::error::ErrorKind;
use blitz_engine::factory::{FixedOpFactory, ReadWriteMixFactory};
use blitz_engine::runner::Runner;
use blitz_engine::testing::{MockAdapter, MockBehavior};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn workload(total: u64, parallels: usize) -> WorkloadConfig {
    WorkloadConfig {
        total,
        parallels,
        timeout: Duration::from_secs(1),
        ..WorkloadConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn deterministic_count() {
    let adapter = Arc::new(MockAdapter::new().with_delay(Duration::from_millis(1)));
    let config = workload(1_000, 10);
    let factory = Arc::new(FixedOpFactory::new("set", false, &config));

    let snapshot = Runner::new()
        .run(CancellationToken::new(), adapter, &config, factory)
        .await
        .expect("run succeeds");

    let core = &snapshot.core;
    assert_eq!(core.total, 1_000);
    assert_eq!(core.success, 1_000);
    assert_eq!(core.failed, 0);
    assert_eq!(core.write, 1_000);
    assert_eq!(core.read, 0);
    assert_eq!(core.success_rate, 100.0);
    // The mock sleeps 1ms per op; latencies sit at or slightly above that.
    assert!(core.min_latency >= Duration::from_millis(1));
    assert!(core.avg_latency >= Duration::from_millis(1));
    assert!(core.max_latency < Duration::from_secs(1));
    assert!(core.errors.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn read_write_split_tracks_configured_percent() {
    let adapter = Arc::new(MockAdapter::new());
    let mut config = workload(10_000, 8);
    config.read_percent = 30;
    let factory = Arc::new(ReadWriteMixFactory::new("set", "get", &config));

    let snapshot = Runner::new()
        .run(CancellationToken::new(), adapter, &config, factory)
        .await
        .expect("run succeeds");

    let core = &snapshot.core;
    assert_eq!(core.total, 10_000);
    assert_eq!(core.total, core.read + core.write);
    let ratio = core.read as f64 / core.total as f64;
    assert!(
        (ratio - 0.30).abs() <= 0.02,
        "read ratio {ratio} too far from 0.30"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn slow_adapter_times_out_every_operation() {
    let adapter = Arc::new(MockAdapter::new().with_delay(Duration::from_millis(200)));
    let mut config = workload(100, 10);
    config.timeout = Duration::from_millis(50);
    let factory = Arc::new(FixedOpFactory::new("set", false, &config));

    let started = Instant::now();
    let snapshot = Runner::new()
        .run(CancellationToken::new(), adapter, &config, factory)
        .await
        .expect("run succeeds despite failures");

    let core = &snapshot.core;
    assert_eq!(core.total, 100);
    assert_eq!(core.success, 0);
    assert_eq!(core.failed, 100);
    assert_eq!(core.errors.get("timeout"), Some(&100));
    // 10 workers x 10 jobs x 50ms, plus scheduling slack.
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "timeouts must not serialize the run"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn cancellation_drains_and_reports() {
    let adapter = Arc::new(MockAdapter::new().with_delay(Duration::from_millis(100)));
    let config = workload(100_000, 4);
    let factory = Arc::new(FixedOpFactory::new("set", false, &config));
    let token = CancellationToken::new();

    let canceler = token.clone();
    let _cancel_task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceler.cancel();
    });

    let started = Instant::now();
    let snapshot = Runner::new()
        .with_grace(Duration::from_secs(1))
        .run(token, adapter, &config, factory)
        .await
        .expect("cancellation is a clean exit, not an error");

    assert!(
        started.elapsed() < Duration::from_secs(3),
        "run must return promptly after cancellation"
    );
    let core = &snapshot.core;
    assert_eq!(core.total, core.success + core.failed);
    assert!(core.total < 100_000, "cancellation must cut the run short");
    assert!(
        core.errors.get("canceled").copied().unwrap_or(0) >= 1,
        "in-flight operations are recorded as canceled"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn duration_mode_runs_for_the_configured_window() {
    let adapter = Arc::new(MockAdapter::new());
    let mut config = workload(0, 8);
    config.duration = Some(Duration::from_secs(2));
    let factory = Arc::new(FixedOpFactory::new("set", false, &config));

    let snapshot = Runner::new()
        .run(CancellationToken::new(), adapter, &config, factory)
        .await
        .expect("run succeeds");

    let core = &snapshot.core;
    assert!(core.total > 0);
    assert!(core.rps > 0.0);
    assert!(
        core.elapsed >= Duration::from_millis(1_800),
        "elapsed {:?} shorter than the configured window",
        core.elapsed
    );
    assert!(
        core.elapsed <= Duration::from_millis(3_000),
        "elapsed {:?} ran far past the configured window",
        core.elapsed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn latency_memory_stays_bounded() {
    let adapter = Arc::new(MockAdapter::new());
    let config = workload(500_000, 8);
    let factory = Arc::new(FixedOpFactory::new("set", false, &config));

    let settings = CoreSettings {
        latency: LatencySettings {
            capacity: 1_000,
            sample_rate: 1.0,
        },
        ..CoreSettings::default()
    };

    let snapshot = Runner::from_settings(&settings)
        .run(CancellationToken::new(), adapter, &config, factory)
        .await
        .expect("run succeeds");

    let core = &snapshot.core;
    assert_eq!(core.total, 500_000);
    assert_eq!(
        core.latency_samples, 1_000,
        "ring must hold exactly its capacity after overflow"
    );
    assert!(core.min_latency <= core.p50_latency);
    assert!(core.p99_latency <= core.max_latency);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn cancelling_before_any_job_yields_an_empty_snapshot() {
    let adapter = Arc::new(MockAdapter::new().with_delay(Duration::from_millis(10)));
    let config = workload(1_000, 4);
    let factory = Arc::new(FixedOpFactory::new("set", false, &config));
    let token = CancellationToken::new();
    token.cancel();

    let snapshot = Runner::new()
        .run(token, adapter, &config, factory)
        .await
        .expect("pre-cancelled run still returns a snapshot");

    assert_eq!(snapshot.core.total, 0);
    assert_eq!(snapshot.core.elapsed, Duration::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn ramp_up_staggers_but_completes() {
    let adapter = Arc::new(MockAdapter::new());
    let mut config = workload(1_000, 4);
    config.ramp_up = Some(Duration::from_millis(200));
    let factory = Arc::new(FixedOpFactory::new("set", false, &config));

    let snapshot = Runner::new()
        .run(CancellationToken::new(), adapter, &config, factory)
        .await
        .expect("run succeeds");
    assert_eq!(snapshot.core.total, 1_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn protocol_failures_do_not_abort_the_run() {
    let adapter = Arc::new(
        MockAdapter::new().with_behavior(MockBehavior::Fail(ErrorKind::Protocol)),
    );
    let config = workload(500, 4);
    let factory = Arc::new(FixedOpFactory::new("set", false, &config));

    let snapshot = Runner::new()
        .run(CancellationToken::new(), adapter.clone(), &config, factory)
        .await
        .expect("op failures never fail the run");

    let core = &snapshot.core;
    assert_eq!(core.total, 500);
    assert_eq!(core.failed, 500);
    assert_eq!(core.errors.get("protocol"), Some(&500));
    assert_eq!(adapter.executed(), 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn echo_round_trip_returns_payload_bytes() {
    let adapter = Arc::new(MockAdapter::new().with_behavior(MockBehavior::Echo));
    let mut config = workload(100, 4);
    config.data_size = 32;
    let factory = Arc::new(FixedOpFactory::new("echo", false, &config));

    let snapshot = Runner::new()
        .run(CancellationToken::new(), adapter, &config, factory)
        .await
        .expect("run succeeds");
    assert_eq!(snapshot.core.success, 100);
}
