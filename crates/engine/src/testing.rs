// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Scripted adapters for engine and binary tests.
//!
//! Not gated behind `cfg(test)` so that integration tests and downstream
//! crates can drive the runner without a live target.

use crate::adapter::ProtocolAdapter;
use crate::error::{Error, ErrorKind};
use crate::op::{Operation, OperationResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// What a [`MockAdapter`] does with each operation.
#[derive(Debug, Clone, Copy)]
pub enum MockBehavior {
    /// Sleep for the configured delay, then succeed.
    Succeed,
    /// Sleep for the configured delay, then fail with the given kind.
    Fail(ErrorKind),
    /// Sleep for the configured delay, then echo the payload back.
    Echo,
}

/// An in-memory adapter with scripted latency and outcomes.
pub struct MockAdapter {
    delay: Duration,
    behavior: MockBehavior,
    fail_connect: bool,
    executed: AtomicU64,
    connects: AtomicU64,
    closes: AtomicU64,
}

impl Default for MockAdapter {
    fn default() -> Self {
        MockAdapter::new()
    }
}

impl MockAdapter {
    /// An instantaneous, always-succeeding adapter.
    #[must_use]
    pub fn new() -> Self {
        MockAdapter {
            delay: Duration::ZERO,
            behavior: MockBehavior::Succeed,
            fail_connect: false,
            executed: AtomicU64::new(0),
            connects: AtomicU64::new(0),
            closes: AtomicU64::new(0),
        }
    }

    /// Sets the per-operation service time.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the per-operation behavior.
    #[must_use]
    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Makes `connect` fail, so runs abort before recording anything.
    #[must_use]
    pub fn with_connect_failure(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Number of operations executed so far.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Number of times `close` was called.
    #[must_use]
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProtocolAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self) -> Result<(), Error> {
        let _ = self.connects.fetch_add(1, Ordering::Relaxed);
        if self.fail_connect {
            return Err(Error::ConnectFailed {
                protocol: "mock".to_owned(),
                details: "scripted connect failure".to_owned(),
            });
        }
        Ok(())
    }

    async fn execute(&self, op: Operation) -> OperationResult {
        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let _ = self.executed.fetch_add(1, Ordering::Relaxed);
        let is_read = op.is_read_hint();
        match self.behavior {
            MockBehavior::Succeed => OperationResult::success(is_read, started.elapsed()),
            MockBehavior::Fail(kind) => OperationResult::failure(kind, "scripted failure")
                .with_read(is_read)
                .with_duration(started.elapsed()),
            MockBehavior::Echo => {
                let mut result = OperationResult::success(is_read, started.elapsed());
                if let Some(value) = op.value {
                    result = result.with_value(value);
                }
                result
            }
        }
    }

    async fn close(&self) -> Result<(), Error> {
        let _ = self.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn protocol_metrics(&self) -> HashMap<String, serde_json::Value> {
        let mut metrics = HashMap::new();
        let _ = metrics.insert(
            "operations_executed".to_owned(),
            serde_json::json!(self.executed.load(Ordering::Relaxed)),
        );
        metrics
    }
}
