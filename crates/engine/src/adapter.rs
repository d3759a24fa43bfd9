// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! The narrow contract between the engine and a protocol implementation.

use crate::error::Error;
use crate::op::{Operation, OperationResult};
use async_trait::async_trait;
use std::collections::HashMap;

/// A protocol adapter performs one operation against one target.
///
/// The engine calls [`connect`](ProtocolAdapter::connect) once before the
/// run and [`close`](ProtocolAdapter::close) once after; a connect failure
/// aborts the run before any metric is recorded. During the run every worker
/// calls [`execute`](ProtocolAdapter::execute) concurrently, so adapters own
/// whatever pooling or per-connection striping they need; the engine assumes
/// nothing beyond thread-safe `execute`.
///
/// `execute` reports the operation outcome in-band as an
/// [`OperationResult`] rather than an `Err`: an operation failure is a
/// measurement, not an engine fault. The result's duration should be the
/// adapter's best local measurement (request send to response decode) so
/// that job-queue wait is not counted.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// A short lowercase protocol name, e.g. `redis` or `kafka`. Used in
    /// logs and as the key of the snapshot's protocol-metrics layer.
    fn name(&self) -> &str;

    /// Establishes the initial connection(s) to the target.
    async fn connect(&self) -> Result<(), Error>;

    /// Performs one operation. Must be safe to call from all workers
    /// concurrently. The engine bounds each call with the per-operation
    /// timeout; an adapter observing its transport deadline first should
    /// return a `Timeout`-kind failure itself.
    async fn execute(&self, op: Operation) -> OperationResult;

    /// Releases connections and flushes any buffered work.
    async fn close(&self) -> Result<(), Error>;

    /// Cheap liveness probe against the target. Defaults to a no-op for
    /// protocols without a natural probe.
    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Adapter-specific counters merged into the final snapshot under the
    /// protocol layer. The engine never interprets these values.
    fn protocol_metrics(&self) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }
}
