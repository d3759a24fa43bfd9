// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Workload execution and measurement engine.
//!
//! Given a [`ProtocolAdapter`] (which knows how to perform one operation
//! against one target), a [`WorkloadConfig`](blitz_config::WorkloadConfig)
//! and an [`OperationFactory`], the engine schedules work across a pool of
//! concurrent workers, measures each operation's latency and outcome, and
//! aggregates everything into an immutable [`MetricsSnapshot`] with bounded
//! memory.
//!
//! Data flow:
//!
//! ```text
//! OperationFactory -> job queue -> worker pool -> ProtocolAdapter::execute
//!     -> OperationResult -> MetricsCollector -> MetricsSnapshot -> reports
//! ```
//!
//! The [`Runner`] is the single orchestrator: it connects the adapter,
//! opens the collector, starts the system monitor, spawns exactly
//! `parallels` workers over a bounded job channel, and on every exit path
//! (normal completion, cancellation, fatal error) drains in-flight work,
//! stops the monitor and hands back the final snapshot.

pub mod adapter;
pub mod error;
pub mod factory;
pub mod latency;
pub mod metrics;
pub mod monitor;
pub mod op;
pub mod report;
pub mod runner;
pub mod snapshot;
pub mod testing;

pub use adapter::ProtocolAdapter;
pub use error::{Error, ErrorKind};
pub use factory::{FixedOpFactory, KeyGenerator, OperationFactory, ReadWriteMixFactory};
pub use metrics::MetricsCollector;
pub use monitor::SystemMonitor;
pub use op::{OpError, Operation, OperationResult};
pub use report::{ReportError, ReportGenerator};
pub use runner::Runner;
pub use snapshot::{CoreStats, HealthIssue, MetricsSnapshot, SystemStats};
