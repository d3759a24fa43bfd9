// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Workload definition consumed by the execution engine.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TOTAL: u64 = 1_000;
const DEFAULT_PARALLELS: usize = 10;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READ_PERCENT: u8 = 50;
const DEFAULT_DATA_SIZE: usize = 64;

/// The shape of one benchmark run: how many operations, how many workers,
/// how long, and what the operation mix looks like.
///
/// A workload terminates on whichever bound fires first: `total` operations
/// produced, or `duration` elapsed. At least one of the two must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Total number of operations to execute. `0` means unbounded; the run
    /// is then limited by `duration`.
    pub total: u64,
    /// Number of concurrent workers driving the target.
    pub parallels: usize,
    /// Wall-clock bound for the run. `None` means unbounded; the run is then
    /// limited by `total`.
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
    /// Warmup window over which workers become eligible in a staggered
    /// fashion. Worker `i` is released at `start + i * ramp_up / parallels`.
    #[serde(with = "humantime_serde")]
    pub ramp_up: Option<Duration>,
    /// Per-operation deadline enforced by the engine.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Probability, in percent, that a produced operation is a read.
    pub read_percent: u8,
    /// Payload size in bytes for operations that carry a payload.
    pub data_size: usize,
    /// Size of the key universe for uniform random draws. `0` selects
    /// monotonically increasing keys instead.
    pub random_keys: u64,
    /// Selector for the operation mix understood by the protocol adapter.
    pub test_case: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            total: DEFAULT_TOTAL,
            parallels: DEFAULT_PARALLELS,
            duration: None,
            ramp_up: None,
            timeout: DEFAULT_TIMEOUT,
            read_percent: DEFAULT_READ_PERCENT,
            data_size: DEFAULT_DATA_SIZE,
            random_keys: 0,
            test_case: "default".to_owned(),
        }
    }
}

impl WorkloadConfig {
    /// Checks every invariant of the workload definition, collecting all
    /// violations instead of stopping at the first.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        if self.parallels == 0 {
            errors.push(Error::InvalidValue {
                field: "benchmark.parallels".to_owned(),
                details: "at least one worker is required".to_owned(),
            });
        }
        if self.read_percent > 100 {
            errors.push(Error::InvalidValue {
                field: "benchmark.read_percent".to_owned(),
                details: format!("must be within 0..=100, got {}", self.read_percent),
            });
        }
        if self.total == 0 && !self.duration.is_some_and(|d| !d.is_zero()) {
            errors.push(Error::InvalidValue {
                field: "benchmark.total".to_owned(),
                details: "either a positive total or a positive duration is required".to_owned(),
            });
        }
        if self.timeout.is_zero() {
            errors.push(Error::InvalidValue {
                field: "benchmark.timeout".to_owned(),
                details: "per-operation timeout must be positive".to_owned(),
            });
        }

        Error::from_validation(errors)
    }
}
