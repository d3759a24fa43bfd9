// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Operation production: key generation, payload generation and the two
//! stock factory policies (fixed op, read/write mix).

use crate::op::Operation;
use blitz_config::WorkloadConfig;
use rand::RngExt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces the next operation for a job index.
///
/// Factories are shared by every worker and must be cheap and thread-safe;
/// the engine calls [`create`](OperationFactory::create) once per job on the
/// hot path.
pub trait OperationFactory: Send + Sync {
    /// Produces the operation for the given job index.
    fn create(&self, job_index: u64, config: &WorkloadConfig) -> Operation;
}

/// Key source shared by all workers. Keys are plain integers encoded as
/// text.
///
/// With a key universe of `0`, keys are a globally unique monotonically
/// increasing sequence. With a positive universe, keys are drawn uniformly
/// from `[0, universe)` so that re-reads and overwrites occur.
#[derive(Debug)]
pub struct KeyGenerator {
    universe: u64,
    next: AtomicU64,
}

/// Deterministic sentinel returned for a read when nothing has been written
/// yet. Measuring the miss path beats failing the op.
const SENTINEL_READ_KEY: &str = "r:0";

impl KeyGenerator {
    /// Creates a key generator over the given universe (`0` = monotone).
    #[must_use]
    pub fn new(universe: u64) -> Self {
        KeyGenerator {
            universe,
            next: AtomicU64::new(0),
        }
    }

    /// Returns a fresh key for a write operation.
    pub fn write_key(&self) -> String {
        if self.universe == 0 {
            self.next.fetch_add(1, Ordering::Relaxed).to_string()
        } else {
            rand::rng().random_range(0..self.universe).to_string()
        }
    }

    /// Returns a key for a read operation, preferring previously written
    /// keys and falling back to the sentinel when none exist.
    pub fn read_key(&self) -> String {
        if self.universe > 0 {
            return rand::rng().random_range(0..self.universe).to_string();
        }
        let written = self.next.load(Ordering::Relaxed);
        if written == 0 {
            SENTINEL_READ_KEY.to_owned()
        } else {
            rand::rng().random_range(0..written).to_string()
        }
    }
}

/// Fills a payload of `size` bytes with a repeating ASCII pattern, so that
/// echo-style adapters can verify round-trips byte for byte.
#[must_use]
pub fn payload(size: usize) -> Vec<u8> {
    const PATTERN: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    PATTERN.iter().copied().cycle().take(size).collect()
}

/// Every job produces the same operation type with a fresh key and payload.
#[derive(Debug)]
pub struct FixedOpFactory {
    op_type: String,
    is_read: bool,
    keys: KeyGenerator,
}

impl FixedOpFactory {
    /// Creates a fixed factory for the given operation type.
    #[must_use]
    pub fn new(op_type: impl Into<String>, is_read: bool, config: &WorkloadConfig) -> Self {
        FixedOpFactory {
            op_type: op_type.into(),
            is_read,
            keys: KeyGenerator::new(config.random_keys),
        }
    }
}

impl OperationFactory for FixedOpFactory {
    fn create(&self, _job_index: u64, config: &WorkloadConfig) -> Operation {
        let op = Operation::new(self.op_type.clone()).with_read_hint(self.is_read);
        if self.is_read {
            op.with_key(self.keys.read_key())
        } else {
            op.with_key(self.keys.write_key())
                .with_value(payload(config.data_size))
        }
    }
}

/// Bernoulli read/write mix with probability `read_percent / 100`.
///
/// Reads address a previously written key (or the sentinel); writes get a
/// fresh key and a payload.
#[derive(Debug)]
pub struct ReadWriteMixFactory {
    write_op: String,
    read_op: String,
    keys: KeyGenerator,
}

impl ReadWriteMixFactory {
    /// Creates a mix factory with the given write and read operation types.
    #[must_use]
    pub fn new(
        write_op: impl Into<String>,
        read_op: impl Into<String>,
        config: &WorkloadConfig,
    ) -> Self {
        ReadWriteMixFactory {
            write_op: write_op.into(),
            read_op: read_op.into(),
            keys: KeyGenerator::new(config.random_keys),
        }
    }
}

impl OperationFactory for ReadWriteMixFactory {
    fn create(&self, _job_index: u64, config: &WorkloadConfig) -> Operation {
        let is_read = rand::rng().random_range(0..100u8) < config.read_percent;
        if is_read {
            Operation::new(self.read_op.clone())
                .with_read_hint(true)
                .with_key(self.keys.read_key())
        } else {
            Operation::new(self.write_op.clone())
                .with_read_hint(false)
                .with_key(self.keys.write_key())
                .with_value(payload(config.data_size))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn workload(read_percent: u8, random_keys: u64) -> WorkloadConfig {
        WorkloadConfig {
            read_percent,
            random_keys,
            data_size: 16,
            ..WorkloadConfig::default()
        }
    }

    #[test]
    fn monotone_keys_are_globally_unique() {
        let keys = Arc::new(KeyGenerator::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let keys = keys.clone();
            handles.push(std::thread::spawn(move || {
                (0..1_000).map(|_| keys.write_key()).collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for key in handle.join().expect("worker thread") {
                assert!(seen.insert(key), "duplicate key produced");
            }
        }
        assert_eq!(seen.len(), 4_000);
    }

    #[test]
    fn random_keys_stay_in_universe() {
        let keys = KeyGenerator::new(10);
        for _ in 0..1_000 {
            let id: u64 = keys.write_key().parse().expect("numeric key");
            assert!(id < 10);
        }
    }

    #[test]
    fn keys_are_plain_integers_as_text() {
        let keys = KeyGenerator::new(0);
        assert_eq!(keys.write_key(), "0");
        assert_eq!(keys.write_key(), "1");
    }

    #[test]
    fn read_before_any_write_uses_sentinel() {
        let keys = KeyGenerator::new(0);
        assert_eq!(keys.read_key(), "r:0");
        let _ = keys.write_key();
        assert_eq!(keys.read_key(), "0");
    }

    #[test]
    fn payload_is_deterministic() {
        assert_eq!(payload(4), b"ABCD".to_vec());
        assert_eq!(payload(40).len(), 40);
        assert_eq!(payload(40), payload(40));
        assert!(payload(0).is_empty());
    }

    #[test]
    fn fixed_factory_writes_carry_payload() {
        let cfg = workload(0, 0);
        let factory = FixedOpFactory::new("set", false, &cfg);
        let op = factory.create(0, &cfg);
        assert_eq!(op.op_type, "set");
        assert!(!op.is_read_hint());
        assert_eq!(op.value.as_deref(), Some(payload(16).as_slice()));
    }

    #[test]
    fn mix_factory_ratio_is_close_to_configured() {
        let cfg = workload(30, 0);
        let factory = ReadWriteMixFactory::new("set", "get", &cfg);
        // Seed some writes so reads have keys to address.
        let reads = (0..10_000)
            .filter(|i| factory.create(*i, &cfg).is_read_hint())
            .count();
        let ratio = reads as f64 / 10_000.0;
        assert!(
            (ratio - 0.30).abs() <= 0.02,
            "read ratio {ratio} too far from 0.30"
        );
    }

    #[test]
    fn mix_factory_extremes() {
        let cfg = workload(0, 0);
        let factory = ReadWriteMixFactory::new("set", "get", &cfg);
        assert!((0..1_000).all(|i| !factory.create(i, &cfg).is_read_hint()));

        let cfg = workload(100, 0);
        let factory = ReadWriteMixFactory::new("set", "get", &cfg);
        assert!((0..1_000).all(|i| factory.create(i, &cfg).is_read_hint()));
    }
}
