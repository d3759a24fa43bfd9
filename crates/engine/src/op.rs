// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Operation and result value types exchanged between the factory, the
//! workers and the protocol adapters.

use crate::error::ErrorKind;
use std::collections::HashMap;
use std::time::Duration;

/// Metadata key under which the factory records its read/write
/// classification of an operation.
///
/// Workers fall back to this hint when they have to synthesize a result
/// themselves (timeout, cancellation) and the adapter never got to report
/// `is_read`.
pub const OP_KIND_KEY: &str = "op_kind";
/// Metadata value marking an operation as a read.
pub const OP_KIND_READ: &str = "read";
/// Metadata value marking an operation as a write.
pub const OP_KIND_WRITE: &str = "write";

/// One unit of work submitted to a protocol adapter.
///
/// Immutable once produced: the builder-style constructors consume and
/// return the value, and nothing mutates an operation after the factory
/// hands it over.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Name of the operation, e.g. `set`, `get`, `publish`, `packet_send`.
    pub op_type: String,
    /// Optional key the operation addresses.
    pub key: Option<String>,
    /// Optional opaque payload.
    pub value: Option<Vec<u8>>,
    /// Operation-specific parameters (TTL, partition, headers, ...).
    pub params: HashMap<String, serde_json::Value>,
    /// Free-form tags propagated into the result for downstream tagging.
    pub metadata: HashMap<String, String>,
}

impl Operation {
    /// Creates an operation of the given type with no key or payload.
    #[must_use]
    pub fn new(op_type: impl Into<String>) -> Self {
        Operation {
            op_type: op_type.into(),
            key: None,
            value: None,
            params: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// Sets the key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = Some(value);
        self
    }

    /// Adds an operation-specific parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        let _ = self.params.insert(name.into(), value);
        self
    }

    /// Adds a metadata tag.
    #[must_use]
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.metadata.insert(name.into(), value.into());
        self
    }

    /// Marks the operation as a read or a write via [`OP_KIND_KEY`].
    #[must_use]
    pub fn with_read_hint(self, is_read: bool) -> Self {
        let kind = if is_read { OP_KIND_READ } else { OP_KIND_WRITE };
        self.with_metadata(OP_KIND_KEY, kind)
    }

    /// Whether the factory classified this operation as a read.
    #[must_use]
    pub fn is_read_hint(&self) -> bool {
        self.metadata
            .get(OP_KIND_KEY)
            .is_some_and(|kind| kind == OP_KIND_READ)
    }
}

/// A failure descriptor attached to an unsuccessful operation result.
#[derive(Debug, Clone)]
pub struct OpError {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// The outcome of one executed operation, as reported by the adapter.
///
/// `duration` is the adapter's own measurement, taken as close to the wire
/// as practical so queue wait is excluded. When an adapter cannot measure
/// (or the worker synthesizes the result after a timeout), the worker fills
/// in its wall-clock fallback before recording.
#[derive(Debug, Clone)]
pub struct OperationResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Whether the operation counts as a read for split accounting.
    pub is_read: bool,
    /// Elapsed time measured by the adapter, if it measured one.
    pub duration: Option<Duration>,
    /// Optional payload returned by read operations. Opaque to the engine.
    pub value: Option<Vec<u8>>,
    /// Failure descriptor, present iff `success` is false.
    pub error: Option<OpError>,
    /// Adapter-provided tags merged into the snapshot's protocol layer.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl OperationResult {
    /// A successful result with an adapter-measured duration.
    #[must_use]
    pub fn success(is_read: bool, duration: Duration) -> Self {
        OperationResult {
            success: true,
            is_read,
            duration: Some(duration),
            value: None,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// A failed result with the given classification.
    #[must_use]
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        OperationResult {
            success: false,
            is_read: false,
            duration: None,
            value: None,
            error: Some(OpError {
                kind,
                message: message.into(),
            }),
            metadata: HashMap::new(),
        }
    }

    /// Sets the read classification.
    #[must_use]
    pub fn with_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    /// Sets the adapter-measured duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Attaches a returned payload.
    #[must_use]
    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = Some(value);
        self
    }

    /// Adds a metadata tag. The collector folds these into the snapshot's
    /// protocol layer, last write winning per key.
    #[must_use]
    pub fn with_metadata(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        let _ = self.metadata.insert(name.into(), value);
        self
    }

    /// Fills in the worker's wall-clock measurement when the adapter did not
    /// measure one. The adapter's measurement is authoritative.
    #[must_use]
    pub fn or_duration(mut self, fallback: Duration) -> Self {
        if self.duration.is_none() {
            self.duration = Some(fallback);
        }
        self
    }

    /// The classification of this result's failure, if it failed.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;

    #[test]
    fn read_hint_round_trips() {
        let op = Operation::new("get").with_key("1").with_read_hint(true);
        assert!(op.is_read_hint());
        let op = Operation::new("set").with_read_hint(false);
        assert!(!op.is_read_hint());
        assert!(!Operation::new("set").is_read_hint());
    }

    #[test]
    fn fallback_duration_never_overrides_adapter_measurement() {
        let measured = OperationResult::success(false, Duration::from_millis(3))
            .or_duration(Duration::from_millis(50));
        assert_eq!(measured.duration, Some(Duration::from_millis(3)));

        let synthesized = OperationResult::failure(ErrorKind::Protocol, "boom")
            .or_duration(Duration::from_millis(50));
        assert_eq!(synthesized.duration, Some(Duration::from_millis(50)));
    }

    #[test]
    fn failure_carries_kind() {
        let res = OperationResult::failure(ErrorKind::Timeout, "deadline elapsed");
        assert!(!res.success);
        assert_eq!(res.error_kind(), Some(ErrorKind::Timeout));
    }
}
