// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the execution engine.
//!
//! Two layers live here. [`Error`] is what aborts or fails a run: connect
//! and configuration problems, raised before any metric is recorded.
//! [`ErrorKind`] classifies per-operation failures; those are counted by the
//! collector and never abort the run.

use std::fmt;

/// High-level classification of an operation failure.
///
/// The kind drives accounting only: the engine counts failures per kind and
/// reports the distribution, it never interprets the failure beyond that.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Failure to establish a connection. Fatal before the run; recorded as
    /// a plain failure when a pooled connection drops mid-run.
    Connect,
    /// Invalid configuration, detected before the run starts.
    Config,
    /// The per-operation deadline elapsed before the adapter returned.
    Timeout,
    /// The adapter reported an operation-level protocol failure.
    Protocol,
    /// The run context was cancelled while the operation was in flight.
    Canceled,
    /// Bug-class failure inside the engine or an adapter.
    Internal,
}

impl ErrorKind {
    /// Every kind, in reporting order.
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Connect,
        ErrorKind::Config,
        ErrorKind::Timeout,
        ErrorKind::Protocol,
        ErrorKind::Canceled,
        ErrorKind::Internal,
    ];

    /// Position of this kind within [`ErrorKind::ALL`].
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            ErrorKind::Connect => 0,
            ErrorKind::Config => 1,
            ErrorKind::Timeout => 2,
            ErrorKind::Protocol => 3,
            ErrorKind::Canceled => 4,
            ErrorKind::Internal => 5,
        }
    }

    /// Stable lowercase label used in reports and metric keys.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Connect => "connect",
            ErrorKind::Config => "config",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Canceled => "canceled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors that abort a run before or during orchestration.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The adapter could not establish its initial connection. The run
    /// aborts before any metric is recorded.
    #[error("Failed to connect to {protocol} target: {details}")]
    ConnectFailed {
        /// Name of the protocol adapter that failed to connect.
        protocol: String,
        /// A description of the underlying failure.
        details: String,
    },

    /// The workload or engine configuration is invalid.
    #[error("Invalid workload configuration: {details}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        details: String,
    },

    /// Bug-class failure inside the engine itself.
    #[error("Internal engine error: {details}")]
    Internal {
        /// A description of the failure.
        details: String,
    },
}

impl Error {
    /// The classification of this run-level error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConnectFailed { .. } => ErrorKind::Connect,
            Error::InvalidConfig { .. } => ErrorKind::Config,
            Error::Internal { .. } => ErrorKind::Internal,
        }
    }
}

impl From<blitz_config::Error> for Error {
    fn from(err: blitz_config::Error) -> Self {
        Error::InvalidConfig {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
        assert_eq!(ErrorKind::Canceled.label(), "canceled");
        assert_eq!(ErrorKind::Protocol.label(), "protocol");
    }

    #[test]
    fn run_error_kinds() {
        let err = Error::ConnectFailed {
            protocol: "redis".to_owned(),
            details: "connection refused".to_owned(),
        };
        assert_eq!(err.kind(), ErrorKind::Connect);
    }
}
