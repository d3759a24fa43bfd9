// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! The report seam: the engine produces snapshots, report generators
//! consume them. Format specifics live outside the engine.

use crate::snapshot::MetricsSnapshot;

/// A report generation failure. Reports are best-effort: the caller logs
/// these and keeps the run result.
#[derive(thiserror::Error, Debug)]
#[error("report generation failed: {details}")]
pub struct ReportError {
    /// A description of the failure.
    pub details: String,
}

impl ReportError {
    /// Creates a report error from any displayable cause.
    #[must_use]
    pub fn new(details: impl Into<String>) -> Self {
        ReportError {
            details: details.into(),
        }
    }
}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::new(err.to_string())
    }
}

/// Consumes a finished snapshot and renders it somewhere.
pub trait ReportGenerator: Send + Sync {
    /// Renders the snapshot. Implementations must not mutate shared state
    /// of the run; a snapshot is a closed value.
    fn generate(&self, snapshot: &MetricsSnapshot) -> Result<(), ReportError>;
}
