// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! JSON artifact: the canonical machine-readable report, mirroring the
//! snapshot structure field for field.

use blitz_engine::{MetricsSnapshot, ReportError, ReportGenerator};
use std::path::PathBuf;

/// Writes the snapshot as pretty-printed JSON.
pub struct JsonReport {
    path: PathBuf,
}

impl JsonReport {
    /// A JSON report targeting the given path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        JsonReport { path }
    }
}

impl ReportGenerator for JsonReport {
    fn generate(&self, snapshot: &MetricsSnapshot) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| ReportError::new(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        tracing::info!(path = %self.path.display(), "json report written");
        Ok(())
    }
}
