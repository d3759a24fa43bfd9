// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! CSV artifact: one header row plus one data row of the core statistics,
//! for spreadsheet-friendly run-over-run comparison.

use blitz_engine::{MetricsSnapshot, ReportError, ReportGenerator};
use std::path::PathBuf;
use std::time::Duration;

/// Writes the core statistics as a single-row CSV.
pub struct CsvReport {
    path: PathBuf,
}

impl CsvReport {
    /// A CSV report targeting the given path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        CsvReport { path }
    }
}

fn ms(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64() * 1_000.0)
}

impl ReportGenerator for CsvReport {
    fn generate(&self, snapshot: &MetricsSnapshot) -> Result<(), ReportError> {
        let core = &snapshot.core;
        let mut writer =
            csv::Writer::from_path(&self.path).map_err(|e| ReportError::new(e.to_string()))?;

        writer
            .write_record([
                "total",
                "success",
                "failed",
                "read",
                "write",
                "success_rate",
                "avg_latency_ms",
                "min_latency_ms",
                "max_latency_ms",
                "p50_latency_ms",
                "p90_latency_ms",
                "p95_latency_ms",
                "p99_latency_ms",
                "rps",
                "elapsed_ms",
                "start_time",
                "end_time",
                "latency_samples",
                "latency_sample_rate",
                "errors",
            ])
            .map_err(|e| ReportError::new(e.to_string()))?;

        let errors = core
            .errors
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect::<Vec<_>>()
            .join(";");

        writer
            .write_record([
                core.total.to_string(),
                core.success.to_string(),
                core.failed.to_string(),
                core.read.to_string(),
                core.write.to_string(),
                format!("{:.2}", core.success_rate),
                ms(core.avg_latency),
                ms(core.min_latency),
                ms(core.max_latency),
                ms(core.p50_latency),
                ms(core.p90_latency),
                ms(core.p95_latency),
                ms(core.p99_latency),
                format!("{:.1}", core.rps),
                ms(core.elapsed),
                core.start_time.to_rfc3339(),
                core.end_time.to_rfc3339(),
                core.latency_samples.to_string(),
                core.latency_sample_rate.to_string(),
                errors,
            ])
            .map_err(|e| ReportError::new(e.to_string()))?;

        writer.flush()?;
        tracing::info!(path = %self.path.display(), "csv report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;
    use crate::tests::sample_snapshot;

    #[test]
    fn artifact_has_header_and_one_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.csv");
        CsvReport::new(path.clone())
            .generate(&sample_snapshot())
            .expect("write");

        let written = std::fs::read_to_string(path).expect("read back");
        let lines: Vec<&str> = written.trim_end().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("total,success,failed"));
        assert!(lines[1].starts_with("101,100,1"));
        assert!(lines[1].contains("timeout=1"));
    }
}
