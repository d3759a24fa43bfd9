// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Report generators.
//!
//! The console summary is the default surface; structured artifacts
//! (JSON, CSV, text) are written under
//! `<output_dir>/<prefix>_<timestamp>.<ext>` when enabled. JSON is the
//! canonical format and mirrors [`MetricsSnapshot`] field for field; CSV
//! and text are renderings of the same snapshot.

mod console;
mod csv_file;
mod json_file;
mod text;

pub use console::ConsoleReport;
pub use csv_file::CsvReport;
pub use json_file::JsonReport;
pub use text::{TextReport, render_text};

use blitz_config::{ReportFormat, ReportSettings};
use blitz_engine::{MetricsSnapshot, ReportError, ReportGenerator};
use std::path::PathBuf;

/// The report fan-out configured for a run: the console summary plus any
/// enabled structured artifacts, all fed from the same snapshot.
pub struct ReportSet {
    settings: ReportSettings,
}

impl ReportSet {
    /// Builds the fan-out from the core report settings.
    #[must_use]
    pub fn from_settings(settings: &ReportSettings) -> Self {
        ReportSet {
            settings: settings.clone(),
        }
    }

    fn artifact_path(&self, stamp: &str, extension: &str) -> PathBuf {
        self.settings
            .output_dir
            .join(format!("{}_{stamp}.{extension}", self.settings.prefix))
    }
}

impl ReportGenerator for ReportSet {
    fn generate(&self, snapshot: &MetricsSnapshot) -> Result<(), ReportError> {
        if self.settings.console {
            ConsoleReport.generate(snapshot)?;
        }
        if self.settings.formats.is_empty() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.settings.output_dir)?;
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
        for format in &self.settings.formats {
            let result = match format {
                ReportFormat::Json => {
                    JsonReport::new(self.artifact_path(&stamp, "json")).generate(snapshot)
                }
                ReportFormat::Csv => {
                    CsvReport::new(self.artifact_path(&stamp, "csv")).generate(snapshot)
                }
                ReportFormat::Text => {
                    TextReport::new(self.artifact_path(&stamp, "txt")).generate(snapshot)
                }
            };
            // One broken artifact must not block the others.
            if let Err(err) = result {
                tracing::warn!(%err, ?format, "report artifact failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;
    use blitz_config::LatencySettings;
    use blitz_engine::{ErrorKind, MetricsCollector, OperationResult};
    use std::time::Duration;

    pub(crate) fn sample_snapshot() -> MetricsSnapshot {
        let collector = MetricsCollector::new(&LatencySettings::default());
        for i in 1..=100u64 {
            collector.record(&OperationResult::success(
                i % 4 == 0,
                Duration::from_micros(i * 10),
            ));
        }
        collector.record(
            &OperationResult::failure(ErrorKind::Timeout, "deadline elapsed")
                .with_duration(Duration::from_millis(5)),
        );
        collector.snapshot()
    }

    #[test]
    fn report_set_writes_every_enabled_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = ReportSettings {
            console: false,
            output_dir: dir.path().to_path_buf(),
            prefix: "bench".to_owned(),
            formats: vec![ReportFormat::Json, ReportFormat::Csv, ReportFormat::Text],
        };

        ReportSet::from_settings(&settings)
            .generate(&sample_snapshot())
            .expect("reports succeed");

        let mut extensions: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| {
                let name = entry.expect("entry").file_name();
                let name = name.to_string_lossy();
                assert!(name.starts_with("bench_"), "unexpected artifact {name}");
                name.rsplit('.').next().expect("extension").to_owned()
            })
            .collect();
        extensions.sort();
        assert_eq!(extensions, vec!["csv", "json", "txt"]);
    }

    #[test]
    fn empty_formats_write_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = ReportSettings {
            console: false,
            output_dir: dir.path().join("never-created"),
            prefix: "bench".to_owned(),
            formats: Vec::new(),
        };
        ReportSet::from_settings(&settings)
            .generate(&sample_snapshot())
            .expect("no-op succeeds");
        assert!(!settings.output_dir.exists());
    }
}
