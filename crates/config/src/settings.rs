// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Core settings shared by every protocol: logging, report destinations,
//! system-monitor cadence and latency sampling.

use crate::error::Error;
use crate::{parse_yaml, read_file, warn_unknown_keys};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MONITOR_HISTORY: usize = 60;
const DEFAULT_MEMORY_THRESHOLD_PERCENT: f64 = 80.0;
const DEFAULT_LATENCY_CAPACITY: usize = 10_000;

/// Core configuration layer, shared across protocols.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    /// Logging configuration applied once at startup.
    pub logging: LoggingSettings,
    /// Report destinations and formats.
    pub report: ReportSettings,
    /// System-monitor sampling configuration.
    pub monitor: MonitorSettings,
    /// Latency-ring capacity and sampling rate.
    pub latency: LatencySettings,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter, e.g. `info` or `blitz_engine=debug`.
    pub level: String,
    /// Optional log file; stderr when absent.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: "info".to_owned(),
            file: None,
        }
    }
}

/// Structured report artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Canonical machine-readable artifact mirroring the snapshot.
    Json,
    /// Single-row CSV of the core statistics.
    Csv,
    /// Plain-text rendering of the console summary.
    Text,
}

/// Report destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Whether the console summary is printed. Always on by default.
    pub console: bool,
    /// Directory receiving structured report artifacts.
    pub output_dir: PathBuf,
    /// File-name prefix for report artifacts.
    pub prefix: String,
    /// Structured artifacts to write; empty means console only.
    pub formats: Vec<ReportFormat>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            console: true,
            output_dir: PathBuf::from("./reports"),
            prefix: "blitz".to_owned(),
            formats: Vec::new(),
        }
    }
}

/// System-monitor sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Interval between system samples.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Number of samples retained in the monitor's history ring.
    pub history: usize,
    /// Process-memory share of total memory, in percent, above which a
    /// health issue is recorded.
    pub memory_threshold_percent: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings {
            interval: DEFAULT_MONITOR_INTERVAL,
            history: DEFAULT_MONITOR_HISTORY,
            memory_threshold_percent: DEFAULT_MEMORY_THRESHOLD_PERCENT,
        }
    }
}

/// Latency-ring capacity and sampling rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencySettings {
    /// Fixed capacity of the latency sample ring.
    pub capacity: usize,
    /// Fraction of recorded operations whose latency is sampled, in `[0, 1]`.
    pub sample_rate: f64,
}

impl Default for LatencySettings {
    fn default() -> Self {
        LatencySettings {
            capacity: DEFAULT_LATENCY_CAPACITY,
            sample_rate: 1.0,
        }
    }
}

impl CoreSettings {
    /// Top-level keys this document understands.
    const KNOWN_KEYS: &'static [&'static str] = &["logging", "report", "monitor", "latency"];

    /// Parses core settings from a YAML string and validates them.
    pub fn from_yaml(yaml_str: &str) -> Result<Self, Error> {
        let value = parse_yaml(yaml_str, "core config")?;
        warn_unknown_keys(&value, Self::KNOWN_KEYS, "core config");
        let settings: CoreSettings =
            serde_yaml::from_value(value).map_err(|e| Error::Deserialization {
                context: "core config".to_owned(),
                details: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads core settings from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_yaml(&read_file(path.as_ref())?)
    }

    /// Checks every invariant of the core settings.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        if self.monitor.interval.is_zero() {
            errors.push(Error::InvalidValue {
                field: "monitor.interval".to_owned(),
                details: "sampling interval must be positive".to_owned(),
            });
        }
        if self.monitor.history == 0 {
            errors.push(Error::InvalidValue {
                field: "monitor.history".to_owned(),
                details: "history ring must hold at least one sample".to_owned(),
            });
        }
        if self.latency.capacity == 0 {
            errors.push(Error::InvalidValue {
                field: "latency.capacity".to_owned(),
                details: "latency ring must hold at least one sample".to_owned(),
            });
        }
        if !(0.0..=1.0).contains(&self.latency.sample_rate) {
            errors.push(Error::InvalidValue {
                field: "latency.sample_rate".to_owned(),
                details: format!("must be within [0, 1], got {}", self.latency.sample_rate),
            });
        }

        Error::from_validation(errors)
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let settings = CoreSettings::from_yaml("{}").expect("empty document uses defaults");
        assert_eq!(settings.monitor.interval, Duration::from_secs(1));
        assert_eq!(settings.monitor.history, 60);
        assert_eq!(settings.latency.capacity, 10_000);
        assert!(settings.report.console);
        assert!(settings.report.formats.is_empty());
    }

    #[test]
    fn full_document_parses() {
        let yaml = r#"
logging:
  level: debug
report:
  console: false
  output_dir: /tmp/blitz-reports
  prefix: bench
  formats: [json, csv, text]
monitor:
  interval: 250ms
  history: 120
  memory_threshold_percent: 90.0
latency:
  capacity: 50000
  sample_rate: 0.1
"#;
        let settings = CoreSettings::from_yaml(yaml).expect("valid");
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.monitor.interval, Duration::from_millis(250));
        assert_eq!(
            settings.report.formats,
            vec![ReportFormat::Json, ReportFormat::Csv, ReportFormat::Text]
        );
        assert_eq!(settings.latency.sample_rate, 0.1);
    }

    #[test]
    fn out_of_range_sample_rate_rejected() {
        let err = CoreSettings::from_yaml("latency:\n  sample_rate: 1.5\n")
            .expect_err("sample rate above 1 must fail");
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }
}
