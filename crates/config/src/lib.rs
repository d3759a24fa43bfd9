// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration model for the blitz load generator.
//!
//! The configuration is split into two layers, each loaded from its own YAML
//! document and overridable from the command line:
//!
//! - the *core* layer ([`CoreSettings`]): logging, report destinations,
//!   system-monitor cadence and latency-sampling parameters, shared by every
//!   protocol;
//! - the *protocol* layer ([`ProtocolDocument`]): an opaque `connection`
//!   section interpreted by the selected protocol adapter, plus the
//!   `benchmark` section ([`WorkloadConfig`]) consumed by the execution
//!   engine.
//!
//! Both loaders validate on load: a document that parses but violates an
//! invariant (zero workers, a sampling rate outside `[0, 1]`, neither a total
//! nor a duration) is rejected before a run starts. Unknown top-level keys
//! are logged at WARN and otherwise ignored so that configuration files can
//! carry forward-compatible sections.

pub mod error;
mod settings;
mod workload;

pub use error::Error;
pub use settings::{
    CoreSettings, LatencySettings, LoggingSettings, MonitorSettings, ReportFormat, ReportSettings,
};
pub use workload::WorkloadConfig;

use serde::Deserialize;
use std::path::Path;

/// A protocol-layer configuration document.
///
/// The `connection` section is deliberately left opaque: each protocol
/// adapter owns its connection schema and deserializes this value itself.
/// The `benchmark` section is the workload definition handed to the engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProtocolDocument {
    /// Connection settings, interpreted by the selected protocol adapter.
    pub connection: serde_yaml::Value,
    /// Workload definition consumed by the execution engine.
    pub benchmark: WorkloadConfig,
}

impl ProtocolDocument {
    /// Top-level keys this document understands.
    const KNOWN_KEYS: &'static [&'static str] = &["connection", "benchmark"];

    /// Parses a protocol document from a YAML string and validates the
    /// embedded workload.
    pub fn from_yaml(yaml_str: &str) -> Result<Self, Error> {
        let value = parse_yaml(yaml_str, "protocol config")?;
        warn_unknown_keys(&value, Self::KNOWN_KEYS, "protocol config");
        let doc: ProtocolDocument =
            serde_yaml::from_value(value).map_err(|e| Error::Deserialization {
                context: "protocol config".to_owned(),
                details: e.to_string(),
            })?;
        doc.benchmark.validate()?;
        Ok(doc)
    }

    /// Loads a protocol document from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_yaml(&read_file(path.as_ref())?)
    }
}

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}

fn parse_yaml(yaml_str: &str, context: &str) -> Result<serde_yaml::Value, Error> {
    serde_yaml::from_str(yaml_str).map_err(|e| Error::Deserialization {
        context: context.to_owned(),
        details: e.to_string(),
    })
}

/// Logs a WARN for every top-level mapping key not present in `known`.
///
/// Unknown keys are accepted so that older binaries tolerate newer
/// configuration files.
fn warn_unknown_keys(value: &serde_yaml::Value, known: &[&str], context: &str) {
    let Some(mapping) = value.as_mapping() else {
        return;
    };
    for key in mapping.keys() {
        if let Some(key) = key.as_str() {
            if !known.contains(&key) {
                tracing::warn!(context, key, "ignoring unknown configuration key");
            }
        }
    }
}
