// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Plain-text rendering of a snapshot, shared by the console summary and
//! the `.txt` artifact.

use blitz_engine::{MetricsSnapshot, ReportError, ReportGenerator};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

fn ms(duration: Duration) -> String {
    format!("{:.3}ms", duration.as_secs_f64() * 1_000.0)
}

/// Renders the snapshot as the human-readable summary.
#[must_use]
pub fn render_text(snapshot: &MetricsSnapshot) -> String {
    let core = &snapshot.core;
    let mut out = String::new();

    let _ = writeln!(out, "========== benchmark result ==========");
    let _ = writeln!(out, "total:         {}", core.total);
    let _ = writeln!(
        out,
        "success:       {} ({:.2}%)",
        core.success, core.success_rate
    );
    let _ = writeln!(out, "failed:        {}", core.failed);
    let _ = writeln!(out, "reads/writes:  {} / {}", core.read, core.write);
    let _ = writeln!(out, "elapsed:       {:.3}s", core.elapsed.as_secs_f64());
    let _ = writeln!(out, "throughput:    {:.1} ops/s", core.rps);
    let _ = writeln!(
        out,
        "latency:       avg {} | min {} | max {}",
        ms(core.avg_latency),
        ms(core.min_latency),
        ms(core.max_latency)
    );
    let _ = writeln!(
        out,
        "percentiles:   p50 {} | p90 {} | p95 {} | p99 {}",
        ms(core.p50_latency),
        ms(core.p90_latency),
        ms(core.p95_latency),
        ms(core.p99_latency)
    );
    let _ = writeln!(
        out,
        "samples:       {} (sampling rate {:.2})",
        core.latency_samples, core.latency_sample_rate
    );

    if !core.errors.is_empty() {
        let _ = writeln!(out, "errors:");
        for (kind, count) in &core.errors {
            let _ = writeln!(out, "  {kind}: {count}");
        }
    }

    if let Some(system) = &snapshot.system {
        let _ = writeln!(
            out,
            "system:        rss {:.1} MiB | cpu {:.1}% | workers {}",
            system.memory_bytes as f64 / (1024.0 * 1024.0),
            system.cpu_percent,
            system.active_workers
        );
    }

    if !snapshot.protocol.is_empty() {
        let _ = writeln!(out, "protocol:");
        let mut keys: Vec<&String> = snapshot.protocol.keys().collect();
        keys.sort();
        for key in keys {
            let _ = writeln!(out, "  {key}: {}", snapshot.protocol[key]);
        }
    }

    if !snapshot.health_issues.is_empty() {
        let _ = writeln!(out, "health issues:");
        for issue in &snapshot.health_issues {
            let _ = writeln!(out, "  [{}] {}", issue.subject, issue.message);
        }
    }

    let _ = writeln!(out, "window:        {} .. {}", core.start_time, core.end_time);
    out
}

/// Writes the text rendering to a file.
pub struct TextReport {
    path: PathBuf,
}

impl TextReport {
    /// A text report targeting the given path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        TextReport { path }
    }
}

impl ReportGenerator for TextReport {
    fn generate(&self, snapshot: &MetricsSnapshot) -> Result<(), ReportError> {
        std::fs::write(&self.path, render_text(snapshot))?;
        tracing::info!(path = %self.path.display(), "text report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;
    use crate::tests::sample_snapshot;

    #[test]
    fn rendering_contains_counts_and_errors() {
        let text = render_text(&sample_snapshot());
        assert!(text.contains("total:         101"));
        assert!(text.contains("failed:        1"));
        assert!(text.contains("timeout: 1"));
        assert!(text.contains("percentiles:"));
    }

    #[test]
    fn file_artifact_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.txt");
        TextReport::new(path.clone())
            .generate(&sample_snapshot())
            .expect("write");
        let written = std::fs::read_to_string(path).expect("read back");
        assert!(written.contains("benchmark result"));
    }
}
