// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Console summary, printed after every run.

// The console reporter is the one place that legitimately writes to stdout.
#![allow(clippy::print_stdout)]

use crate::text::render_text;
use blitz_engine::{MetricsSnapshot, ReportError, ReportGenerator};

/// Prints the text rendering to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReport;

impl ReportGenerator for ConsoleReport {
    fn generate(&self, snapshot: &MetricsSnapshot) -> Result<(), ReportError> {
        println!("{}", render_text(snapshot));
        Ok(())
    }
}
