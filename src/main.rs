// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! blitz: multi-protocol load generator and benchmark harness.
//!
//! Exit codes: `0` the benchmark ran (even with zero successful
//! operations), `1` invalid configuration or connect failure, `2`
//! cancelled, `3` fatal runtime error.

mod cli;

use blitz_config::{CoreSettings, LoggingSettings};
use blitz_engine::{ErrorKind, ReportGenerator, Runner};
use blitz_report::ReportSet;
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const EXIT_CONFIG: u8 = 1;
const EXIT_CANCELED: u8 = 2;
const EXIT_FATAL: u8 = 3;

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match &logging.file {
        Some(path) => match std::fs::File::create(path) {
            Ok(file) => builder.with_writer(std::sync::Mutex::new(file)).init(),
            Err(_) => builder.with_writer(std::io::stderr).init(),
        },
        None => builder.with_writer(std::io::stderr).init(),
    }
}

/// First Ctrl-C cancels the run token and lets the engine drain; a second
/// one aborts the process.
fn install_signal_handler(token: CancellationToken) {
    let _handler = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("cancellation requested; draining workers (Ctrl-C again to abort)");
        token.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(i32::from(EXIT_CANCELED));
        }
    });
}

#[allow(clippy::print_stderr)]
#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let core = match &cli.core_config {
        Some(path) => CoreSettings::from_yaml_file(path),
        None => Ok(CoreSettings::default()),
    };
    let core = match core {
        Ok(core) => core,
        Err(err) => {
            // Logging is not up yet; stderr is the only channel.
            eprintln!("blitz: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    init_tracing(&core.logging);

    let plan = match cli::build_plan(&cli.protocol) {
        Ok(plan) => plan,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let token = CancellationToken::new();
    install_signal_handler(token.clone());

    let runner = Runner::from_settings(&core);
    let snapshot = match runner
        .run(token.clone(), plan.adapter, &plan.workload, plan.factory)
        .await
    {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::error!(%err, "run aborted");
            return match err.kind() {
                ErrorKind::Connect | ErrorKind::Config => ExitCode::from(EXIT_CONFIG),
                _ => ExitCode::from(EXIT_FATAL),
            };
        }
    };

    if let Err(err) = ReportSet::from_settings(&core.report).generate(&snapshot) {
        tracing::warn!(%err, "report generation failed");
    }

    if token.is_cancelled() {
        ExitCode::from(EXIT_CANCELED)
    } else {
        ExitCode::SUCCESS
    }
}
