#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod probe;
mod shutdown;
mod telemetry;

use std::io::Write;
use std::process;
use std::time::Duration;

use anyhow::Context;
use uuid::Uuid;

use crate::config::Cli;
use crate::probe::{Datasources, ProbeReport};
use crate::shutdown::stop_signal;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "conduit_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "conduit_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "conduit_cli::config";
pub const TRACING_TARGET_PROBE: &str = "conduit_cli::probe";

#[tokio::main]
async fn main() {
    let error = match run().await {
        Ok(true) => {
            tracing::info!(
                target: TRACING_TARGET_SHUTDOWN,
                "all datasources healthy"
            );
            process::exit(0);
        }
        Ok(false) => {
            tracing::warn!(
                target: TRACING_TARGET_SHUTDOWN,
                "one or more datasources unhealthy"
            );
            process::exit(1);
        }
        Err(error) => error,
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Probes every configured datasource and returns whether the last round was
/// healthy.
async fn run() -> anyhow::Result<bool> {
    let cli = Cli::init();

    telemetry::init_tracing(cli.log_json)?;
    cli.log();
    cli.validate()?;

    let request_id = Uuid::now_v7().to_string();
    let datasources = Datasources::from_cli(&cli, &request_id)?;
    if datasources.is_empty() {
        tracing::warn!(
            target: TRACING_TARGET_STARTUP,
            "no datasource configured, the report will be empty"
        );
    }

    let healthy = match cli.watch_interval() {
        None => {
            let report = datasources.probe().await;
            print_report(&report, true)?;
            report.is_healthy()
        }
        Some(period) => watch(&datasources, period).await?,
    };

    datasources.shutdown().await;
    Ok(healthy)
}

/// Re-probes on every tick until SIGINT or SIGTERM arrives.
async fn watch(datasources: &Datasources, period: Duration) -> anyhow::Result<bool> {
    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        period_secs = period.as_secs(),
        "watching datasources"
    );

    let mut interval = tokio::time::interval(period);
    let stop = stop_signal();
    tokio::pin!(stop);

    let mut healthy = true;
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = interval.tick() => {
                let report = tokio::select! {
                    _ = &mut stop => break,
                    report = datasources.probe() => report,
                };
                print_report(&report, false)?;
                healthy = report.is_healthy();
            }
        }
    }

    Ok(healthy)
}

/// Writes the report to stdout, pretty-printed or as a single JSON line.
fn print_report(report: &ProbeReport, pretty: bool) -> anyhow::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
    .context("failed to serialize report")?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").context("failed to write report")?;
    stdout.flush().context("failed to write report")
}
