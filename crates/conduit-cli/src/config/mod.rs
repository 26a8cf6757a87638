//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── service: ServiceConfig    # Name, environment, retry and timeout policy
//! ├── cache: CacheConfig        # Redis (optional)
//! ├── events: EventConfig       # NATS (optional)
//! ├── database: DatabaseConfig  # PostgreSQL (optional)
//! └── rest: RestConfig          # HTTP API (optional)
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.

mod datasource;
mod service;

use std::process;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
pub use datasource::{CacheConfig, DatabaseConfig, EventConfig, RestConfig};
use serde::{Deserialize, Serialize};
pub use service::ServiceConfig;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "conduit")]
#[command(about = "Connects configured datasources and reports their health")]
#[command(version)]
pub struct Cli {
    /// Service identity and execution policy.
    #[clap(flatten)]
    pub service: ServiceConfig,

    /// Redis cache configuration.
    #[clap(flatten)]
    pub cache: CacheConfig,

    /// NATS broker configuration.
    #[clap(flatten)]
    pub events: EventConfig,

    /// PostgreSQL configuration.
    #[clap(flatten)]
    pub database: DatabaseConfig,

    /// HTTP API configuration.
    #[clap(flatten)]
    pub rest: RestConfig,

    /// Re-probe every N seconds until interrupted instead of exiting.
    #[arg(long, env = "WATCH_SECS")]
    pub watch: Option<u64>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    #[serde(default)]
    pub log_json: bool,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments, so its values act
    /// as environment defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Returns the probe interval when running in watch mode.
    pub fn watch_interval(&self) -> Option<Duration> {
        self.watch.map(Duration::from_secs)
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.service
            .validate()
            .context("invalid service configuration")?;
        if self.watch == Some(0) {
            anyhow::bail!("watch interval must be at least one second");
        }
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        self.service.log();
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            cache = self.cache.redis_host.is_some(),
            events = self.events.nats_servers.is_some(),
            database = self.database.database_url.is_some(),
            rest = self.rest.rest_base_url.is_some(),
            watch_secs = ?self.watch,
            "Configured datasources"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_groups() {
        let cli = Cli::try_parse_from([
            "conduit",
            "--service-name",
            "billing",
            "--redis-host",
            "127.0.0.1",
            "--rest-base-url",
            "https://api.internal",
            "--rest-headers",
            "x-a=1,x-b=2",
            "--watch",
            "15",
        ])
        .unwrap();

        assert_eq!(cli.service.service_name, "billing");
        assert_eq!(cli.cache.redis_host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.cache.redis_port, 6379);
        assert_eq!(cli.rest.rest_headers, vec!["x-a=1", "x-b=2"]);
        assert_eq!(cli.watch_interval(), Some(Duration::from_secs(15)));
        cli.validate().unwrap();
    }

    #[test]
    fn test_zero_watch_interval_is_rejected() {
        let cli = Cli::try_parse_from(["conduit", "--watch", "0"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
