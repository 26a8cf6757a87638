//! Service identity and execution policy configuration.

use std::time::Duration;

use anyhow::{Context, Result as AnyhowResult};
use clap::Args;
use conduit_core::context::{DatasourceContext, Environment, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Service identity plus the retry and timeout policy shared by every probed
/// datasource.
///
/// # Environment Variables
///
/// - `SERVICE_NAME` - Name used to label every datasource (default: conduit)
/// - `ENVIRONMENT` - One of dev, test, prod (default: dev)
/// - `RETRIES` - Total attempts per operation (default: 3)
/// - `RETRY_DELAY_MS` - Base backoff delay in milliseconds (default: 1000)
/// - `RETRY_MAX_DELAY_MS` - Backoff cap in milliseconds (default: 30000)
/// - `TIMEOUT_MS` - Per-attempt deadline in milliseconds (default: 5000)
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct ServiceConfig {
    /// Name of the service owning the datasources.
    #[arg(long, env = "SERVICE_NAME", default_value = "conduit")]
    pub service_name: String,

    /// Deployment environment.
    #[arg(long, env = "ENVIRONMENT", default_value = "dev")]
    pub environment: Environment,

    /// Total attempts per operation.
    #[arg(long, env = "RETRIES", default_value_t = 3)]
    pub retries: u32,

    /// Base delay between attempts, in milliseconds.
    #[arg(long, env = "RETRY_DELAY_MS", default_value_t = 1000)]
    pub retry_delay_ms: u64,

    /// Upper bound for the delay between attempts, in milliseconds.
    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value_t = 30_000)]
    pub retry_max_delay_ms: u64,

    /// Deadline for a single attempt, in milliseconds.
    #[arg(long, env = "TIMEOUT_MS", default_value_t = 5000)]
    pub timeout_ms: u64,
}

impl ServiceConfig {
    /// Returns the retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retries,
            Duration::from_millis(self.retry_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    /// Builds the base context of the datasource `kind`, tagged with `request_id`.
    pub fn base_context(&self, kind: &str, request_id: &str) -> DatasourceContext {
        DatasourceContext::new(format!("{}-{kind}", self.service_name))
            .with_environment(self.environment)
            .with_request_id(request_id)
            .with_retry_policy(self.retry_policy())
            .with_timeout(Duration::from_millis(self.timeout_ms))
    }

    /// Validates the identity and execution policy.
    pub fn validate(&self) -> AnyhowResult<()> {
        self.base_context("probe", "validate")
            .validate()
            .context("invalid execution policy")
    }

    /// Logs the configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            service_name = %self.service_name,
            environment = %self.environment,
            retries = self.retries,
            retry_delay_ms = self.retry_delay_ms,
            retry_max_delay_ms = self.retry_max_delay_ms,
            timeout_ms = self.timeout_ms,
            "Service configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServiceConfig {
        ServiceConfig {
            service_name: "billing".to_owned(),
            environment: Environment::Prod,
            retries: 4,
            retry_delay_ms: 100,
            retry_max_delay_ms: 2000,
            timeout_ms: 750,
        }
    }

    #[test]
    fn test_base_context_carries_policy() {
        let context = config().base_context("cache", "req-1");

        assert_eq!(context.name(), "billing-cache");
        assert_eq!(context.environment(), Environment::Prod);
        assert_eq!(context.request_id(), Some("req-1"));
        assert_eq!(context.effective_timeout(), Duration::from_millis(750));
        assert_eq!(context.effective_retry_policy().backoff(1), Duration::from_millis(200));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        config().validate().unwrap();
    }
}
