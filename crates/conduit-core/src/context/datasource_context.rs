//! Base context shared by every datasource.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{Error, LogLevel, LogRecord, Logger, Result, TracingLogger};

/// Default number of attempts made by `run_with_retry`.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default base backoff between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Default ceiling for the backoff between attempts.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Default deadline applied by `run_with_timeout`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Deployment environment a datasource runs in.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Test,
    Prod,
}

impl Environment {
    /// Returns whether this is the production environment.
    #[inline]
    pub fn is_prod(self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// Retry-with-exponential-backoff policy.
///
/// The delay before retry `i + 1` (0-indexed attempt `i`) is
/// `min(delay * 2^i, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts.
    pub retries: u32,
    /// Base backoff duration.
    pub delay: Duration,
    /// Upper bound for any single backoff.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
            max_delay: DEFAULT_RETRY_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(retries: u32, delay: Duration, max_delay: Duration) -> Self {
        Self {
            retries,
            delay,
            max_delay,
        }
    }

    /// Create a policy that makes a single attempt.
    pub fn single_attempt() -> Self {
        Self {
            retries: 1,
            ..Self::default()
        }
    }

    /// Set the number of attempts.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the base backoff.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the backoff ceiling.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Returns the backoff to wait after the failed attempt with the given index.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.max_delay)
    }

    /// Validate the policy.
    pub fn validate(&self) -> Result<()> {
        if self.delay > self.max_delay {
            return Err(Error::invalid_config(format!(
                "retry delay {:?} exceeds max delay {:?}",
                self.delay, self.max_delay
            )));
        }
        Ok(())
    }
}

/// Configuration injected into every datasource at construction.
///
/// The context is immutable: the builder methods consume it, and the owning
/// datasource replaces it wholesale through `set_context`.
#[derive(Debug, Clone)]
pub struct DatasourceContext {
    name: String,
    logger: Arc<dyn Logger>,
    request_id: Option<String>,
    retry_policy: Option<RetryPolicy>,
    timeout: Option<Duration>,
    environment: Environment,
}

impl DatasourceContext {
    /// Create a new context with the given datasource name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logger: Arc::new(TracingLogger),
            request_id: None,
            retry_policy: None,
            timeout: None,
            environment: Environment::default(),
        }
    }

    /// Set the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Set a logger shared with other components.
    #[must_use]
    pub fn with_shared_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Set the request correlation id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    /// Set the operation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the deployment environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Returns the datasource name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the logger.
    #[inline]
    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// Returns the request correlation id.
    #[inline]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Returns the configured retry policy.
    #[inline]
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    /// Returns the configured retry policy or the defaults.
    #[inline]
    pub fn effective_retry_policy(&self) -> RetryPolicy {
        self.retry_policy.unwrap_or_default()
    }

    /// Returns the configured timeout.
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the configured timeout or the default.
    #[inline]
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Returns the deployment environment.
    #[inline]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Validate the context.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_config("datasource name cannot be empty"));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::invalid_config("timeout must be greater than zero"));
        }
        if let Some(policy) = &self.retry_policy {
            policy.validate()?;
        }
        Ok(())
    }

    /// Emits a record through the context logger.
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.logger.log(&LogRecord {
            level,
            datasource: &self.name,
            request_id: self.request_id.as_deref(),
            environment: self.environment,
            message: message.as_ref(),
        });
    }

    /// Emits a debug record.
    #[inline]
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    /// Emits an info record.
    #[inline]
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    /// Emits a warning record.
    #[inline]
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message);
    }

    /// Emits an error record.
    #[inline]
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }
}

impl AsRef<DatasourceContext> for DatasourceContext {
    fn as_ref(&self) -> &DatasourceContext {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 3);
        assert_eq!(policy.delay, Duration::from_millis(1000));
        assert_eq!(policy.max_delay, Duration::from_millis(30_000));
    }

    #[test]
    fn test_backoff_doubles_until_ceiling() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(2000));

        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(1600));
        assert_eq!(policy.backoff(5), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(64, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(policy.backoff(40), Duration::from_secs(30));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_policy_validation() {
        let ok = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(100));
        assert!(ok.validate().is_ok());

        let inverted = RetryPolicy::new(3, Duration::from_secs(5), Duration::from_secs(1));
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_context_defaults() {
        let ctx = DatasourceContext::new("auth-cache");
        assert_eq!(ctx.name(), "auth-cache");
        assert_eq!(ctx.request_id(), None);
        assert_eq!(ctx.retry_policy(), None);
        assert_eq!(ctx.effective_retry_policy(), RetryPolicy::default());
        assert_eq!(ctx.effective_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(ctx.environment(), Environment::Dev);
    }

    #[test]
    fn test_context_builder() {
        let policy = RetryPolicy::new(5, Duration::from_millis(50), Duration::from_secs(1));
        let ctx = DatasourceContext::new("users-db")
            .with_request_id("req-1")
            .with_retry_policy(policy)
            .with_timeout(Duration::from_secs(2))
            .with_environment(Environment::Prod);

        assert_eq!(ctx.request_id(), Some("req-1"));
        assert_eq!(ctx.retry_policy(), Some(&policy));
        assert_eq!(ctx.effective_timeout(), Duration::from_secs(2));
        assert!(ctx.environment().is_prod());
    }

    #[test]
    fn test_context_validation() {
        assert!(DatasourceContext::new("ok").validate().is_ok());
        assert!(DatasourceContext::new("  ").validate().is_err());
        assert!(
            DatasourceContext::new("zero")
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::from_str("prod").ok(), Some(Environment::Prod));
        assert_eq!(Environment::Test.to_string(), "test");
        assert!(Environment::from_str("staging").is_err());
    }
}
