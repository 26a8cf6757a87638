#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for datasource log records.
///
/// Use this target for records emitted through a datasource context logger.
pub const TRACING_TARGET_DATASOURCE: &str = "conduit_core::datasource";

/// Tracing target for execution policy operations.
///
/// Use this target for logging retry and timeout decisions.
pub const TRACING_TARGET_POLICY: &str = "conduit_core::policy";

/// Tracing target for subscription loops.
///
/// Use this target for logging message dispatch and handler failures.
pub const TRACING_TARGET_SUBSCRIPTION: &str = "conduit_core::subscription";

pub mod context;
pub mod datasource;
mod error;
mod logger;
pub mod policy;
pub mod prelude;
mod subscription;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

pub use error::{BoxedError, Error, Result};
pub use logger::{LogLevel, LogRecord, Logger, TracingLogger};
pub use subscription::{Subscription, SubscriptionGroup};
