//! Logger capability handed to datasources through their context.
//!
//! Datasources never talk to a logging sink directly. Every record goes
//! through the [`Logger`] stored in the [`DatasourceContext`], which defaults
//! to [`TracingLogger`].
//!
//! [`DatasourceContext`]: crate::context::DatasourceContext

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::TRACING_TARGET_DATASOURCE;
use crate::context::Environment;

/// Severity of a [`LogRecord`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A single log record emitted by a datasource.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    /// Severity of the record.
    pub level: LogLevel,
    /// Name of the datasource emitting the record.
    pub datasource: &'a str,
    /// Correlation id of the request being served, if any.
    pub request_id: Option<&'a str>,
    /// Deployment environment of the datasource.
    pub environment: Environment,
    /// Human readable message.
    pub message: &'a str,
}

/// Sink for datasource log records.
///
/// Implementations must be cheap to call and must never panic.
pub trait Logger: fmt::Debug + Send + Sync {
    /// Emits a single record.
    fn log(&self, record: &LogRecord<'_>);
}

/// Default [`Logger`] that forwards records to [`tracing`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        let request_id = record.request_id.unwrap_or_default();
        let environment: &'static str = record.environment.into();

        match record.level {
            LogLevel::Debug => tracing::debug!(
                target: TRACING_TARGET_DATASOURCE,
                datasource = record.datasource,
                request_id,
                environment,
                "{}",
                record.message
            ),
            LogLevel::Info => tracing::info!(
                target: TRACING_TARGET_DATASOURCE,
                datasource = record.datasource,
                request_id,
                environment,
                "{}",
                record.message
            ),
            LogLevel::Warn => tracing::warn!(
                target: TRACING_TARGET_DATASOURCE,
                datasource = record.datasource,
                request_id,
                environment,
                "{}",
                record.message
            ),
            LogLevel::Error => tracing::error!(
                target: TRACING_TARGET_DATASOURCE,
                datasource = record.datasource,
                request_id,
                environment,
                "{}",
                record.message
            ),
        }
    }
}
