//! Error types shared by every datasource.

use std::time::Duration;

/// Type alias for boxed dynamic errors that can be sent across threads.
///
/// Used as the source of wrapped backend, driver and handler errors.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for all datasource operations.
///
/// This is a convenience type alias that defaults to using [`Error`] as the error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for datasource operations.
///
/// Every variant carries the name of the datasource that produced it so that
/// the embedding service can surface it without extra context.
#[derive(Debug, thiserror::Error)]
#[must_use = "datasource errors should be handled appropriately"]
pub enum Error {
    /// The context declares a backend variant this adapter does not implement.
    #[error("{datasource}: configuration mismatch, expected {expected} but got {actual}")]
    ConfigMismatch {
        datasource: String,
        expected: &'static str,
        actual: String,
    },

    /// The context failed validation.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The backend could not be reached or refused the connection.
    #[error("{datasource}: connection error: {message}")]
    Connection {
        datasource: String,
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// An operation was issued before `connect()`.
    #[error("{datasource}: not connected")]
    NotConnected { datasource: String },

    /// Every retry attempt failed.
    #[error("{datasource}: operation failed after {attempts} attempts: {message}")]
    RetryExhausted {
        datasource: String,
        attempts: u32,
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// The deadline elapsed before the operation completed.
    ///
    /// The underlying operation was signalled to cancel but may still be running.
    #[error("{datasource}: operation timed out after {timeout:?}")]
    Timeout {
        datasource: String,
        timeout: Duration,
    },

    /// The operation wrapped by a timeout failed before the deadline.
    #[error("{datasource}: operation failed: {message}")]
    OperationFailed {
        datasource: String,
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// A SQL statement was rejected by the database.
    ///
    /// The statement text and parameters are logged at debug level only.
    #[error("{datasource}: query failed: {message}")]
    Query {
        datasource: String,
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// The broker rejected a published message.
    #[error("{datasource}: publish to '{subject}' failed: {message}")]
    Publish {
        datasource: String,
        subject: String,
        message: String,
    },

    /// The broker rejected a subscription.
    #[error("{datasource}: subscription to '{subject}' failed: {message}")]
    Subscription {
        datasource: String,
        subject: String,
        message: String,
    },

    /// An HTTP request failed or returned a non-success status.
    #[error("{datasource}: request failed: {message}")]
    Request {
        datasource: String,
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// Encoding or decoding a payload failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration mismatch error
    pub fn config_mismatch(
        datasource: impl Into<String>,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        Self::ConfigMismatch {
            datasource: datasource.into(),
            expected,
            actual: actual.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a connection error without a source
    pub fn connection(datasource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            datasource: datasource.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error wrapping the backend error
    pub fn connection_with(datasource: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        let source = source.into();
        Self::Connection {
            datasource: datasource.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a not connected error
    pub fn not_connected(datasource: impl Into<String>) -> Self {
        Self::NotConnected {
            datasource: datasource.into(),
        }
    }

    /// Create a retry exhausted error from the last attempt's error
    pub fn retry_exhausted(
        datasource: impl Into<String>,
        attempts: u32,
        last: Option<BoxedError>,
    ) -> Self {
        let message = last
            .as_ref()
            .map_or_else(|| "no attempts were made".to_owned(), ToString::to_string);
        Self::RetryExhausted {
            datasource: datasource.into(),
            attempts,
            message,
            source: last,
        }
    }

    /// Create a timeout error
    pub fn timeout(datasource: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            datasource: datasource.into(),
            timeout,
        }
    }

    /// Create an operation failed error wrapping the underlying error
    pub fn operation_failed(datasource: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        let source = source.into();
        Self::OperationFailed {
            datasource: datasource.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a query error wrapping the driver error
    pub fn query(datasource: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        let source = source.into();
        Self::Query {
            datasource: datasource.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a publish error
    pub fn publish(
        datasource: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Publish {
            datasource: datasource.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a subscription error
    pub fn subscription(
        datasource: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Subscription {
            datasource: datasource.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a request error for a non-success HTTP status
    pub fn request_status(datasource: impl Into<String>, status: u16, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body}")
        };
        Self::Request {
            datasource: datasource.into(),
            status: Some(status),
            message,
            source: None,
        }
    }

    /// Create a request error wrapping a transport error
    pub fn request(datasource: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        let source = source.into();
        Self::Request {
            datasource: datasource.into(),
            status: None,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Returns the name of the datasource that produced this error, if any.
    pub fn datasource(&self) -> Option<&str> {
        match self {
            Self::ConfigMismatch { datasource, .. }
            | Self::Connection { datasource, .. }
            | Self::NotConnected { datasource }
            | Self::RetryExhausted { datasource, .. }
            | Self::Timeout { datasource, .. }
            | Self::OperationFailed { datasource, .. }
            | Self::Query { datasource, .. }
            | Self::Publish { datasource, .. }
            | Self::Subscription { datasource, .. }
            | Self::Request { datasource, .. } => Some(datasource),
            Self::InvalidConfig { .. } | Self::Serialization(_) => None,
        }
    }

    /// Returns whether this error is a deadline expiry.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_exhausted_message() {
        let last: BoxedError = "connection reset".into();
        let err = Error::retry_exhausted("users-db", 3, Some(last));

        assert_eq!(
            err.to_string(),
            "users-db: operation failed after 3 attempts: connection reset"
        );
        assert_eq!(err.datasource(), Some("users-db"));
    }

    #[test]
    fn test_retry_exhausted_without_attempts() {
        let err = Error::retry_exhausted("users-db", 0, None);
        assert!(err.to_string().contains("no attempts were made"));
    }

    #[test]
    fn test_request_status_message() {
        let err = Error::request_status("billing-api", 503, "");
        assert_eq!(err.to_string(), "billing-api: request failed: HTTP 503");

        let err = Error::request_status("billing-api", 404, "missing");
        assert_eq!(err.to_string(), "billing-api: request failed: HTTP 404: missing");
    }

    #[test]
    fn test_timeout_helpers() {
        let err = Error::timeout("cache", Duration::from_millis(50));
        assert!(err.is_timeout());
        assert!(err.to_string().contains("50ms"));
    }
}
