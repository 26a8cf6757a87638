//! Datasource contracts.
//!
//! Every datasource implements [`Datasource`], which owns exactly one context,
//! and gains the execution policies through the blanket [`ExecutionExt`].
//! On top of that each backend kind implements one capability trait:
//! [`CacheDatasource`], [`EventDatasource`] or [`RelationalDatasource`].
//!
//! The capability traits are object safe and exchange JSON values. The
//! matching `*Ext` traits add typed convenience methods over them.

mod cache;
mod event;
mod relational;

use std::future::Future;
use std::time::Duration;

pub use cache::{CacheDatasource, CacheDatasourceExt};
pub use event::{EventDatasource, EventDatasourceExt, EventHandler};
pub use relational::{RelationalDatasource, RelationalDatasourceExt, Row, SqlParam};
use tokio_util::sync::CancellationToken;

use crate::context::{DatasourceContext, RetryPolicy};
use crate::{BoxedError, Result, policy};

/// Base contract shared by every datasource.
pub trait Datasource: Send + Sync {
    /// Context type carried by this datasource.
    type Context: AsRef<DatasourceContext> + Send + Sync;

    /// Returns the current context.
    fn context(&self) -> &Self::Context;

    /// Replaces the context.
    ///
    /// A live connection handle is left untouched; the new context applies
    /// to subsequent operations and to the next `connect`.
    fn set_context(&mut self, context: Self::Context);

    /// Returns the datasource name from the context.
    fn name(&self) -> &str {
        self.context().as_ref().name()
    }
}

/// Retry and timeout policies available on every [`Datasource`].
///
/// Defaults are taken from the datasource's context.
pub trait ExecutionExt: Datasource {
    /// Runs `operation` with the context's retry policy.
    fn run_with_retry<F, Fut, T, E>(&self, operation: F) -> impl Future<Output = Result<T>> + Send
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Into<BoxedError> + Send;

    /// Runs `operation` with an explicit retry policy.
    fn run_with_retry_policy<F, Fut, T, E>(
        &self,
        policy: RetryPolicy,
        operation: F,
    ) -> impl Future<Output = Result<T>> + Send
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Into<BoxedError> + Send;

    /// Runs `operation` against the context's timeout.
    fn run_with_timeout<F, Fut, T, E>(&self, operation: F) -> impl Future<Output = Result<T>> + Send
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Into<BoxedError> + Send;

    /// Runs `operation` against an explicit timeout.
    fn run_with_timeout_after<F, Fut, T, E>(
        &self,
        timeout: Duration,
        operation: F,
    ) -> impl Future<Output = Result<T>> + Send
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Into<BoxedError> + Send;

    /// Runs `operation` with retries, each attempt under a fresh deadline.
    fn run_resilient<F, Fut, T, E>(&self, operation: F) -> impl Future<Output = Result<T>> + Send
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Into<BoxedError> + Send;
}

impl<D: Datasource + ?Sized> ExecutionExt for D {
    fn run_with_retry<F, Fut, T, E>(&self, operation: F) -> impl Future<Output = Result<T>> + Send
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Into<BoxedError> + Send,
    {
        policy::run_with_retry(self.context().as_ref(), operation)
    }

    fn run_with_retry_policy<F, Fut, T, E>(
        &self,
        policy: RetryPolicy,
        operation: F,
    ) -> impl Future<Output = Result<T>> + Send
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Into<BoxedError> + Send,
    {
        policy::run_with_retry_policy(self.context().as_ref(), policy, operation)
    }

    fn run_with_timeout<F, Fut, T, E>(&self, operation: F) -> impl Future<Output = Result<T>> + Send
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Into<BoxedError> + Send,
    {
        policy::run_with_timeout(self.context().as_ref(), operation)
    }

    fn run_with_timeout_after<F, Fut, T, E>(
        &self,
        timeout: Duration,
        operation: F,
    ) -> impl Future<Output = Result<T>> + Send
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Into<BoxedError> + Send,
    {
        policy::run_with_timeout_after(self.context().as_ref(), timeout, operation)
    }

    fn run_resilient<F, Fut, T, E>(&self, operation: F) -> impl Future<Output = Result<T>> + Send
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Into<BoxedError> + Send,
    {
        policy::run_resilient(self.context().as_ref(), operation)
    }
}
