//! Execution policies shared by every datasource.
//!
//! Both policies are free functions over a [`DatasourceContext`] so that
//! adapters can compose them directly; datasources reach them through
//! [`ExecutionExt`](crate::datasource::ExecutionExt). When both are needed,
//! the timeout goes innermost so that every attempt gets a fresh deadline:
//!
//! ```rust,ignore
//! run_with_retry(ctx, || run_with_timeout(ctx, deadline, |token| fetch(token))).await?;
//! ```
//!
//! [`DatasourceContext`]: crate::context::DatasourceContext

mod retry;
mod timeout;

use std::future::Future;

use tokio_util::sync::CancellationToken;

pub use retry::{run_with_retry, run_with_retry_policy};
pub use timeout::{run_with_timeout, run_with_timeout_after};

use crate::context::DatasourceContext;
use crate::{BoxedError, Result};

/// Runs `operation` with retries, giving every attempt its own deadline.
///
/// Both the retry policy and the timeout come from the context.
pub async fn run_resilient<F, Fut, T, E>(ctx: &DatasourceContext, operation: F) -> Result<T>
where
    F: Fn(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<BoxedError>,
{
    let timeout = ctx.effective_timeout();
    let operation = &operation;
    run_with_retry(ctx, move || run_with_timeout_after(ctx, timeout, operation)).await
}
