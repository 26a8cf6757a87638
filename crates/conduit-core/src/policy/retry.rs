//! Retry with exponential backoff.

use std::future::Future;

use crate::context::{DatasourceContext, RetryPolicy};
use crate::{BoxedError, Error, Result};

/// Runs `operation` with the context's retry policy, or the defaults.
///
/// See [`run_with_retry_policy`].
pub async fn run_with_retry<F, Fut, T, E>(ctx: &DatasourceContext, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<BoxedError>,
{
    run_with_retry_policy(ctx, ctx.effective_retry_policy(), operation).await
}

/// Runs `operation` up to `policy.retries` times.
///
/// Attempts are strictly sequential. After a failed attempt with index `i`
/// (other than the last) the call sleeps for [`RetryPolicy::backoff`]`(i)`.
/// The first success is returned immediately.
///
/// When every attempt fails the last error is logged once through the
/// context logger and returned wrapped in [`Error::RetryExhausted`].
/// A policy with zero retries never invokes `operation`.
pub async fn run_with_retry_policy<F, Fut, T, E>(
    ctx: &DatasourceContext,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<BoxedError>,
{
    let mut last_error: Option<BoxedError> = None;

    for attempt in 0..policy.retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_error = Some(err.into());

                if attempt + 1 < policy.retries {
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
            }
        }
    }

    let err = Error::retry_exhausted(ctx.name(), policy.retries, last_error);
    ctx.error(err.to_string());
    Err(err)
}
