//! Deadline with cooperative cancellation.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::context::DatasourceContext;
use crate::{BoxedError, Error, Result, TRACING_TARGET_POLICY};

/// Runs `operation` against the context's timeout, or the default.
///
/// See [`run_with_timeout_after`].
pub async fn run_with_timeout<F, Fut, T, E>(ctx: &DatasourceContext, operation: F) -> Result<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<BoxedError>,
{
    run_with_timeout_after(ctx, ctx.effective_timeout(), operation).await
}

/// Races `operation` against a timer of `timeout`.
///
/// The operation receives a [`CancellationToken`] that is cancelled when the
/// deadline elapses. The wrapper stops polling the operation at that point and
/// returns [`Error::Timeout`]; anything the operation spawned keeps running
/// until it observes the token. An error from the operation before the
/// deadline is returned as [`Error::OperationFailed`].
pub async fn run_with_timeout_after<F, Fut, T, E>(
    ctx: &DatasourceContext,
    timeout: Duration,
    operation: F,
) -> Result<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<BoxedError>,
{
    let token = CancellationToken::new();
    let operation = operation(token.clone());

    tokio::select! {
        biased;

        result = operation => {
            result.map_err(|err| Error::operation_failed(ctx.name(), err))
        }

        () = tokio::time::sleep(timeout) => {
            token.cancel();
            tracing::debug!(
                target: TRACING_TARGET_POLICY,
                datasource = ctx.name(),
                timeout_ms = timeout.as_millis(),
                "Deadline elapsed, cancellation requested"
            );
            Err(Error::timeout(ctx.name(), timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::time::Instant;

    use super::*;
    use crate::context::RetryPolicy;
    use crate::policy::run_with_retry;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_wins() {
        let ctx = DatasourceContext::new("auth-cache");
        let start = Instant::now();

        let result = run_with_timeout_after(&ctx, Duration::from_millis(50), |_token| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, Error>("late")
        })
        .await;

        let elapsed = start.elapsed();
        assert!(result.unwrap_err().is_timeout());
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_is_cancelled_on_deadline() {
        let ctx = DatasourceContext::new("auth-cache");
        let seen = Arc::new(Mutex::new(None));

        let observed = seen.clone();
        let result = run_with_timeout_after(&ctx, Duration::from_millis(10), move |token| {
            *observed.lock().unwrap() = Some(token.clone());
            async move {
                token.cancelled().await;
                Ok::<_, Error>(())
            }
        })
        .await;

        assert!(result.unwrap_err().is_timeout());
        let token = seen.lock().unwrap().take().unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_result_wins() {
        let ctx = DatasourceContext::new("auth-cache").with_timeout(Duration::from_secs(1));

        let value = run_with_timeout(&ctx, |token| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(!token.is_cancelled());
            Ok::<_, Error>(7)
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_operation_error_wins() {
        let ctx = DatasourceContext::new("auth-cache");

        let err = run_with_timeout(&ctx, |_token| async { Err::<(), _>("refused") })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::OperationFailed { .. }));
        assert!(err.to_string().contains("refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_gets_fresh_deadline() {
        let ctx = DatasourceContext::new("users-db")
            .with_timeout(Duration::from_millis(50))
            .with_retry_policy(RetryPolicy::new(
                3,
                Duration::from_millis(10),
                Duration::from_millis(10),
            ));
        let attempts = Arc::new(Mutex::new(0_u32));

        let value = run_with_retry(&ctx, || {
            let attempts = attempts.clone();
            let ctx = &ctx;
            async move {
                let attempt = {
                    let mut guard = attempts.lock().unwrap();
                    *guard += 1;
                    *guard
                };
                run_with_timeout(ctx, |_token| async move {
                    let work = if attempt < 3 { 200 } else { 20 };
                    tokio::time::sleep(Duration::from_millis(work)).await;
                    Ok::<_, Error>(attempt)
                })
                .await
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
    }
}
