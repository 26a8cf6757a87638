//! Fault-isolated subscription loop shared by event adapters.

use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{FutureExt, Stream, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::TRACING_TARGET_SUBSCRIPTION;
use crate::context::DatasourceContext;
use crate::datasource::EventHandler;

/// Handle to a running subscription loop.
///
/// Dropping the handle detaches the loop; it keeps running until it is
/// cancelled, its group is drained or cancelled, or the message stream ends.
#[derive(Debug)]
pub struct Subscription {
    subject: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Returns the subscribed subject.
    #[inline]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns whether the loop is still running.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Requests the loop to stop after the message being handled.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Stops the loop and waits for it to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(err) = self.handle.await {
            tracing::warn!(
                target: TRACING_TARGET_SUBSCRIPTION,
                subject = %self.subject,
                error = %err,
                "Subscription loop did not shut down cleanly"
            );
        }
    }
}

/// Every subscription loop owned by one connection.
///
/// Loops spawned through the group can be drained together: the group waits
/// for each message stream to end, so messages already buffered are still
/// dispatched, and cancels whatever is left once the grace period runs out.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionGroup {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl SubscriptionGroup {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a loop that decodes every message of `stream` as JSON and
    /// passes it to `handler`.
    ///
    /// Messages are handled one at a time in arrival order. Decode failures,
    /// handler errors and handler panics are logged through the context
    /// logger and the loop moves on to the next message. The loop stops when
    /// the stream ends, or without reading further when the handle or the
    /// group is cancelled.
    pub fn spawn<S>(
        &self,
        ctx: DatasourceContext,
        subject: impl Into<String>,
        stream: S,
        handler: EventHandler,
    ) -> Subscription
    where
        S: Stream<Item = Bytes> + Send + 'static,
    {
        let subject = subject.into();
        let token = self.token.child_token();
        let handle = self.tracker.spawn(run_loop(
            ctx,
            subject.clone(),
            stream,
            handler,
            token.clone(),
        ));

        Subscription {
            subject,
            token,
            handle,
        }
    }

    /// Returns the number of loops still running.
    #[inline]
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    /// Returns whether no loop is running.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Stops every loop without dispatching buffered messages.
    pub async fn cancel(&self) {
        self.tracker.close();
        self.token.cancel();
        self.tracker.wait().await;
    }

    /// Waits up to `grace` for every message stream to end, then cancels the
    /// loops still running.
    ///
    /// Callers end the streams first (for instance by draining the broker
    /// connection). Returns `false` when the grace period ran out.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            return true;
        }

        tracing::warn!(
            target: TRACING_TARGET_SUBSCRIPTION,
            remaining = self.tracker.len(),
            grace_ms = grace.as_millis(),
            "Subscription loops still running after grace period, cancelling"
        );
        self.token.cancel();
        self.tracker.wait().await;
        false
    }
}

async fn run_loop<S>(
    ctx: DatasourceContext,
    subject: String,
    stream: S,
    handler: EventHandler,
    token: CancellationToken,
) where
    S: Stream<Item = Bytes> + Send + 'static,
{
    let mut stream = pin!(stream);
    let mut handled: u64 = 0;

    tracing::debug!(
        target: TRACING_TARGET_SUBSCRIPTION,
        datasource = ctx.name(),
        subject = %subject,
        "Subscription loop started"
    );

    loop {
        let payload = tokio::select! {
            biased;

            () = token.cancelled() => break,
            next = stream.next() => match next {
                Some(payload) => payload,
                None => break,
            },
        };

        dispatch(&ctx, &subject, &handler, payload).await;
        handled += 1;
    }

    tracing::debug!(
        target: TRACING_TARGET_SUBSCRIPTION,
        datasource = ctx.name(),
        subject = %subject,
        handled,
        "Subscription loop stopped"
    );
}

async fn dispatch(ctx: &DatasourceContext, subject: &str, handler: &EventHandler, payload: Bytes) {
    let value: Value = match serde_json::from_slice(&payload) {
        Ok(value) => value,
        Err(err) => {
            ctx.warn(format!("Discarding undecodable message on '{subject}': {err}"));
            return;
        }
    };

    let outcome = AssertUnwindSafe(async { handler(value).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => ctx.error(format!("Handler for '{subject}' failed: {err}")),
        Err(_) => ctx.error(format!("Handler for '{subject}' panicked")),
    }
}
