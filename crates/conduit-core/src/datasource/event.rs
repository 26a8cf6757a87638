use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::Datasource;
use crate::context::EventContext;
use crate::{BoxedError, Result, Subscription};

/// Type-erased message handler invoked once per received message.
pub type EventHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync>;

/// Publish/subscribe capability.
///
/// Handler failures are contained by the subscription loop: they are logged
/// through the context logger and never stop later deliveries.
#[async_trait]
pub trait EventDatasource: Datasource<Context = EventContext> {
    /// Connects to the broker.
    ///
    /// Fails with [`Error::ConfigMismatch`](crate::Error::ConfigMismatch) when
    /// the context declares a broker this adapter does not implement.
    async fn connect(&self) -> Result<()>;

    /// Drains in-flight messages, stops every subscription loop and closes
    /// the connection. No-op when not connected.
    async fn disconnect(&self) -> Result<()>;

    /// Publishes a JSON payload without waiting for acknowledgement.
    async fn publish_value(&self, subject: &str, payload: Value) -> Result<()>;

    /// Subscribes `handler` to `subject`.
    ///
    /// The returned handle may be dropped; the loop keeps running until
    /// [`Subscription::cancel`] or `disconnect`.
    async fn subscribe_value(&self, subject: &str, handler: EventHandler) -> Result<Subscription>;

    /// Returns whether the connection is currently alive.
    async fn is_healthy(&self) -> bool;
}

/// Typed convenience methods over [`EventDatasource`].
pub trait EventDatasourceExt: EventDatasource {
    /// Publishes `payload` encoded as JSON.
    fn publish<T>(&self, subject: &str, payload: &T) -> impl Future<Output = Result<()>> + Send
    where
        T: Serialize + Sync + ?Sized;

    /// Subscribes a handler that receives payloads decoded as `T`.
    ///
    /// A payload that does not decode as `T` counts as a handler failure.
    fn subscribe<T, F, Fut, E>(
        &self,
        subject: &str,
        handler: F,
    ) -> impl Future<Output = Result<Subscription>> + Send
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxedError> + 'static;
}

impl<D: EventDatasource + ?Sized> EventDatasourceExt for D {
    fn publish<T>(&self, subject: &str, payload: &T) -> impl Future<Output = Result<()>> + Send
    where
        T: Serialize + Sync + ?Sized,
    {
        let encoded = serde_json::to_value(payload);
        async move { self.publish_value(subject, encoded?).await }
    }

    fn subscribe<T, F, Fut, E>(
        &self,
        subject: &str,
        handler: F,
    ) -> impl Future<Output = Result<Subscription>> + Send
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxedError> + 'static,
    {
        let handler = Arc::new(handler);
        let erased: EventHandler = Arc::new(move |value: Value| {
            let handler = handler.clone();
            async move {
                let payload: T = serde_json::from_value(value)?;
                handler(payload).await.map_err(Into::<BoxedError>::into)
            }
            .boxed()
        });

        async move { self.subscribe_value(subject, erased).await }
    }
}
