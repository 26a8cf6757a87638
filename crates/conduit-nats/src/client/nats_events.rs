//! NATS implementation of [`EventDatasource`].

use async_nats::Client;
use async_nats::connection::State;
use async_trait::async_trait;
use bytes::Bytes;
use conduit_core::context::{BrokerOptions, EventContext, NatsOptions};
use conduit_core::datasource::{Datasource, EventDatasource, EventHandler};
use conduit_core::{Error, Result, Subscription, SubscriptionGroup};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::RwLock;

use super::connect_options::connect_options;
use crate::{TRACING_TARGET_CLIENT, TRACING_TARGET_CONNECTION};

/// Live client plus every subscription loop reading from it.
#[derive(Debug, Clone)]
struct NatsConnection {
    client: Client,
    subscriptions: SubscriptionGroup,
}

/// Event datasource backed by a NATS connection.
///
/// Every subscription runs in its own task. `disconnect()` drains the
/// connection, waits for the loops to dispatch what was already received and
/// cancels the stragglers after the context timeout.
#[derive(Debug)]
pub struct NatsEvents {
    context: EventContext,
    connection: RwLock<Option<NatsConnection>>,
}

impl NatsEvents {
    /// Creates a disconnected datasource.
    pub fn new(context: EventContext) -> Self {
        Self {
            context,
            connection: RwLock::new(None),
        }
    }

    /// Returns the underlying client.
    pub async fn client(&self) -> Result<Client> {
        self.live().await.map(|connection| connection.client)
    }

    fn nats_options(&self) -> Result<&NatsOptions> {
        match self.context.broker() {
            BrokerOptions::Nats(options) => Ok(options),
            other => Err(Error::config_mismatch(
                self.context.name(),
                "nats",
                other.as_str(),
            )),
        }
    }

    async fn live(&self) -> Result<NatsConnection> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::not_connected(self.context.name()))
    }

    async fn open(&self) -> Result<Client> {
        let name = self.context.name();
        let options = self.nats_options()?;
        self.context.validate()?;

        let opts = connect_options(self.context.base(), self.context.client_id(), options);
        let timeout = options
            .connect_timeout
            .unwrap_or_else(|| self.context.effective_timeout());
        let servers = options.servers.join(",");

        tracing::debug!(
            target: TRACING_TARGET_CONNECTION,
            datasource = name,
            servers = %servers,
            timeout_ms = timeout.as_millis(),
            "Connecting to NATS"
        );

        let client = tokio::time::timeout(
            timeout,
            async_nats::connect_with_options(servers.as_str(), opts),
        )
        .await
        .map_err(|_| Error::timeout(name, timeout))?
        .map_err(|e| Error::connection_with(name, e))?;

        let info = client.server_info();
        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            datasource = name,
            server_host = %info.host,
            server_version = %info.version,
            server_id = %info.server_id,
            max_payload = info.max_payload,
            "Connected to NATS"
        );

        Ok(client)
    }
}

impl Datasource for NatsEvents {
    type Context = EventContext;

    fn context(&self) -> &Self::Context {
        &self.context
    }

    fn set_context(&mut self, context: Self::Context) {
        self.context = context;
    }
}

#[async_trait]
impl EventDatasource for NatsEvents {
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION, fields(datasource = self.context.name()))]
    async fn connect(&self) -> Result<()> {
        let mut slot = self.connection.write().await;
        if slot.is_some() {
            return Ok(());
        }

        let client = self.open().await.inspect_err(|err| {
            self.context.error(format!("Failed to connect to NATS: {err}"));
        })?;

        *slot = Some(NatsConnection {
            client,
            subscriptions: SubscriptionGroup::new(),
        });

        self.context.info(format!(
            "Connected to NATS as '{}'",
            self.context.client_id()
        ));
        Ok(())
    }

    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION, fields(datasource = self.context.name()))]
    async fn disconnect(&self) -> Result<()> {
        let Some(connection) = self.connection.write().await.take() else {
            return Ok(());
        };

        // Ends every subscriber stream after its buffered messages.
        if let Err(err) = connection.client.drain().await {
            self.context
                .warn(format!("Failed to drain NATS connection on disconnect: {err}"));
        }

        let grace = self.context.effective_timeout();
        if !connection.subscriptions.drain(grace).await {
            self.context.warn(format!(
                "Subscriptions still running {}ms after drain were cancelled",
                grace.as_millis()
            ));
        }

        self.context.info("Disconnected from NATS");
        Ok(())
    }

    async fn publish_value(&self, subject: &str, payload: Value) -> Result<()> {
        let connection = self.live().await?;
        let bytes = Bytes::from(serde_json::to_vec(&payload)?);
        let size = bytes.len();

        connection
            .client
            .publish(subject.to_owned(), bytes)
            .await
            .map_err(|e| Error::publish(self.context.name(), subject, e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_CLIENT,
            datasource = self.context.name(),
            subject = %subject,
            size,
            "Published message"
        );
        Ok(())
    }

    async fn subscribe_value(&self, subject: &str, handler: EventHandler) -> Result<Subscription> {
        let connection = self.live().await?;

        let subscriber = connection
            .client
            .subscribe(subject.to_owned())
            .await
            .map_err(|e| Error::subscription(self.context.name(), subject, e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_CLIENT,
            datasource = self.context.name(),
            subject = %subject,
            "Subscribed to subject"
        );
        self.context.info(format!("Subscribed to '{subject}'"));

        let payloads = subscriber.map(|message| message.payload);
        Ok(connection.subscriptions.spawn(
            self.context.base().clone(),
            subject,
            payloads,
            handler,
        ))
    }

    async fn is_healthy(&self) -> bool {
        match self.connection.read().await.as_ref() {
            Some(connection) => matches!(connection.client.connection_state(), State::Connected),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use conduit_core::BoxedError;
    use conduit_core::context::{DEFAULT_NATS_SERVER, DatasourceContext, NatsOptions};
    use conduit_core::datasource::EventDatasourceExt;
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;

    fn nats(options: NatsOptions) -> NatsEvents {
        let base = DatasourceContext::new("events").with_timeout(Duration::from_millis(200));
        NatsEvents::new(EventContext::nats(base, "conduit-test", options))
    }

    #[tokio::test]
    async fn test_connect_rejects_non_nats_broker() {
        let events = NatsEvents::new(EventContext::mock(
            DatasourceContext::new("events"),
            "conduit-test",
        ));

        let err = events.connect().await.unwrap_err();
        assert!(matches!(err, Error::ConfigMismatch { expected: "nats", .. }));
        assert!(!events.is_healthy().await);
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let events = nats(NatsOptions::default());

        assert!(!events.is_healthy().await);
        assert!(matches!(
            events.publish("orders", &json!({"id": 1})).await,
            Err(Error::NotConnected { .. })
        ));

        let handler: EventHandler = Arc::new(|_| Box::pin(async { Ok(()) }));
        assert!(matches!(
            events.subscribe_value("orders", handler).await,
            Err(Error::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let events = nats(NatsOptions::default());
        events.disconnect().await.unwrap();
        events.disconnect().await.unwrap();
        assert!(events.client().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_server_fails() {
        let events = nats(
            NatsOptions::from_server_list("nats://127.0.0.1:1")
                .with_connect_timeout(Duration::from_millis(200)),
        );

        let err = events.connect().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Connection { .. } | Error::Timeout { .. }
        ));
        assert!(!events.is_healthy().await);
    }

    #[tokio::test]
    #[ignore] // Requires running NATS server
    async fn test_disconnect_delivers_buffered_messages() {
        let server = std::env::var("NATS_URL").unwrap_or_else(|_| DEFAULT_NATS_SERVER.to_owned());
        let events = NatsEvents::new(EventContext::nats(
            DatasourceContext::new("events").with_timeout(Duration::from_secs(5)),
            "conduit-test",
            NatsOptions::from_server_list(&server),
        ));
        events.connect().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscription = events
            .subscribe("conduit.test.drain", {
                let seen = seen.clone();
                move |n: u32| {
                    let seen = seen.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        seen.lock().await.push(n);
                        Ok::<(), BoxedError>(())
                    }
                }
            })
            .await
            .unwrap();

        for n in 1..=3_u32 {
            events.publish("conduit.test.drain", &n).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        events.disconnect().await.unwrap();

        assert_eq!(*seen.lock().await, vec![1, 2, 3]);
        assert!(!subscription.is_active());
    }
}
