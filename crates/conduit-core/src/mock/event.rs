use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc::{self, UnboundedSender};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::context::EventContext;
use crate::datasource::{Datasource, EventDatasource, EventHandler};
use crate::{Error, Result, Subscription, SubscriptionGroup};

#[derive(Debug, Default)]
struct BrokerState {
    subscribers: HashMap<String, Vec<UnboundedSender<Bytes>>>,
    published: Vec<(String, Value)>,
}

/// In-process broker shared by one or more [`MockEventBus`] instances.
///
/// Subjects are matched exactly.
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MockBroker {
    /// Creates a broker with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every published `(subject, payload)` pair in publish order.
    pub async fn published(&self) -> Vec<(String, Value)> {
        self.state.lock().await.published.clone()
    }

    /// Returns the number of live subscribers on `subject`.
    pub async fn subscriber_count(&self, subject: &str) -> usize {
        self.state
            .lock()
            .await
            .subscribers
            .get(subject)
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }
}

/// Subscription loops and inbound channels of one connected bus.
#[derive(Debug, Clone, Default)]
struct MockConnection {
    subscriptions: SubscriptionGroup,
    inboxes: Arc<Mutex<Vec<UnboundedSender<Bytes>>>>,
}

/// In-memory [`EventDatasource`].
#[derive(Debug)]
pub struct MockEventBus {
    context: EventContext,
    broker: MockBroker,
    connection: Mutex<Option<MockConnection>>,
}

impl MockEventBus {
    /// Creates an event bus with its own broker.
    pub fn new(context: EventContext) -> Self {
        Self::with_broker(context, MockBroker::new())
    }

    /// Creates an event bus attached to an existing broker.
    pub fn with_broker(context: EventContext, broker: MockBroker) -> Self {
        Self {
            context,
            broker,
            connection: Mutex::new(None),
        }
    }

    /// Returns the broker.
    pub fn broker(&self) -> &MockBroker {
        &self.broker
    }

    async fn live(&self) -> Result<MockConnection> {
        self.connection
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::not_connected(self.context.name()))
    }
}

impl Datasource for MockEventBus {
    type Context = EventContext;

    fn context(&self) -> &Self::Context {
        &self.context
    }

    fn set_context(&mut self, context: Self::Context) {
        self.context = context;
    }
}

#[async_trait]
impl EventDatasource for MockEventBus {
    async fn connect(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        if connection.is_none() {
            *connection = Some(MockConnection::default());
            self.context.info(format!(
                "Connected to in-memory broker as '{}'",
                self.context.client_id()
            ));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(connection) = self.connection.lock().await.take() else {
            return Ok(());
        };

        // Closing the inboxes ends each stream after its buffered messages.
        for inbox in connection.inboxes.lock().await.drain(..) {
            inbox.close_channel();
        }
        if !connection
            .subscriptions
            .drain(self.context.effective_timeout())
            .await
        {
            self.context
                .warn("Cancelled subscriptions still running after drain");
        }

        self.context.info("Disconnected from in-memory broker");
        Ok(())
    }

    async fn publish_value(&self, subject: &str, payload: Value) -> Result<()> {
        self.live().await?;

        let encoded = Bytes::from(serde_json::to_vec(&payload)?);
        let mut state = self.broker.state.lock().await;

        if let Some(senders) = state.subscribers.get_mut(subject) {
            senders.retain(|sender| sender.unbounded_send(encoded.clone()).is_ok());
        }
        state.published.push((subject.to_owned(), payload));
        Ok(())
    }

    async fn subscribe_value(&self, subject: &str, handler: EventHandler) -> Result<Subscription> {
        let connection = self.live().await?;

        let (sender, receiver) = mpsc::unbounded();
        connection.inboxes.lock().await.push(sender.clone());
        self.broker
            .state
            .lock()
            .await
            .subscribers
            .entry(subject.to_owned())
            .or_default()
            .push(sender);

        Ok(connection.subscriptions.spawn(
            self.context.base().clone(),
            subject,
            receiver,
            handler,
        ))
    }

    async fn is_healthy(&self) -> bool {
        self.connection.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use tokio::sync::mpsc as tokio_mpsc;

    use super::*;
    use crate::BoxedError;
    use crate::context::DatasourceContext;
    use crate::datasource::EventDatasourceExt;
    use crate::mock::CapturingLogger;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct UserCreated {
        id: u64,
        email: String,
    }

    fn bus(broker: &MockBroker, logger: &CapturingLogger) -> MockEventBus {
        let base = DatasourceContext::new("auth-events").with_logger(logger.clone());
        MockEventBus::with_broker(EventContext::mock(base, "auth-1"), broker.clone())
    }

    #[tokio::test]
    async fn test_delivers_exact_payload() {
        let broker = MockBroker::new();
        let logger = CapturingLogger::new();
        let bus = bus(&broker, &logger);
        bus.connect().await.unwrap();

        let (tx, mut rx) = tokio_mpsc::unbounded_channel();
        let _subscription = bus
            .subscribe("user.created", move |event: UserCreated| {
                let tx = tx.clone();
                async move { tx.send(event).map_err(|e| e.to_string()) }
            })
            .await
            .unwrap();

        let event = UserCreated {
            id: 1,
            email: "a@example.com".into(),
        };
        bus.publish("user.created", &event).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(event));
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_stop_delivery() {
        let broker = MockBroker::new();
        let logger = CapturingLogger::new();
        let bus = bus(&broker, &logger);
        bus.connect().await.unwrap();

        let (tx, mut rx) = tokio_mpsc::unbounded_channel();
        let _subscription = bus
            .subscribe("orders", move |n: u32| {
                let tx = tx.clone();
                async move {
                    if n == 1 {
                        return Err::<(), BoxedError>("rejecting message 1".into());
                    }
                    tx.send(n).map_err(|e| e.to_string().into())
                }
            })
            .await
            .unwrap();

        bus.publish("orders", &1_u32).await.unwrap();
        bus.publish("orders", &2_u32).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(2));
        assert!(
            logger
                .records()
                .iter()
                .any(|r| r.message.contains("rejecting message 1"))
        );
    }

    #[tokio::test]
    async fn test_disconnect_stops_subscriptions() {
        let broker = MockBroker::new();
        let logger = CapturingLogger::new();
        let bus = bus(&broker, &logger);
        bus.connect().await.unwrap();

        let subscription = bus
            .subscribe("orders", |_: Value| async { Ok::<(), BoxedError>(()) })
            .await
            .unwrap();
        assert_eq!(broker.subscriber_count("orders").await, 1);

        bus.disconnect().await.unwrap();
        subscription.shutdown().await;

        assert!(!bus.is_healthy().await);
        assert_eq!(broker.subscriber_count("orders").await, 0);
        bus.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_delivers_buffered_messages() {
        let broker = MockBroker::new();
        let logger = CapturingLogger::new();
        let bus = bus(&broker, &logger);
        bus.connect().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscription = bus
            .subscribe("orders", {
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
            bus.publish("orders", &n).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        bus.disconnect().await.unwrap();

        assert_eq!(*seen.lock().await, vec![1, 2, 3]);
        assert!(!subscription.is_active());
        assert_eq!(broker.subscriber_count("orders").await, 0);
    }

    #[tokio::test]
    async fn test_publish_requires_connection() {
        let bus = bus(&MockBroker::new(), &CapturingLogger::new());
        let err = bus.publish("orders", &json!({})).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_publishers_and_subscribers_share_broker() {
        let broker = MockBroker::new();
        let logger = CapturingLogger::new();
        let publisher = bus(&broker, &logger);
        let subscriber = bus(&broker, &logger);
        publisher.connect().await.unwrap();
        subscriber.connect().await.unwrap();

        let (tx, mut rx) = tokio_mpsc::unbounded_channel();
        let _subscription = subscriber
            .subscribe("audit", move |value: Value| {
                let tx = tx.clone();
                async move { tx.send(value).map_err(|e| e.to_string()) }
            })
            .await
            .unwrap();

        publisher.publish("audit", &json!({"action": "login"})).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(json!({"action": "login"})));
        assert_eq!(broker.published().await.len(), 1);
    }
}
