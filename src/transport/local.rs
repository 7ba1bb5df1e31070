//! In-process message broker.
//!
//! # Responsibilities
//! - Route `(channel, operation)` messages to subscribed handlers
//! - Correlate request/reply pairs via a per-message id and a oneshot reply slot
//! - Simulate connection loss (`disconnect` / `connect`)
//!
//! # Design Decisions
//! - One bounded mpsc queue and one consumer task per subscription
//! - Each message is handled on its own task so a slow handler does not stall the queue
//! - A reply that arrives after the requester gave up is dropped silently

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::transport::{BrokerTransport, TransportError};

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A message in flight on the local broker.
#[derive(Debug)]
pub struct Envelope {
    pub correlation_id: Uuid,
    pub payload: Value,
    reply_to: Option<oneshot::Sender<Value>>,
}

#[derive(Debug)]
struct BrokerInner {
    subscriptions: DashMap<(String, String), mpsc::Sender<Envelope>>,
    connected: AtomicBool,
    capacity: usize,
}

/// Cheaply cloneable handle to an in-process broker.
#[derive(Debug, Clone)]
pub struct LocalBroker {
    inner: Arc<BrokerInner>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a broker whose per-subscription queues hold `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                subscriptions: DashMap::new(),
                connected: AtomicBool::new(true),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Consume `operation` on `channel` with `handler`.
    ///
    /// The handler's return value is the reply for `send`; it is discarded for
    /// `emit`. Subscribing again replaces the previous handler.
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F, Fut>(&self, channel: &str, operation: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Envelope>(self.inner.capacity);
        let handler = Arc::new(handler);
        let label = format!("{channel}:{operation}");

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let reply = handler(envelope.payload).await;
                    if let Some(reply_to) = envelope.reply_to {
                        let _ = reply_to.send(reply);
                    }
                });
            }
            tracing::debug!(subscription = %label, "Subscription consumer stopped");
        });

        self.inner
            .subscriptions
            .insert((channel.to_string(), operation.to_string()), tx);
        tracing::debug!(channel = %channel, operation = %operation, "Subscribed");
    }

    /// Remove a subscription. Returns false if none existed.
    pub fn unsubscribe(&self, channel: &str, operation: &str) -> bool {
        self.inner
            .subscriptions
            .remove(&(channel.to_string(), operation.to_string()))
            .is_some()
    }

    pub fn is_subscribed(&self, channel: &str, operation: &str) -> bool {
        self.inner
            .subscriptions
            .contains_key(&(channel.to_string(), operation.to_string()))
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.len()
    }

    /// Simulate losing the broker connection.
    pub fn disconnect(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    pub fn connect(&self) {
        self.inner.connected.store(true, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn dispatch(
        &self,
        channel: &str,
        operation: &str,
        envelope: Envelope,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }

        // Clone the sender out so no map guard is held across the await.
        let sender = self
            .inner
            .subscriptions
            .get(&(channel.to_string(), operation.to_string()))
            .map(|s| s.clone())
            .ok_or_else(|| TransportError::NoSubscriber {
                channel: channel.to_string(),
                operation: operation.to_string(),
            })?;

        tracing::trace!(
            channel = %channel,
            operation = %operation,
            correlation_id = %envelope.correlation_id,
            "Publishing message"
        );

        sender.send(envelope).await.map_err(|_| TransportError::NoSubscriber {
            channel: channel.to_string(),
            operation: operation.to_string(),
        })
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerTransport for LocalBroker {
    async fn emit(&self, channel: &str, operation: &str, payload: Value) -> Result<(), TransportError> {
        let envelope = Envelope {
            correlation_id: Uuid::new_v4(),
            payload,
            reply_to: None,
        };
        self.dispatch(channel, operation, envelope).await
    }

    async fn send(&self, channel: &str, operation: &str, payload: Value) -> Result<Value, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            correlation_id: Uuid::new_v4(),
            payload,
            reply_to: Some(reply_tx),
        };
        self.dispatch(channel, operation, envelope).await?;

        reply_rx.await.map_err(|_| TransportError::ReplyDropped {
            channel: channel.to_string(),
            operation: operation.to_string(),
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.disconnect();
        self.inner.subscriptions.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_request_reply() {
        let broker = LocalBroker::new();
        broker.subscribe("user_queue", "get-user-profile", |payload| async move {
            json!({ "id": payload["userId"], "username": "user7" })
        });

        let reply = broker
            .send("user_queue", "get-user-profile", json!({ "userId": "7" }))
            .await
            .unwrap();
        assert_eq!(reply["id"], "7");
    }

    #[tokio::test]
    async fn test_emit_reaches_handler() {
        let broker = LocalBroker::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        broker.subscribe("analytics_queue", "track", move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Value::Null
            }
        });

        broker.emit("analytics_queue", "track", json!({})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_subscriber() {
        let broker = LocalBroker::new();
        let err = broker.send("quiz_queue", "submit", json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::NoSubscriber { .. }));
    }

    #[tokio::test]
    async fn test_disconnected_broker_rejects() {
        let broker = LocalBroker::new();
        broker.subscribe("media_queue", "upload", |_| async { json!({}) });
        broker.disconnect();
        let err = broker.emit("media_queue", "upload", json!({})).await.unwrap_err();
        assert_eq!(err, TransportError::Disconnected);

        broker.connect();
        assert!(broker.emit("media_queue", "upload", json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_close_drops_subscriptions() {
        let broker = LocalBroker::new();
        broker.subscribe("lesson_queue", "get-lesson", |_| async { json!({}) });
        assert_eq!(broker.subscription_count(), 1);
        broker.close().await.unwrap();
        assert_eq!(broker.subscription_count(), 0);
        assert!(!broker.is_connected());
    }
}
