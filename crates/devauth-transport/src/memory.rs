// ============================================
// File: crates/devauth-transport/src/memory.rs
// ============================================
//! # In-Memory Broker
//!
//! ## Creation Reason
//! Provides a broker that lives inside the process so protocol flows can
//! be exercised in tests without a network or an MQTT server.
//!
//! ## Main Functionality
//! - `MemoryBroker`: Shared routing table, retained messages, publish log
//! - `MemoryTransport`: One connected client, implements `PubSubTransport`
//! - Fault injection: failing publishes, dropped connections
//!
//! ## Usage in Tests
//! ```ignore
//! use bytes::Bytes;
//! use devauth_common::types::Topic;
//! use devauth_transport::memory::MemoryBroker;
//! use devauth_transport::{PubSubTransport, QoS};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = MemoryBroker::new();
//! let a = broker.connect("a");
//! let b = broker.connect("b");
//!
//! let mut sub = b.subscribe("greetings/+", QoS::AtLeastOnce).await?;
//! a.publish(&Topic::new("greetings/b")?, Bytes::from_static(b"hi"), QoS::AtLeastOnce, false)
//!     .await?;
//!
//! assert_eq!(&sub.recv().await.unwrap().payload[..], b"hi");
//! # Ok(())
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - Delivery is synchronous and exactly once; it does NOT simulate
//!   QoS 1 duplicates unless a test publishes twice
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use devauth_common::types::Topic;

use crate::error::{Result, TransportError};
use crate::router::{OwnerId, Router};
use crate::topic::{topic_matches, validate_filter};
use crate::traits::{Message, PubSubTransport, QoS, Subscription, DEFAULT_CHANNEL_CAPACITY};

// ============================================
// MemoryBroker
// ============================================

struct BrokerInner {
    router: Router,
    retained: Mutex<HashMap<String, Message>>,
    log: Mutex<Vec<Message>>,
    next_owner: AtomicU64,
}

/// In-process broker. Cloning yields another handle to the same broker.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a broker whose subscriptions queue up to `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                router: Router::new(capacity),
                retained: Mutex::new(HashMap::new()),
                log: Mutex::new(Vec::new()),
                next_owner: AtomicU64::new(1),
            }),
        }
    }

    /// Connects a new client.
    #[must_use]
    pub fn connect(&self, client_id: impl Into<String>) -> MemoryTransport {
        MemoryTransport {
            broker: self.clone(),
            owner: self.inner.next_owner.fetch_add(1, Ordering::Relaxed),
            client_id: client_id.into(),
            connected: AtomicBool::new(true),
            fail_publishes: AtomicBool::new(false),
            fail_subscribes: AtomicBool::new(false),
        }
    }

    /// Publishes as if from an outside client.
    pub fn inject(&self, topic: &str, payload: impl Into<Bytes>) -> usize {
        self.route(Message::new(topic, payload.into(), QoS::AtLeastOnce, false))
    }

    /// Every message published through this broker, in order.
    #[must_use]
    pub fn published(&self) -> Vec<Message> {
        self.inner.log.lock().clone()
    }

    /// Messages published on exactly `topic`.
    #[must_use]
    pub fn published_on(&self, topic: &str) -> Vec<Message> {
        self.inner
            .log
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Number of live routes.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.router.active_filters().len()
    }

    fn route(&self, message: Message) -> usize {
        self.inner.log.lock().push(message.clone());
        let delivered = self.inner.router.dispatch(&message);
        trace!(topic = %message.topic, delivered, "Memory broker routed message");
        delivered
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// MemoryTransport
// ============================================

/// A client connected to a `MemoryBroker`.
pub struct MemoryTransport {
    broker: MemoryBroker,
    owner: OwnerId,
    client_id: String,
    connected: AtomicBool,
    fail_publishes: AtomicBool,
    fail_subscribes: AtomicBool,
}

impl MemoryTransport {
    /// Makes every following publish fail with `PublishFailed`.
    pub fn set_fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Makes every following subscribe fail as if the broker refused it.
    pub fn set_fail_subscribes(&self, fail: bool) {
        self.fail_subscribes.store(fail, Ordering::SeqCst);
    }

    /// Simulates the broker dropping this client: subscriptions end and
    /// operations report `NotConnected`.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.broker.inner.router.remove_owner(self.owner);
    }
}

#[async_trait]
impl PubSubTransport for MemoryTransport {
    async fn publish(&self, topic: &Topic, payload: Bytes, qos: QoS, retain: bool) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(TransportError::publish_failed(topic.as_str(), "injected failure"));
        }

        let message = Message::new(topic.as_str(), payload, qos, retain);
        if retain {
            self.broker
                .inner
                .retained
                .lock()
                .insert(topic.to_string(), message.clone());
        }
        self.broker.route(message);
        Ok(())
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<Subscription> {
        validate_filter(filter)?;
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.fail_subscribes.load(Ordering::SeqCst) {
            return Err(TransportError::subscribe_failed(filter, "broker rejected subscription"));
        }

        let retained: Vec<Message> = self
            .broker
            .inner
            .retained
            .lock()
            .values()
            .filter(|m| topic_matches(filter, &m.topic))
            .cloned()
            .collect();

        Ok(self
            .broker
            .inner
            .router
            .add_with_backlog(self.owner, filter, qos, retained))
    }

    async fn disconnect(&self, _grace: Duration) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.broker.inner.router.remove_owner(self.owner);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Topic {
        Topic::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_publish_reaches_other_client() {
        let broker = MemoryBroker::new();
        let a = broker.connect("a");
        let b = broker.connect("b");

        let mut sub = b.subscribe("iot/auth/challenge", QoS::AtLeastOnce).await.unwrap();
        a.publish(&topic("iot/auth/challenge"), Bytes::from_static(b"c1"), QoS::AtLeastOnce, false)
            .await
            .unwrap();

        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.topic, "iot/auth/challenge");
        assert_eq!(&msg.payload[..], b"c1");
        assert_eq!(msg.qos, QoS::AtLeastOnce);
        assert_eq!(broker.published_on("iot/auth/challenge").len(), 1);
    }

    #[tokio::test]
    async fn test_injected_publish_failure() {
        let broker = MemoryBroker::new();
        let a = broker.connect("a");
        a.set_fail_publishes(true);

        let err = a
            .publish(&topic("x"), Bytes::new(), QoS::AtMostOnce, false)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::PublishFailed { .. }));
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_injected_subscribe_failure() {
        let broker = MemoryBroker::new();
        let a = broker.connect("a");
        a.set_fail_subscribes(true);

        let err = a.subscribe("iot/auth/response", QoS::AtLeastOnce).await.unwrap_err();
        assert!(matches!(err, TransportError::SubscribeFailed { .. }));
        assert_eq!(broker.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_ends_subscriptions() {
        let broker = MemoryBroker::new();
        let a = broker.connect("a");
        let mut sub = a.subscribe("#", QoS::AtMostOnce).await.unwrap();

        a.disconnect(Duration::from_millis(250)).await.unwrap();
        assert!(!a.is_connected());
        assert!(sub.recv().await.is_none());
        assert!(matches!(
            a.publish(&topic("x"), Bytes::new(), QoS::AtMostOnce, false).await,
            Err(TransportError::NotConnected)
        ));
        // idempotent
        a.disconnect(Duration::from_millis(250)).await.unwrap();
    }

    #[tokio::test]
    async fn test_retained_delivered_on_subscribe() {
        let broker = MemoryBroker::new();
        let a = broker.connect("a");
        a.publish(&topic("status/a"), Bytes::from_static(b"up"), QoS::AtLeastOnce, true)
            .await
            .unwrap();

        let b = broker.connect("b");
        let mut sub = b.subscribe("status/+", QoS::AtLeastOnce).await.unwrap();
        assert_eq!(&sub.recv().await.unwrap().payload[..], b"up");
    }

    #[tokio::test]
    async fn test_invalid_filter_rejected() {
        let broker = MemoryBroker::new();
        let a = broker.connect("a");
        assert!(matches!(
            a.subscribe("a/#/b", QoS::AtMostOnce).await,
            Err(TransportError::InvalidTopicFilter { .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_connection() {
        let broker = MemoryBroker::new();
        let a = broker.connect("a");
        let mut sub = a.subscribe("x", QoS::AtMostOnce).await.unwrap();

        a.drop_connection();
        assert!(sub.recv().await.is_none());
        assert_eq!(broker.inject("x", Bytes::from_static(b"late")), 0);
    }
}
