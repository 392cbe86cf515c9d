// ============================================
// File: crates/devauth-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the publish/subscribe interface the peer roles are written
//! against, so they run unchanged over a real MQTT broker or the
//! in-memory broker used in tests.
//!
//! ## Main Functionality
//! - `PubSubTransport`: publish / subscribe / disconnect
//! - `QoS`: Delivery guarantee level
//! - `Message`: One delivered publish
//! - `Subscription`: Bounded queue of messages for one topic filter
//! - `ConnectOptions`: Everything needed to open a broker connection
//!
//! ## Design Philosophy
//! - Incoming messages are pushed into a bounded channel per subscription
//!   instead of invoking callbacks on the transport's own task. Consumers
//!   `recv().await` inside their own `select!`.
//! - The route for a subscription exists before the broker is asked to
//!   subscribe, so nothing published after `subscribe` returns is missed.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be Send + Sync for use in async contexts
//! - A full subscription queue drops new messages (with a warning) rather
//!   than stalling delivery to other subscriptions
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use devauth_common::types::Topic;

use crate::error::Result;

// ============================================
// Constants
// ============================================

/// Bound on the initial broker connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on handing a publish or subscribe to the client.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-subscription queue depth.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

// ============================================
// QoS
// ============================================

/// Delivery guarantee for a publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QoS {
    /// Fire and forget (QoS 0).
    AtMostOnce,
    /// Acknowledged, possibly duplicated (QoS 1).
    AtLeastOnce,
    /// Four-step handshake, no duplicates (QoS 2).
    ExactlyOnce,
}

impl QoS {
    /// Numeric MQTT level.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => Self::AtMostOnce,
            QoS::AtLeastOnce => Self::AtLeastOnce,
            QoS::ExactlyOnce => Self::ExactlyOnce,
        }
    }
}

impl From<rumqttc::QoS> for QoS {
    fn from(qos: rumqttc::QoS) -> Self {
        match qos {
            rumqttc::QoS::AtMostOnce => Self::AtMostOnce,
            rumqttc::QoS::AtLeastOnce => Self::AtLeastOnce,
            rumqttc::QoS::ExactlyOnce => Self::ExactlyOnce,
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QoS{}", self.level())
    }
}

// ============================================
// Message
// ============================================

/// A publish delivered to a subscription.
#[derive(Debug, Clone)]
pub struct Message {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw payload.
    pub payload: Bytes,
    /// QoS it was published with.
    pub qos: QoS,
    /// Whether the broker delivered it as a retained message.
    pub retain: bool,
    /// When it was handed to the subscription.
    pub received_at: Instant,
}

impl Message {
    /// Creates a message stamped with the current instant.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Bytes, qos: QoS, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            payload,
            qos,
            retain,
            received_at: Instant::now(),
        }
    }
}

// ============================================
// Subscription
// ============================================

/// Receiving end of one topic-filter subscription.
///
/// Dropping it stops delivery; the route is pruned on the next publish
/// that would have matched.
#[derive(Debug)]
pub struct Subscription {
    filter: String,
    rx: mpsc::Receiver<Message>,
}

impl Subscription {
    /// Wraps the receiving half of a route.
    #[must_use]
    pub fn new(filter: impl Into<String>, rx: mpsc::Receiver<Message>) -> Self {
        Self {
            filter: filter.into(),
            rx,
        }
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the transport has closed the subscription.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Returns a queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// The topic filter this subscription was made with.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

// ============================================
// ConnectOptions
// ============================================

/// Callback invoked when an established connection drops.
pub type ConnectionLostHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Options for opening a broker connection.
#[derive(Clone)]
pub struct ConnectOptions {
    /// Broker address (`tcp://host:port`, `mqtt://host:port` or `host:port`).
    pub broker_url: String,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Start a fresh broker session.
    pub clean_session: bool,
    /// Re-issue live subscriptions after a reconnect that lost the session.
    /// When `false` those subscriptions end instead.
    pub resume_subscriptions: bool,
    /// Keep reconnecting after the connection drops.
    pub auto_reconnect: bool,
    /// MQTT keep-alive interval.
    pub keep_alive: Duration,
    /// Queue depth for every subscription.
    pub channel_capacity: usize,
    /// Bound on the initial connection.
    pub connect_timeout: Duration,
    /// Called with a reason each time an established connection drops.
    pub on_connection_lost: Option<ConnectionLostHook>,
}

impl ConnectOptions {
    /// Creates options with the default session settings.
    #[must_use]
    pub fn new(broker_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            client_id: client_id.into(),
            clean_session: true,
            resume_subscriptions: true,
            auto_reconnect: true,
            keep_alive: Duration::from_secs(30),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            connect_timeout: CONNECT_TIMEOUT,
            on_connection_lost: None,
        }
    }

    /// Installs the connection-lost callback.
    #[must_use]
    pub fn with_connection_lost_hook(mut self, hook: ConnectionLostHook) -> Self {
        self.on_connection_lost = Some(hook);
        self
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("broker_url", &self.broker_url)
            .field("client_id", &self.client_id)
            .field("clean_session", &self.clean_session)
            .field("resume_subscriptions", &self.resume_subscriptions)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("keep_alive", &self.keep_alive)
            .field("channel_capacity", &self.channel_capacity)
            .field("connect_timeout", &self.connect_timeout)
            .field("on_connection_lost", &self.on_connection_lost.is_some())
            .finish()
    }
}

// ============================================
// PubSubTransport Trait
// ============================================

/// Abstract publish/subscribe transport.
///
/// Delivery is at least once at QoS 1 and above: consumers must tolerate
/// duplicates.
///
/// # Example
/// ```ignore
/// async fn echo<T: PubSubTransport>(transport: &T, from: &str, to: &Topic) -> Result<()> {
///     let mut sub = transport.subscribe(from, QoS::AtLeastOnce).await?;
///     while let Some(msg) = sub.recv().await {
///         transport.publish(to, msg.payload, QoS::AtLeastOnce, false).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Publishes `payload` on `topic`.
    ///
    /// Returns once the broker has acknowledged it (PUBACK/PUBCOMP), or
    /// once it is written for `AtMostOnce`.
    ///
    /// # Errors
    /// - `NotConnected` if the connection is down
    /// - `PublishFailed` / `Timeout` if the publish was not accepted
    async fn publish(&self, topic: &Topic, payload: Bytes, qos: QoS, retain: bool) -> Result<()>;

    /// Subscribes to a topic filter.
    ///
    /// Returns after the broker's SUBACK. The returned subscription
    /// receives every matching publish made after this call returns.
    ///
    /// # Errors
    /// - `InvalidTopicFilter` if `filter` is not valid MQTT syntax
    /// - `SubscribeFailed` if the broker refuses the filter
    /// - `Timeout` if no SUBACK arrives in time
    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<Subscription>;

    /// Disconnects, waiting at most `grace` for in-flight work.
    ///
    /// Idempotent. All subscriptions end after this returns.
    ///
    /// # Errors
    /// Implementations only report failures they cannot clean up after.
    async fn disconnect(&self, grace: Duration) -> Result<()>;

    /// Returns `true` while the broker connection is up.
    fn is_connected(&self) -> bool;

    /// Client identifier in use.
    fn client_id(&self) -> &str;
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_conversion() {
        for qos in [QoS::AtMostOnce, QoS::AtLeastOnce, QoS::ExactlyOnce] {
            let mqtt: rumqttc::QoS = qos.into();
            assert_eq!(QoS::from(mqtt), qos);
        }
        assert_eq!(QoS::AtLeastOnce.level(), 1);
        assert_eq!(QoS::ExactlyOnce.to_string(), "QoS2");
    }

    #[test]
    fn test_connect_options_defaults() {
        let opts = ConnectOptions::new("tcp://localhost:1883", "device1");
        assert!(opts.clean_session);
        assert!(opts.resume_subscriptions);
        assert!(opts.auto_reconnect);
        assert_eq!(opts.keep_alive, Duration::from_secs(30));
        assert_eq!(opts.connect_timeout, CONNECT_TIMEOUT);

        let debug = format!("{opts:?}");
        assert!(debug.contains("device1"));
        assert!(debug.contains("on_connection_lost: false"));
    }

    #[tokio::test]
    async fn test_subscription_recv() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = Subscription::new("a/b", rx);
        assert_eq!(sub.filter(), "a/b");
        assert!(sub.try_recv().is_none());

        tx.send(Message::new("a/b", Bytes::from_static(b"hi"), QoS::AtMostOnce, false))
            .await
            .unwrap();
        let msg = sub.recv().await.unwrap();
        assert_eq!(&msg.payload[..], b"hi");

        drop(tx);
        assert!(sub.recv().await.is_none());
    }
}
