// ============================================
// File: crates/devauth-transport/src/mqtt.rs
// ============================================
//! # MQTT Transport Implementation
//!
//! ## Creation Reason
//! Provides the production `PubSubTransport` over an MQTT 3.1.1 broker,
//! wrapping `rumqttc`'s client and event loop.
//!
//! ## Main Functionality
//! - `MqttTransport`: Connected client implementing `PubSubTransport`
//! - Event loop task that routes incoming publishes to subscriptions
//! - Publish/subscribe complete on the broker's PUBACK/PUBCOMP/SUBACK
//! - Connection-lost detection, reconnect and re-subscribe
//! - Bounded connect, bounded operations, graceful disconnect
//!
//! ## Connection Lifecycle
//! ```text
//!   connect() ──► spawn event loop ──► wait ConnAck (≤ connect_timeout)
//!                        │
//!                        ├─ Publish    → Router::dispatch
//!                        ├─ *Ack       → AckTracker (wakes the caller)
//!                        ├─ error      → fail pending acks, connection
//!                        │               lost hook, retry after
//!                        │               RECONNECT_DELAY
//!                        └─ ConnAck    → session lost: resubscribe live
//!                                        filters (or end them)
//!
//!   disconnect(grace) ──► DISCONNECT ──► join loop (≤ grace) ──► abort
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `rumqttc` only makes progress while `EventLoop::poll` is driven;
//!   never await a client request from inside the event loop task
//!   (use the `try_*` variants there)
//! - Requests are enqueued with `try_*` while holding the ack lock so the
//!   tracker sees them in the order the event loop writes them
//! - Only plain TCP is supported; TLS brokers are out of scope
//!
//! ## Last Modified
//! v0.1.0 - Initial MQTT transport implementation

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, SubscribeReasonCode,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use devauth_common::types::Topic;

use crate::acks::{AckTracker, AckWaiter};
use crate::error::{Result, TransportError};
use crate::router::Router;
use crate::topic::validate_filter;
use crate::traits::{
    ConnectOptions, ConnectionLostHook, Message, PubSubTransport, QoS, Subscription,
    OPERATION_TIMEOUT,
};

// ============================================
// Constants
// ============================================

/// Default MQTT port.
pub const DEFAULT_PORT: u16 = 1883;

/// Pause between reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Minimum capacity of the client request queue.
const MIN_REQUEST_CAPACITY: usize = 10;

/// Route owner for the single client of this transport.
const LOCAL_OWNER: u64 = 0;

// ============================================
// Broker URL
// ============================================

/// Splits a broker URL into host and port.
///
/// Accepts `tcp://host:port`, `mqtt://host:port` and bare `host[:port]`.
///
/// # Errors
/// Returns `InvalidBrokerUrl` for other schemes, an empty host or a bad port.
pub fn parse_broker_url(url: &str) -> Result<(String, u16)> {
    let rest = match url.split_once("://") {
        Some(("tcp" | "mqtt", rest)) => rest,
        Some((scheme, _)) => {
            return Err(TransportError::invalid_url(
                url,
                format!("unsupported scheme '{scheme}'"),
            ))
        }
        None => url,
    };
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) if !host.ends_with(':') => {
            let port = port
                .parse::<u16>()
                .map_err(|e| TransportError::invalid_url(url, format!("bad port: {e}")))?;
            (host, port)
        }
        _ => (rest, DEFAULT_PORT),
    };

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(TransportError::invalid_url(url, "missing host"));
    }
    Ok((host.to_owned(), port))
}

// ============================================
// Shared State
// ============================================

struct Shared {
    router: Router,
    acks: Mutex<AckTracker>,
    connected: AtomicBool,
    closing: AtomicBool,
    connection_losses: AtomicU64,
}

struct LoopSettings {
    auto_reconnect: bool,
    resume_subscriptions: bool,
    on_connection_lost: Option<ConnectionLostHook>,
}

// ============================================
// MqttTransport
// ============================================

/// MQTT-backed `PubSubTransport`.
///
/// # Example
/// ```ignore
/// use devauth_transport::{ConnectOptions, MqttTransport, PubSubTransport, QoS};
///
/// let transport = MqttTransport::connect(
///     ConnectOptions::new("tcp://localhost:1883", "device1-verifier"),
/// ).await?;
/// let mut responses = transport.subscribe("iot/auth/response", QoS::AtLeastOnce).await?;
/// ```
pub struct MqttTransport {
    client: AsyncClient,
    shared: Arc<Shared>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    client_id: String,
    broker: String,
}

impl MqttTransport {
    /// Connects to the broker and waits for the session to be accepted.
    ///
    /// # Errors
    /// - `InvalidBrokerUrl` if the URL cannot be parsed
    /// - `ConnectFailed` if the broker refuses or is unreachable
    /// - `Timeout` if no ConnAck arrives within `connect_timeout`
    pub async fn connect(options: ConnectOptions) -> Result<Self> {
        let (host, port) = parse_broker_url(&options.broker_url)?;
        let broker = format!("{host}:{port}");

        let mut mqtt = MqttOptions::new(options.client_id.clone(), host, port);
        mqtt.set_keep_alive(options.keep_alive);
        mqtt.set_clean_session(options.clean_session);

        let (client, event_loop) =
            AsyncClient::new(mqtt, options.channel_capacity.max(MIN_REQUEST_CAPACITY));

        let shared = Arc::new(Shared {
            router: Router::new(options.channel_capacity),
            acks: Mutex::new(AckTracker::default()),
            connected: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            connection_losses: AtomicU64::new(0),
        });
        let settings = LoopSettings {
            auto_reconnect: options.auto_reconnect,
            resume_subscriptions: options.resume_subscriptions,
            on_connection_lost: options.on_connection_lost.clone(),
        };

        info!(
            broker = %broker,
            client_id = %options.client_id,
            clean_session = options.clean_session,
            "Connecting to MQTT broker"
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            Arc::clone(&shared),
            settings,
            ready_tx,
        ));

        let outcome = match timeout(options.connect_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(TransportError::connect_failed(&broker, reason)),
            Ok(Err(_)) => Err(TransportError::connect_failed(&broker, "event loop exited")),
            Err(_) => Err(TransportError::timeout(
                format!("connect to {broker}"),
                options.connect_timeout,
            )),
        };
        if let Err(e) = outcome {
            shared.closing.store(true, Ordering::SeqCst);
            handle.abort();
            return Err(e);
        }

        info!(broker = %broker, client_id = %options.client_id, "Connected to MQTT broker");

        Ok(Self {
            client,
            shared,
            event_loop: Mutex::new(Some(handle)),
            client_id: options.client_id,
            broker,
        })
    }

    /// Number of times an established connection has dropped.
    #[must_use]
    pub fn connection_losses(&self) -> u64 {
        self.shared.connection_losses.load(Ordering::Relaxed)
    }

    /// Broker address as `host:port`.
    #[must_use]
    pub fn broker(&self) -> &str {
        &self.broker
    }
}

#[async_trait]
impl PubSubTransport for MqttTransport {
    async fn publish(&self, topic: &Topic, payload: Bytes, qos: QoS, retain: bool) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let len = payload.len();

        let waiter = {
            let mut acks = self.shared.acks.lock();
            let waiter = acks.expect_publish();
            if let Err(e) = self
                .client
                .try_publish(topic.as_str(), qos.into(), retain, payload.to_vec())
            {
                acks.cancel_last_publish();
                return Err(TransportError::publish_failed(topic.as_str(), e.to_string()));
            }
            waiter
        };

        await_ack(waiter, &format!("publish to {topic}"))
            .await
            .map_err(|failure| failure.into_error(|reason| {
                TransportError::publish_failed(topic.as_str(), reason)
            }))?;

        trace!(topic = %topic, %qos, bytes = len, "Published");
        Ok(())
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<Subscription> {
        validate_filter(filter)?;
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        // Route first: a publish racing the SUBACK must still be delivered.
        let subscription = self.shared.router.add(LOCAL_OWNER, filter, qos);

        let waiter = {
            let mut acks = self.shared.acks.lock();
            let waiter = acks.expect_subscribe();
            if let Err(e) = self.client.try_subscribe(filter, qos.into()) {
                acks.cancel_last_subscribe();
                return Err(TransportError::subscribe_failed(filter, e.to_string()));
            }
            waiter
        };

        // On failure the subscription is dropped and its route pruned.
        await_ack(waiter, &format!("subscribe to {filter}"))
            .await
            .map_err(|failure| failure.into_error(|reason| {
                TransportError::subscribe_failed(filter, reason)
            }))?;

        debug!(filter = %filter, %qos, "Subscribed");
        Ok(subscription)
    }

    async fn disconnect(&self, grace: Duration) -> Result<()> {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "DISCONNECT could not be queued");
        }

        let handle = self.event_loop.lock().take();
        if let Some(mut handle) = handle {
            if timeout(grace, &mut handle).await.is_err() {
                warn!(grace_ms = grace.as_millis(), "Event loop did not stop in time, aborting");
                handle.abort();
            }
        }

        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.router.clear();
        info!(broker = %self.broker, client_id = %self.client_id, "Disconnected from MQTT broker");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.event_loop.lock().take() {
            handle.abort();
        }
    }
}

// ============================================
// Event Loop
// ============================================

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    shared: Arc<Shared>,
    settings: LoopSettings,
    ready: oneshot::Sender<std::result::Result<(), String>>,
) {
    let mut ready = Some(ready);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                shared.connected.store(true, Ordering::SeqCst);
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                } else {
                    info!(session_present = ack.session_present, "Reconnected to broker");
                    restore_subscriptions(
                        &client,
                        &shared,
                        settings.resume_subscriptions,
                        ack.session_present,
                    );
                }
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => shared.acks.lock().publish_sent(pkid),
            Ok(Event::Outgoing(Outgoing::Subscribe(pkid))) => {
                shared.acks.lock().subscribe_sent(pkid);
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => shared.acks.lock().publish_acked(ack.pkid),
            Ok(Event::Incoming(Packet::PubComp(comp))) => {
                shared.acks.lock().publish_acked(comp.pkid);
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                let rejected = ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure));
                if rejected {
                    warn!(pkid = ack.pkid, "Broker rejected a subscription");
                }
                shared.acks.lock().subscribe_acked(ack.pkid, rejected);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = Message::new(
                    publish.topic,
                    publish.payload,
                    publish.qos.into(),
                    publish.retain,
                );
                let delivered = shared.router.dispatch(&message);
                trace!(topic = %message.topic, delivered, "Incoming publish");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("DISCONNECT sent, stopping event loop");
                break;
            }
            Ok(event) => trace!(?event, "MQTT event"),
            Err(e) => {
                if shared.closing.load(Ordering::SeqCst) {
                    break;
                }
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(e.to_string()));
                    break;
                }
                fail_pending(&shared, &format!("connection lost: {e}"));
                if shared.connected.swap(false, Ordering::SeqCst) {
                    let losses = shared.connection_losses.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(error = %e, losses, "Connection to broker lost");
                    if let Some(hook) = &settings.on_connection_lost {
                        hook(&e.to_string());
                    }
                }
                if !settings.auto_reconnect {
                    break;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    fail_pending(&shared, "event loop stopped");
    // Ends every subscription so consumers see `None`.
    shared.router.clear();
}

fn fail_pending(shared: &Shared, reason: &str) {
    let mut acks = shared.acks.lock();
    let pending = acks.pending();
    if pending > 0 {
        debug!(pending, reason, "Failing requests awaiting acknowledgement");
        acks.fail_all(reason);
    }
}

/// Handles a reconnect. Returns the number of filters re-subscribed.
fn restore_subscriptions(
    client: &AsyncClient,
    shared: &Shared,
    resume_subscriptions: bool,
    session_present: bool,
) -> usize {
    if session_present {
        return 0;
    }
    let filters = shared.router.active_filters();
    if filters.is_empty() {
        return 0;
    }
    if !resume_subscriptions {
        warn!(lost = filters.len(), "Broker session lost, ending subscriptions");
        shared.router.clear();
        return 0;
    }

    let mut acks = shared.acks.lock();
    let mut restored = 0;
    for (filter, qos) in filters {
        acks.expect_untracked_subscribe();
        match client.try_subscribe(filter.as_str(), qos.into()) {
            Ok(()) => {
                restored += 1;
                debug!(filter = %filter, "Resubscribing");
            }
            Err(e) => {
                acks.cancel_last_subscribe();
                warn!(filter = %filter, error = %e, "Resubscribe failed");
            }
        }
    }
    info!(restored, "Restored subscriptions after session loss");
    restored
}

// ============================================
// Acknowledgements
// ============================================

enum AckFailure {
    Rejected(String),
    TimedOut(String),
}

impl AckFailure {
    fn into_error(self, rejected: impl FnOnce(String) -> TransportError) -> TransportError {
        match self {
            Self::Rejected(reason) => rejected(reason),
            Self::TimedOut(operation) => TransportError::timeout(operation, OPERATION_TIMEOUT),
        }
    }
}

/// Waits for the broker to acknowledge a request, bounded by
/// `OPERATION_TIMEOUT`.
async fn await_ack(waiter: AckWaiter, operation: &str) -> std::result::Result<(), AckFailure> {
    match timeout(OPERATION_TIMEOUT, waiter).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(reason))) => Err(AckFailure::Rejected(reason)),
        Ok(Err(_)) => Err(AckFailure::Rejected("connection closed before acknowledgement".to_owned())),
        Err(_) => Err(AckFailure::TimedOut(operation.to_owned())),
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_broker_url() {
        assert_eq!(
            parse_broker_url("tcp://localhost:1883").unwrap(),
            ("localhost".to_owned(), 1883)
        );
        assert_eq!(
            parse_broker_url("mqtt://10.0.0.5:8883/").unwrap(),
            ("10.0.0.5".to_owned(), 8883)
        );
        assert_eq!(
            parse_broker_url("broker.local").unwrap(),
            ("broker.local".to_owned(), DEFAULT_PORT)
        );
        assert_eq!(
            parse_broker_url("[::1]:1884").unwrap(),
            ("::1".to_owned(), 1884)
        );
    }

    #[test]
    fn test_parse_broker_url_errors() {
        assert!(matches!(
            parse_broker_url("ssl://localhost:8883"),
            Err(TransportError::InvalidBrokerUrl { .. })
        ));
        assert!(parse_broker_url("tcp://localhost:notaport").is_err());
        assert!(parse_broker_url("tcp://:1883").is_err());
        assert!(parse_broker_url("tcp://localhost:70000").is_err());
    }

    fn test_shared() -> Shared {
        Shared {
            router: Router::new(8),
            acks: Mutex::new(AckTracker::default()),
            connected: AtomicBool::new(true),
            closing: AtomicBool::new(false),
            connection_losses: AtomicU64::new(0),
        }
    }

    #[tokio::test]
    async fn test_reconnect_restores_live_subscriptions() {
        let (client, _event_loop) =
            AsyncClient::new(MqttOptions::new("devauth-test", "localhost", DEFAULT_PORT), 10);
        let shared = test_shared();
        let _challenges = shared.router.add(LOCAL_OWNER, "iot/auth/challenge", QoS::AtLeastOnce);
        let _replies = shared.router.add(LOCAL_OWNER, "device2/response", QoS::AtMostOnce);
        drop(shared.router.add(LOCAL_OWNER, "stale/topic", QoS::AtMostOnce));

        // broker kept the session
        assert_eq!(restore_subscriptions(&client, &shared, true, true), 0);
        assert_eq!(shared.acks.lock().pending(), 0);

        assert_eq!(restore_subscriptions(&client, &shared, true, false), 2);
        let mut acks = shared.acks.lock();
        assert_eq!(acks.pending(), 2);
        acks.subscribe_sent(1);
        acks.subscribe_sent(2);
        acks.subscribe_acked(1, false);
        acks.subscribe_acked(2, true);
        assert_eq!(acks.pending(), 0);
    }

    #[tokio::test]
    async fn test_reconnect_without_resume_ends_subscriptions() {
        let (client, _event_loop) =
            AsyncClient::new(MqttOptions::new("devauth-test", "localhost", DEFAULT_PORT), 10);
        let shared = test_shared();
        let mut challenges = shared.router.add(LOCAL_OWNER, "iot/auth/challenge", QoS::AtLeastOnce);

        assert_eq!(restore_subscriptions(&client, &shared, false, false), 0);
        assert!(challenges.recv().await.is_none());
        assert_eq!(shared.acks.lock().pending(), 0);
    }

    #[tokio::test]
    async fn test_connection_loss_fails_waiting_requests() {
        let shared = test_shared();
        let publish = shared.acks.lock().expect_publish();
        let subscribe = shared.acks.lock().expect_subscribe();

        fail_pending(&shared, "connection lost: reset by peer");

        let err = await_ack(publish, "publish to iot/auth/challenge")
            .await
            .err()
            .unwrap()
            .into_error(|reason| TransportError::publish_failed("iot/auth/challenge", reason));
        assert!(matches!(err, TransportError::PublishFailed { .. }));
        assert!(err.to_string().contains("reset by peer"));

        let err = await_ack(subscribe, "subscribe to iot/auth/response")
            .await
            .err()
            .unwrap()
            .into_error(|reason| TransportError::subscribe_failed("iot/auth/response", reason));
        assert!(matches!(err, TransportError::SubscribeFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_ack_times_out() {
        let shared = test_shared();
        let waiter = shared.acks.lock().expect_publish();

        let err = await_ack(waiter, "publish to iot/auth/challenge")
            .await
            .err()
            .unwrap()
            .into_error(|reason| TransportError::publish_failed("iot/auth/challenge", reason));
        assert!(matches!(err, TransportError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let mut options = ConnectOptions::new("tcp://127.0.0.1:1", "devauth-test");
        options.connect_timeout = Duration::from_secs(2);
        options.auto_reconnect = false;

        let err = MqttTransport::connect(options).await.err().unwrap();
        assert!(matches!(
            err,
            TransportError::ConnectFailed { .. } | TransportError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url_before_io() {
        let err = MqttTransport::connect(ConnectOptions::new("ws://x", "id"))
            .await
            .err()
            .unwrap();
        assert!(err.is_connection_error());
    }
}
