// ============================================
// File: crates/devauth-peer/src/services/responder.rs
// ============================================
//! # Responder (Prover Role)
//!
//! ## Creation Reason
//! Answers every challenge seen on the challenge topic with a detached
//! signature, proving possession of the device private key.
//!
//! ## Main Functionality
//! - `Responder::serve`: Subscription loop until shutdown
//! - `ResponderStats`: Received / signed / dropped counters
//!
//! ## ⚠️ Important Note for Next Developer
//! - Each challenge is handled on its own task. The only state shared
//!   between tasks is the signer (immutable key) and the counters.
//! - A challenge that cannot be answered is dropped WITHOUT a reply;
//!   the verifier then times out. Do not publish error payloads here.
//! - Duplicate deliveries (QoS1) are answered again, not deduplicated
//!
//! ## Last Modified
//! v0.1.0 - Initial responder

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use devauth_common::types::Topic;
use devauth_core::protocol::{Challenge, SignedResponse};
use devauth_core::CryptoSigner;
use devauth_transport::{Message, PubSubTransport};

use super::authenticator::AUTH_QOS;
use super::shutdown::ShutdownListener;
use crate::error::{PeerError, Result};

// ============================================
// ResponderStats
// ============================================

/// Point-in-time copy of the responder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponderStatsSnapshot {
    /// Messages taken off the challenge topic.
    pub received: u64,
    /// Responses published.
    pub signed: u64,
    /// Messages that produced no response.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct ResponderStats {
    received: AtomicU64,
    signed: AtomicU64,
    dropped: AtomicU64,
}

impl ResponderStats {
    fn snapshot(&self) -> ResponderStatsSnapshot {
        ResponderStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            signed: self.signed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

// ============================================
// Responder
// ============================================

/// Prover side of the challenge/response exchange.
pub struct Responder {
    transport: Arc<dyn PubSubTransport>,
    signer: Arc<dyn CryptoSigner>,
    challenge_topic: Topic,
    response_topic: Topic,
    stats: Arc<ResponderStats>,
}

impl Responder {
    /// Creates a responder that signs with `signer`.
    pub fn new(
        transport: Arc<dyn PubSubTransport>,
        signer: Arc<dyn CryptoSigner>,
        challenge_topic: Topic,
        response_topic: Topic,
    ) -> Self {
        Self {
            transport,
            signer,
            challenge_topic,
            response_topic,
            stats: Arc::new(ResponderStats::default()),
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> ResponderStatsSnapshot {
        self.stats.snapshot()
    }

    /// Answers challenges until shutdown is signalled.
    ///
    /// # Errors
    /// - Transport error if the challenge subscription cannot be opened
    /// - `SubscriptionClosed` if the transport ends the subscription
    pub async fn serve(&self, shutdown: &mut ShutdownListener) -> Result<()> {
        let mut challenges = self
            .transport
            .subscribe(self.challenge_topic.as_str(), AUTH_QOS)
            .await?;
        info!(topic = %self.challenge_topic, "Responder waiting for challenges");

        let mut tasks = JoinSet::new();
        let result = loop {
            tokio::select! {
                biased;
                () = shutdown.recv() => {
                    debug!("Responder received shutdown signal");
                    break Ok(());
                }
                message = challenges.recv() => {
                    let Some(message) = message else {
                        break Err(PeerError::subscription_closed(self.challenge_topic.as_str()));
                    };
                    self.stats.received.fetch_add(1, Ordering::Relaxed);
                    tasks.spawn(answer(
                        message,
                        Arc::clone(&self.transport),
                        Arc::clone(&self.signer),
                        self.response_topic.clone(),
                        Arc::clone(&self.stats),
                    ));
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Challenge task panicked");
                        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        };

        tasks.shutdown().await;
        let stats = self.stats();
        info!(
            received = stats.received,
            signed = stats.signed,
            dropped = stats.dropped,
            "Responder stopped"
        );
        result
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("client_id", &self.transport.client_id())
            .field("challenge_topic", &self.challenge_topic)
            .field("response_topic", &self.response_topic)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Signs one challenge and publishes the response.
async fn answer(
    message: Message,
    transport: Arc<dyn PubSubTransport>,
    signer: Arc<dyn CryptoSigner>,
    response_topic: Topic,
    stats: Arc<ResponderStats>,
) {
    let challenge = match Challenge::from_wire(&message.payload) {
        Ok(challenge) => challenge,
        Err(e) => {
            warn!(topic = %message.topic, error = %e, "Dropping unreadable challenge");
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let signature = match signer.sign(challenge.as_bytes()) {
        Ok(signature) => signature,
        Err(e) => {
            warn!(challenge = %challenge, error = %e, "Signing failed, challenge dropped");
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let response = SignedResponse::new(signature);
    let payload = Bytes::from(response.encode());
    match transport.publish(&response_topic, payload, AUTH_QOS, false).await {
        Ok(()) => {
            stats.signed.fetch_add(1, Ordering::Relaxed);
            debug!(
                challenge = %challenge,
                signature_len = response.as_bytes().len(),
                "Challenge answered"
            );
        }
        Err(e) => {
            warn!(challenge = %challenge, error = %e, "Failed to publish response");
            stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::services::shutdown::ShutdownSignal;
    use crate::services::test_keys;
    use devauth_core::error::CoreError;
    use devauth_core::{CryptoVerifier, RsaVerifier};
    use devauth_transport::memory::MemoryBroker;
    use devauth_transport::QoS;

    const CHALLENGE_TOPIC: &str = "iot/auth/challenge";
    const RESPONSE_TOPIC: &str = "iot/auth/response";

    struct FailingSigner;

    impl CryptoSigner for FailingSigner {
        fn sign(&self, _message: &[u8]) -> devauth_core::Result<Vec<u8>> {
            Err(CoreError::signing("key rejected digest"))
        }
    }

    fn responder(broker: &MemoryBroker, signer: Arc<dyn CryptoSigner>) -> Arc<Responder> {
        Arc::new(Responder::new(
            Arc::new(broker.connect("prover")),
            signer,
            Topic::new(CHALLENGE_TOPIC).unwrap(),
            Topic::new(RESPONSE_TOPIC).unwrap(),
        ))
    }

    fn spawn(responder: &Arc<Responder>, shutdown: &ShutdownSignal) -> tokio::task::JoinHandle<Result<()>> {
        let responder = Arc::clone(responder);
        let mut listener = shutdown.subscribe();
        tokio::spawn(async move { responder.serve(&mut listener).await })
    }

    async fn settle(broker: &MemoryBroker) {
        while broker.subscription_count() < 2 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_signs_trimmed_challenge() {
        let broker = MemoryBroker::new();
        let shutdown = ShutdownSignal::new();
        let responder = responder(&broker, Arc::new(test_keys::signer()));
        let handle = spawn(&responder, &shutdown);

        let observer = broker.connect("observer");
        let mut responses = observer.subscribe(RESPONSE_TOPIC, QoS::AtLeastOnce).await.unwrap();
        settle(&broker).await;

        broker.inject(CHALLENGE_TOPIC, &b"  abc123\n"[..]);
        let message = tokio::time::timeout(Duration::from_secs(5), responses.recv())
            .await
            .unwrap()
            .unwrap();

        let response = SignedResponse::decode(&message.payload).unwrap();
        let verifier = RsaVerifier::new(test_keys::verifier_key());
        assert!(verifier.verify(b"abc123", response.as_bytes()));
        assert!(!verifier.verify(b"xyz789", response.as_bytes()));
        assert_eq!(message.qos, QoS::AtLeastOnce);

        shutdown.trigger();
        handle.await.unwrap().unwrap();
        assert_eq!(responder.stats().signed, 1);
    }

    #[tokio::test]
    async fn test_non_utf8_challenge_dropped() {
        let broker = MemoryBroker::new();
        let shutdown = ShutdownSignal::new();
        let responder = responder(&broker, Arc::new(test_keys::signer()));
        let handle = spawn(&responder, &shutdown);

        let observer = broker.connect("observer");
        let mut responses = observer.subscribe(RESPONSE_TOPIC, QoS::AtLeastOnce).await.unwrap();
        settle(&broker).await;

        broker.inject(CHALLENGE_TOPIC, vec![0xff, 0xfe, 0x00]);
        broker.inject(CHALLENGE_TOPIC, &b"next"[..]);

        // Only the valid challenge produces a response.
        let message = tokio::time::timeout(Duration::from_secs(5), responses.recv())
            .await
            .unwrap()
            .unwrap();
        let verifier = RsaVerifier::new(test_keys::verifier_key());
        let response = SignedResponse::decode(&message.payload).unwrap();
        assert!(verifier.verify(b"next", response.as_bytes()));
        while responder.stats().dropped < 1 {
            tokio::task::yield_now().await;
        }

        shutdown.trigger();
        handle.await.unwrap().unwrap();
        let stats = responder.stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.dropped, 1);
        assert!(responses.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_signing_failure_sends_nothing() {
        let broker = MemoryBroker::new();
        let shutdown = ShutdownSignal::new();
        let responder = responder(&broker, Arc::new(FailingSigner));
        let handle = spawn(&responder, &shutdown);
        while broker.subscription_count() < 1 {
            tokio::task::yield_now().await;
        }

        broker.inject(CHALLENGE_TOPIC, &b"abc123"[..]);
        while responder.stats().dropped < 1 {
            tokio::task::yield_now().await;
        }

        shutdown.trigger();
        handle.await.unwrap().unwrap();
        assert!(broker.published_on(RESPONSE_TOPIC).is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_challenges_each_answered() {
        let broker = MemoryBroker::new();
        let shutdown = ShutdownSignal::new();
        let responder = responder(&broker, Arc::new(test_keys::signer()));
        let handle = spawn(&responder, &shutdown);
        while broker.subscription_count() < 1 {
            tokio::task::yield_now().await;
        }

        for _ in 0..3 {
            broker.inject(CHALLENGE_TOPIC, &b"abc123"[..]);
        }
        while responder.stats().signed < 3 {
            tokio::task::yield_now().await;
        }

        shutdown.trigger();
        handle.await.unwrap().unwrap();
        assert_eq!(broker.published_on(RESPONSE_TOPIC).len(), 3);
    }

    #[tokio::test]
    async fn test_closed_subscription_is_error() {
        let broker = MemoryBroker::new();
        let shutdown = ShutdownSignal::new();
        let transport = Arc::new(broker.connect("prover"));
        let responder = Arc::new(Responder::new(
            transport.clone(),
            Arc::new(test_keys::signer()),
            Topic::new(CHALLENGE_TOPIC).unwrap(),
            Topic::new(RESPONSE_TOPIC).unwrap(),
        ));
        let handle = spawn(&responder, &shutdown);
        while broker.subscription_count() < 1 {
            tokio::task::yield_now().await;
        }

        transport.drop_connection();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(PeerError::SubscriptionClosed { .. })));
    }
}
