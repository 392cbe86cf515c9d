// ============================================
// File: crates/devauth-peer/src/node.rs
// ============================================
//! # Peer Orchestrator
//!
//! ## Creation Reason
//! Wires configuration, keys and a broker connection into one of the
//! peer roles and guarantees the connection is released afterwards.
//!
//! ## Main Functionality
//! - `Peer`: Role entry points (`authenticate`, `respond`, `send`, `listen`)
//! - `*_over` variants: Same roles over an already-open transport
//! - OS signal handling (Ctrl+C / SIGTERM) feeding the shutdown signal
//!
//! ## Peer Lifecycle
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │  Load keys   │──►│   Connect    │──►│   Run role   │──►│  Disconnect    │
//! │  (PEM / hex) │   │ (10s bound)  │   │ until done / │   │ (250ms grace,  │
//! │              │   │              │   │  shutdown    │   │  ALWAYS runs)  │
//! └──────────────┘   └──────────────┘   └──────────────┘   └────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Keys are loaded BEFORE connecting so a bad key file never opens a
//!   broker session.
//! - With `auto_reconnect = false` a lost connection triggers shutdown
//! - Connect failures are returned, not retried. Shutdown during the
//!   connect abandons it with `StartupFailed`.
//!
//! ## Last Modified
//! v0.1.0 - Initial peer orchestrator

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use devauth_core::{
    KeyProvider, PemKeyProvider, RsaSigner, RsaVerifier, SymmetricCipher,
};
use devauth_transport::{MqttTransport, PubSubTransport};

use crate::config::{PeerConfig, Role};
use crate::error::{PeerError, Result};
use crate::services::{
    acknowledgement, AuthReport, Authenticator, Responder, ResponderStatsSnapshot,
    SecureChannel, ShutdownListener, ShutdownSignal,
};

/// Time allowed for a clean MQTT DISCONNECT before the connection is dropped.
pub const DISCONNECT_GRACE: Duration = Duration::from_millis(250);

// ============================================
// Peer
// ============================================

/// One device running one role.
pub struct Peer {
    config: PeerConfig,
    shutdown: ShutdownSignal,
}

impl Peer {
    /// Creates a peer from validated configuration.
    #[must_use]
    pub fn new(config: PeerConfig) -> Self {
        Self {
            config,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Configuration this peer runs with.
    #[must_use]
    pub const fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Handle that stops whatever role is running.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Triggers shutdown on Ctrl+C or SIGTERM.
    pub fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            wait_for_os_signal().await;
            info!("Received shutdown signal");
            shutdown.trigger();
        })
    }

    // ========================================
    // Roles over a fresh broker connection
    // ========================================

    /// Runs one authentication attempt as the verifier.
    ///
    /// # Errors
    /// Key, configuration or connect failures. The attempt outcome itself
    /// is in the report.
    pub async fn authenticate(&self) -> Result<AuthReport> {
        let verifier = self.load_verifier()?;
        let transport = self.connect(Role::Verifier).await?;
        let result = self.authenticate_over(transport.clone(), verifier).await;
        release(&transport).await;
        result
    }

    /// Answers challenges as the prover until shutdown.
    ///
    /// # Errors
    /// Key, configuration, connect or subscription failures.
    pub async fn respond(&self) -> Result<ResponderStatsSnapshot> {
        let signer = self.load_signer()?;
        let transport = self.connect(Role::Responder).await?;
        let result = self.respond_over(transport.clone(), signer).await;
        release(&transport).await;
        result
    }

    /// Sends `message` over the secure channel, then collects replies
    /// until shutdown. Returns the number of replies.
    ///
    /// # Errors
    /// Configuration, connect, publish or subscription failures.
    pub async fn send(&self, message: &str) -> Result<u64> {
        let cipher = self.cipher()?;
        let transport = self.connect(Role::Sender).await?;
        let result = self.send_over(transport.clone(), cipher, message).await;
        release(&transport).await;
        result
    }

    /// Receives secure channel messages until shutdown. Returns the number
    /// of messages received.
    ///
    /// # Errors
    /// Configuration, connect or subscription failures.
    pub async fn listen(&self) -> Result<u64> {
        let cipher = self.cipher()?;
        let transport = self.connect(Role::Listener).await?;
        let result = self.listen_over(transport.clone(), cipher).await;
        release(&transport).await;
        result
    }

    // ========================================
    // Roles over an existing transport
    // ========================================

    /// Verifier role over `transport`. Does not disconnect it.
    ///
    /// # Errors
    /// Returns error if the topics are invalid.
    pub async fn authenticate_over(
        &self,
        transport: Arc<dyn PubSubTransport>,
        verifier: RsaVerifier,
    ) -> Result<AuthReport> {
        let topics = self.config.topics.parse()?;
        let authenticator =
            Authenticator::new(transport, Arc::new(verifier), topics.challenge, topics.response);
        let mut shutdown = self.shutdown.subscribe();
        Ok(authenticator.authenticate(&mut shutdown).await)
    }

    /// Prover role over `transport`. Does not disconnect it.
    ///
    /// # Errors
    /// Returns error if the topics are invalid or the subscription fails.
    pub async fn respond_over(
        &self,
        transport: Arc<dyn PubSubTransport>,
        signer: RsaSigner,
    ) -> Result<ResponderStatsSnapshot> {
        let topics = self.config.topics.parse()?;
        let responder = Responder::new(transport, Arc::new(signer), topics.challenge, topics.response);
        let mut shutdown = self.shutdown.subscribe();
        responder.serve(&mut shutdown).await?;
        Ok(responder.stats())
    }

    /// Sender role over `transport`. Does not disconnect it.
    ///
    /// # Errors
    /// Returns error if the topics are invalid or the transport fails.
    pub async fn send_over(
        &self,
        transport: Arc<dyn PubSubTransport>,
        cipher: SymmetricCipher,
        message: &str,
    ) -> Result<u64> {
        let topics = self.config.topics.parse()?;
        let channel = SecureChannel::new(transport, cipher, topics.data, topics.data_response);

        // Subscribe first so an immediate reply is not lost.
        let mut replies = channel.subscribe().await?;
        let mut shutdown = self.shutdown.subscribe();

        channel.send(message.as_bytes()).await?;
        info!(topic = %channel.outbound(), "📤 Sent secure message");

        let mut received = 0u64;
        loop {
            tokio::select! {
                biased;
                () = shutdown.recv() => break,
                reply = replies.recv() => {
                    let reply = reply?;
                    received += 1;
                    info!(topic = %reply.topic, text = %reply.text(), "📩 Received reply");
                }
            }
        }
        debug!(received, skipped = replies.skipped(), "Sender stopped");
        Ok(received)
    }

    /// Listener role over `transport`. Does not disconnect it.
    ///
    /// # Errors
    /// Returns error if the topics are invalid or the subscription fails.
    pub async fn listen_over(
        &self,
        transport: Arc<dyn PubSubTransport>,
        cipher: SymmetricCipher,
    ) -> Result<u64> {
        let topics = self.config.topics.parse()?;
        let channel = SecureChannel::new(transport, cipher, topics.data_response, topics.data);
        let mut inbox = channel.subscribe().await?;
        let mut shutdown = self.shutdown.subscribe();
        info!(topic = %channel.inbound(), "📡 Listening for secure messages");

        let mut received = 0u64;
        loop {
            tokio::select! {
                biased;
                () = shutdown.recv() => break,
                message = inbox.recv() => {
                    let message = message?;
                    received += 1;
                    info!(topic = %message.topic, text = %message.text(), "📩 Received secure message");

                    if self.config.channel.reply_on_receive {
                        let reply = acknowledgement(Utc::now());
                        if let Err(e) = channel.send(reply.as_bytes()).await {
                            warn!(error = %e, "Failed to send acknowledgement");
                        }
                    }
                }
            }
        }
        info!(received, skipped = inbox.skipped(), "Listener stopped");
        Ok(received)
    }

    // ========================================
    // Helpers
    // ========================================

    fn key_provider(&self) -> PemKeyProvider {
        PemKeyProvider::new()
            .with_private_key(&self.config.keys.private_key_file)
            .with_public_key(&self.config.keys.public_key_file)
    }

    /// Loads the prover key from the configured PEM file.
    ///
    /// # Errors
    /// Returns `KeyLoad` if the file is missing or not an RSA private key.
    pub fn load_signer(&self) -> Result<RsaSigner> {
        let key = self.key_provider().load_prover_key()?;
        info!(bits = key.size() * 8, "Loaded private key");
        Ok(RsaSigner::new(key))
    }

    /// Loads the verifier key from the configured PEM file.
    ///
    /// # Errors
    /// Returns `KeyLoad` if the file is missing or not an RSA public key.
    pub fn load_verifier(&self) -> Result<RsaVerifier> {
        let key = self.key_provider().load_verifier_key()?;
        info!(bits = key.size() * 8, "Loaded public key");
        Ok(RsaVerifier::new(key))
    }

    /// Builds the channel cipher from the configured shared key.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the key is malformed.
    pub fn cipher(&self) -> Result<SymmetricCipher> {
        if self.config.channel.uses_default_key() {
            warn!("Using the built-in shared key; set [channel] shared_key_hex");
        }
        Ok(SymmetricCipher::with_key(self.config.shared_key()?))
    }

    async fn connect(&self, role: Role) -> Result<Arc<MqttTransport>> {
        let shutdown = self.shutdown.clone();
        let auto_reconnect = self.config.broker.auto_reconnect;
        let options = self
            .config
            .connect_options(role)?
            .with_connection_lost_hook(Arc::new(move |reason: &str| {
                if auto_reconnect {
                    debug!(reason, "Connection lost, reconnecting");
                } else {
                    warn!(reason, "Connection lost and auto-reconnect is off, shutting down");
                    shutdown.trigger();
                }
            }));

        info!(
            broker = %options.broker_url,
            client_id = %options.client_id,
            role = %role,
            "Connecting to broker"
        );
        let mut shutdown = self.shutdown.subscribe();
        let transport =
            unless_shutdown(&mut shutdown, "connecting to broker", MqttTransport::connect(options))
                .await??;
        info!("📡 Connected to broker");
        Ok(Arc::new(transport))
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("broker", &self.config.broker.url)
            .field("shutdown", &self.shutdown.is_triggered())
            .finish()
    }
}

/// Runs `operation` unless shutdown is requested first.
///
/// # Errors
/// Returns `StartupFailed` naming `stage` when shutdown wins.
async fn unless_shutdown<T>(
    shutdown: &mut ShutdownListener,
    stage: &str,
    operation: impl Future<Output = T>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = shutdown.recv() => {
            info!(stage, "Shutdown requested during startup");
            Err(PeerError::startup_failed(format!("shutdown requested while {stage}")))
        }
        value = operation => Ok(value),
    }
}

/// Disconnects, logging instead of failing.
async fn release(transport: &MqttTransport) {
    if let Err(e) = transport.disconnect(DISCONNECT_GRACE).await {
        warn!(error = %e, "Disconnect did not complete cleanly");
    } else {
        debug!(
            connection_losses = transport.connection_losses(),
            "Disconnected from broker"
        );
    }
}

/// Completes on Ctrl+C, or SIGTERM on Unix.
async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        if let Ok(mut term) = signal(SignalKind::terminate()) {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Ctrl+C handler failed, waiting for SIGTERM");
                        term.recv().await;
                    }
                }
                _ = term.recv() => {}
            }
            return;
        }
        warn!("SIGTERM handler unavailable, listening for Ctrl+C only");
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_keys;
    use crate::services::AuthOutcome;
    use devauth_core::error::CoreError;
    use devauth_transport::memory::MemoryBroker;

    fn peer() -> Peer {
        Peer::new(PeerConfig::default())
    }

    async fn wait_for(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !done() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_authenticate_against_responder() {
        let broker = MemoryBroker::new();
        let prover = peer();
        let prover_shutdown = prover.shutdown_signal();
        let prover_transport: Arc<dyn PubSubTransport> = Arc::new(broker.connect("prover"));
        let responder = tokio::spawn(async move {
            prover.respond_over(prover_transport, test_keys::signer()).await
        });
        wait_for(|| broker.subscription_count() == 1).await;

        let verifier = peer();
        let report = verifier
            .authenticate_over(
                Arc::new(broker.connect("verifier")),
                RsaVerifier::new(test_keys::verifier_key()),
            )
            .await
            .unwrap();
        assert_eq!(report.outcome, AuthOutcome::Verified);

        prover_shutdown.trigger();
        let stats = responder.await.unwrap().unwrap();
        assert_eq!(stats.signed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_then_disconnect_releases() {
        let broker = MemoryBroker::new();
        let verifier = peer();
        let signal = verifier.shutdown_signal();
        let transport = Arc::new(broker.connect("verifier"));

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            signal.trigger();
        });
        let report = verifier
            .authenticate_over(transport.clone(), RsaVerifier::new(test_keys::verifier_key()))
            .await
            .unwrap();
        trigger.await.unwrap();
        assert_eq!(report.outcome, AuthOutcome::Aborted);

        let started = tokio::time::Instant::now();
        transport.disconnect(DISCONNECT_GRACE).await.unwrap();
        assert!(started.elapsed() <= DISCONNECT_GRACE);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_and_listen_with_reply() {
        let broker = MemoryBroker::new();

        let listener = peer();
        let listener_shutdown = listener.shutdown_signal();
        let listener_transport: Arc<dyn PubSubTransport> = Arc::new(broker.connect("listener"));
        let listening = tokio::spawn(async move {
            let cipher = listener.cipher().unwrap();
            listener.listen_over(listener_transport, cipher).await
        });
        wait_for(|| broker.subscription_count() == 1).await;

        let sender = peer();
        let sender_shutdown = sender.shutdown_signal();
        let sender_transport: Arc<dyn PubSubTransport> = Arc::new(broker.connect("sender"));
        let sending = tokio::spawn(async move {
            let cipher = sender.cipher().unwrap();
            sender
                .send_over(sender_transport, cipher, "Hello Device 2, this is a secure message!")
                .await
        });

        wait_for(|| broker.published_on("device2/response").len() == 1).await;
        // let the sender drain its reply before stopping it
        tokio::task::yield_now().await;
        listener_shutdown.trigger();
        sender_shutdown.trigger();

        assert_eq!(listening.await.unwrap().unwrap(), 1);
        assert!(sending.await.unwrap().unwrap() <= 1);
        assert_eq!(broker.published_on("device1/data").len(), 1);
    }

    #[tokio::test]
    async fn test_listener_without_reply() {
        let broker = MemoryBroker::new();
        let mut config = PeerConfig::default();
        config.channel.reply_on_receive = false;
        let listener = Peer::new(config);
        let shutdown = listener.shutdown_signal();
        let transport: Arc<dyn PubSubTransport> = Arc::new(broker.connect("listener"));
        let cipher = listener.cipher().unwrap();
        let envelope = cipher.encrypt_to_hex(b"ping");

        let listening = tokio::spawn(async move { listener.listen_over(transport, cipher).await });
        wait_for(|| broker.subscription_count() == 1).await;

        broker.inject("device1/data", envelope);
        broker.inject("device1/data", "not an envelope");
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        shutdown.trigger();

        assert_eq!(listening.await.unwrap().unwrap(), 1);
        assert!(broker.published_on("device2/response").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_startup() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.subscribe();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger();
        });

        let started = tokio::time::Instant::now();
        let err = unless_shutdown(&mut listener, "connecting to broker", std::future::pending::<()>())
            .await
            .unwrap_err();

        assert!(matches!(err, PeerError::StartupFailed { .. }));
        assert!(err.to_string().contains("connecting to broker"));
        assert!(started.elapsed() < devauth_transport::CONNECT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_startup_completes_without_shutdown() {
        let signal = ShutdownSignal::new();
        let value = unless_shutdown(&mut signal.subscribe(), "connecting to broker", async { 7 })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_connecting() {
        let mut config = PeerConfig::default();
        config.keys.public_key_file = "/nonexistent/public_key.pem".to_string();
        // an unreachable broker would fail differently
        config.broker.url = "tcp://127.0.0.1:1".to_string();

        let err = Peer::new(config).authenticate().await.unwrap_err();
        assert!(matches!(err, PeerError::Core(CoreError::KeyLoad { .. })));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_bad_shared_key_rejected() {
        let mut config = PeerConfig::default();
        config.channel.shared_key_hex = "00".to_string();
        let err = Peer::new(config).listen().await.unwrap_err();
        assert!(err.is_config_error());
    }
}
