// ============================================
// File: crates/devauth-peer/src/services/authenticator.rs
// ============================================
//! # Authenticator (Verifier Role)
//!
//! ## Creation Reason
//! Issues a fresh challenge to the prover, waits for its signed response
//! and decides whether the prover holds the expected private key.
//!
//! ## Main Functionality
//! - `Authenticator::authenticate`: One complete attempt with a new challenge
//! - `RESPONSE_TIMEOUT`: Fixed response deadline
//!
//! ## Attempt Flow
//! ```text
//! Verifier                          Broker                         Prover
//!    │ SUBSCRIBE response (QoS1)      │                               │
//!    │──────────────────────────────►│                               │
//!    │ PUBLISH challenge (QoS1)       │                               │
//!    │──────────────────────────────►│──────────────────────────────►│
//!    │                                │      PUBLISH base64(sig)      │
//!    │◄──────────────────────────────│◄──────────────────────────────│
//!    │ verify(challenge, sig)         │                               │
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The response subscription is opened BEFORE the challenge is
//!   published. Reordering these loses fast responses.
//! - `RESPONSE_TIMEOUT` is a protocol constant, not configuration
//! - The first message on the response topic decides the attempt.
//! - Attempts on one Authenticator are serialized; they share a topic.
//!
//! ## Last Modified
//! v0.1.0 - Initial authenticator

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use devauth_common::types::Topic;
use devauth_core::protocol::{Challenge, SignedResponse};
use devauth_core::{ChallengeGenerator, CryptoVerifier};
use devauth_transport::{Message, PubSubTransport, QoS, Subscription};

use super::session::{AuthOutcome, AuthReport, AuthSession, AuthState, FailureReason};
use super::shutdown::ShutdownListener;

/// How long the verifier waits for a signed response.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivery level for challenges and responses.
pub const AUTH_QOS: QoS = QoS::AtLeastOnce;

// ============================================
// Authenticator
// ============================================

/// Verifier side of the challenge/response exchange.
pub struct Authenticator {
    transport: Arc<dyn PubSubTransport>,
    verifier: Arc<dyn CryptoVerifier>,
    challenge_topic: Topic,
    response_topic: Topic,
    generator: ChallengeGenerator,
    in_flight: Mutex<()>,
}

impl Authenticator {
    /// Creates an authenticator bound to a transport and a verifier key.
    pub fn new(
        transport: Arc<dyn PubSubTransport>,
        verifier: Arc<dyn CryptoVerifier>,
        challenge_topic: Topic,
        response_topic: Topic,
    ) -> Self {
        Self {
            transport,
            verifier,
            challenge_topic,
            response_topic,
            generator: ChallengeGenerator::new(),
            in_flight: Mutex::new(()),
        }
    }

    /// Runs one attempt with a freshly generated challenge.
    ///
    /// Never returns an error: every way an attempt can end is an
    /// [`AuthOutcome`] in the report.
    pub async fn authenticate(&self, shutdown: &mut ShutdownListener) -> AuthReport {
        let challenge = self.generator.generate();
        self.authenticate_with_challenge(challenge, shutdown).await
    }

    /// Runs one attempt with a caller-supplied challenge.
    ///
    /// The caller is responsible for never reusing a challenge.
    pub async fn authenticate_with_challenge(
        &self,
        challenge: Challenge,
        shutdown: &mut ShutdownListener,
    ) -> AuthReport {
        let _guard = self.in_flight.lock().await;
        let mut session = AuthSession::new(challenge);
        info!(
            attempt_id = %session.id(),
            challenge = %session.challenge(),
            topic = %self.challenge_topic,
            "Starting authentication attempt"
        );

        let outcome = self.run(&mut session, shutdown).await;
        let report = session.resolve(outcome);

        match &report.outcome {
            AuthOutcome::Verified => info!(
                attempt_id = %report.attempt_id,
                elapsed_ms = report.elapsed.as_millis(),
                "Prover verified"
            ),
            other => warn!(
                attempt_id = %report.attempt_id,
                elapsed_ms = report.elapsed.as_millis(),
                outcome = %other,
                "Authentication did not succeed"
            ),
        }
        report
    }

    async fn run(&self, session: &mut AuthSession, shutdown: &mut ShutdownListener) -> AuthOutcome {
        // Subscribe first so a fast prover cannot answer into the void.
        let mut responses = tokio::select! {
            biased;
            () = shutdown.recv() => return AuthOutcome::Aborted,
            result = self.transport.subscribe(self.response_topic.as_str(), AUTH_QOS) => {
                match result {
                    Ok(subscription) => subscription,
                    Err(e) => return AuthOutcome::Failed(FailureReason::Transport(e.to_string())),
                }
            }
        };

        if let Err(outcome) = step(session, AuthState::ChallengeSent) {
            return outcome;
        }

        let payload = Bytes::copy_from_slice(session.challenge().as_bytes());
        tokio::select! {
            biased;
            () = shutdown.recv() => return AuthOutcome::Aborted,
            result = self.transport.publish(&self.challenge_topic, payload, AUTH_QOS, false) => {
                if let Err(e) = result {
                    return AuthOutcome::Failed(FailureReason::Transport(e.to_string()));
                }
            }
        }

        if let Err(outcome) = step(session, AuthState::AwaitingResponse) {
            return outcome;
        }
        debug!(attempt_id = %session.id(), "Challenge published, awaiting response");

        self.await_response(session, &mut responses, shutdown).await
    }

    async fn await_response(
        &self,
        session: &AuthSession,
        responses: &mut Subscription,
        shutdown: &mut ShutdownListener,
    ) -> AuthOutcome {
        tokio::select! {
            biased;
            () = shutdown.recv() => AuthOutcome::Aborted,
            message = responses.recv() => match message {
                Some(message) => self.check_response(session, &message),
                None => AuthOutcome::Failed(FailureReason::Transport(
                    "response subscription closed".to_owned(),
                )),
            },
            () = tokio::time::sleep(RESPONSE_TIMEOUT) => AuthOutcome::TimedOut,
        }
    }

    fn check_response(&self, session: &AuthSession, message: &Message) -> AuthOutcome {
        let response = match SignedResponse::decode(&message.payload) {
            Ok(response) => response,
            Err(e) => {
                debug!(attempt_id = %session.id(), error = %e, "Undecodable response");
                return AuthOutcome::Failed(FailureReason::MalformedResponse(e.to_string()));
            }
        };
        debug!(
            attempt_id = %session.id(),
            signature_len = response.as_bytes().len(),
            "Response received"
        );

        if self
            .verifier
            .verify(session.challenge().as_bytes(), response.as_bytes())
        {
            AuthOutcome::Verified
        } else {
            AuthOutcome::Failed(FailureReason::SignatureMismatch)
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("client_id", &self.transport.client_id())
            .field("challenge_topic", &self.challenge_topic)
            .field("response_topic", &self.response_topic)
            .finish_non_exhaustive()
    }
}

fn step(session: &mut AuthSession, next: AuthState) -> Result<(), AuthOutcome> {
    session
        .transition(next)
        .map_err(|e| AuthOutcome::Failed(FailureReason::Internal(e.to_string())))
}

// ============================================
// Tests
// ============================================
