// ============================================
// File: crates/devauth-peer/src/services/session.rs
// ============================================
//! # Authentication Session
//!
//! ## Creation Reason
//! Tracks one authentication attempt from challenge issuance to its
//! terminal outcome, and refuses any out-of-order state change.
//!
//! ## Main Functionality
//! - `AuthState`: Attempt state machine states
//! - `AuthOutcome` / `FailureReason`: How an attempt ended
//! - `AuthSession`: Per-attempt state (challenge, start time, state)
//! - `AuthReport`: Immutable summary handed back to the caller
//!
//! ## Session Lifecycle
//! ```text
//! ┌──────┐  publish   ┌───────────────┐  published  ┌──────────────────┐
//! │ Idle │ ─────────► │ ChallengeSent │ ──────────► │ AwaitingResponse │
//! └──┬───┘            └───────┬───────┘             └────────┬─────────┘
//!    │                        │                              │
//!    │ subscribe fails        │ publish fails       ┌────────┼─────────┬──────────┐
//!    ▼                        ▼                     ▼        ▼         ▼          │
//! ┌────────┐             ┌────────┐           ┌──────────┐ ┌────────┐ ┌──────────┐ │
//! │ Failed │             │ Failed │           │ Verified │ │ Failed │ │ TimedOut │ │
//! └────────┘             └────────┘           └──────────┘ └────────┘ └──────────┘ │
//!                                                                                  │
//!   shutdown from any non-terminal state ──────────────────────────► Aborted ◄─────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Terminal states are final. A retry is a NEW session with a NEW challenge.
//! - The challenge lives only as long as the session; it is never persisted
//!
//! ## Last Modified
//! v0.1.0 - Initial session state machine

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use devauth_common::types::AttemptId;
use devauth_core::protocol::Challenge;

use crate::error::{PeerError, Result};

// ============================================
// AuthState
// ============================================

/// Authentication attempt states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// Session opened, nothing sent.
    Idle,
    /// Challenge handed to the transport.
    ChallengeSent,
    /// Broker accepted the challenge; waiting for the signature.
    AwaitingResponse,
    /// Signature checked out.
    Verified,
    /// Transport error, bad payload or wrong signature.
    Failed,
    /// No response before the deadline.
    TimedOut,
    /// Shutdown observed.
    Aborted,
}

impl AuthState {
    /// Returns `true` for states that end the attempt.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Verified | Self::Failed | Self::TimedOut | Self::Aborted
        )
    }

    /// Returns `true` if moving from `self` to `next` is legal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (from, Self::Aborted) => !from.is_terminal(),
            (Self::Idle, Self::ChallengeSent | Self::Failed)
            | (Self::ChallengeSent, Self::AwaitingResponse | Self::Failed)
            | (Self::AwaitingResponse, Self::Verified | Self::Failed | Self::TimedOut) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::ChallengeSent => "ChallengeSent",
            Self::AwaitingResponse => "AwaitingResponse",
            Self::Verified => "Verified",
            Self::Failed => "Failed",
            Self::TimedOut => "TimedOut",
            Self::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

// ============================================
// AuthOutcome
// ============================================

/// Why an attempt ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The transport rejected the subscribe or the challenge publish.
    Transport(String),
    /// A response arrived but could not be decoded.
    MalformedResponse(String),
    /// A response decoded but does not verify against the challenge.
    SignatureMismatch,
    /// The attempt broke its own state machine.
    Internal(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(reason) => write!(f, "transport error: {reason}"),
            Self::MalformedResponse(reason) => write!(f, "malformed response: {reason}"),
            Self::SignatureMismatch => f.write_str("signature does not match challenge"),
            Self::Internal(reason) => write!(f, "internal error: {reason}"),
        }
    }
}

/// Terminal result of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The responder holds the private key.
    Verified,
    /// The attempt failed for the given reason.
    Failed(FailureReason),
    /// No response within `RESPONSE_TIMEOUT`.
    TimedOut,
    /// Shutdown was requested while the attempt was live.
    Aborted,
}

impl AuthOutcome {
    /// The terminal state this outcome corresponds to.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        match self {
            Self::Verified => AuthState::Verified,
            Self::Failed(_) => AuthState::Failed,
            Self::TimedOut => AuthState::TimedOut,
            Self::Aborted => AuthState::Aborted,
        }
    }

    /// Returns `true` only for `Verified`.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "Failed ({reason})"),
            other => write!(f, "{}", other.state()),
        }
    }
}

// ============================================
// AuthSession
// ============================================

/// State of one in-flight authentication attempt.
#[derive(Debug)]
pub struct AuthSession {
    id: AttemptId,
    challenge: Challenge,
    started_at: Instant,
    state: AuthState,
}

impl AuthSession {
    /// Opens a session for `challenge` in state `Idle`.
    #[must_use]
    pub fn new(challenge: Challenge) -> Self {
        Self {
            id: AttemptId::generate(),
            challenge,
            started_at: Instant::now(),
            state: AuthState::Idle,
        }
    }

    /// Identifier used in log lines.
    #[must_use]
    pub const fn id(&self) -> AttemptId {
        self.id
    }

    /// The challenge issued for this attempt.
    #[must_use]
    pub const fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// Time since the session opened.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Moves to `next`.
    ///
    /// # Errors
    /// Returns `InvalidTransition` (and leaves the state unchanged) if the
    /// move is not allowed.
    pub fn transition(&mut self, next: AuthState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(PeerError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(attempt_id = %self.id, from = %self.state, to = %next, "Auth state change");
        self.state = next;
        Ok(())
    }

    /// Applies `outcome` and closes the session.
    ///
    /// If the outcome is not reachable from the current state the report
    /// carries an `Internal` failure instead.
    #[must_use]
    pub fn resolve(mut self, outcome: AuthOutcome) -> AuthReport {
        let outcome = match self.transition(outcome.state()) {
            Ok(()) => outcome,
            Err(e) => {
                if !self.state.is_terminal() {
                    self.state = AuthState::Failed;
                }
                AuthOutcome::Failed(FailureReason::Internal(e.to_string()))
            }
        };
        AuthReport {
            attempt_id: self.id,
            challenge: self.challenge.as_str().to_owned(),
            outcome,
            elapsed: self.started_at.elapsed(),
        }
    }
}

// ============================================
// AuthReport
// ============================================

/// Summary of a finished attempt.
#[derive(Debug, Clone)]
pub struct AuthReport {
    /// Attempt identifier
    pub attempt_id: AttemptId,
    /// Challenge text that was issued
    pub challenge: String,
    /// How the attempt ended
    pub outcome: AuthOutcome,
    /// Time from session open to resolution
    pub elapsed: Duration,
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AuthSession {
        AuthSession::new(Challenge::new("abc123").unwrap())
    }

    #[test]
    fn test_happy_path() {
        let mut s = session();
        assert_eq!(s.state(), AuthState::Idle);
        s.transition(AuthState::ChallengeSent).unwrap();
        s.transition(AuthState::AwaitingResponse).unwrap();

        let report = s.resolve(AuthOutcome::Verified);
        assert!(report.outcome.is_verified());
        assert_eq!(report.challenge, "abc123");
    }

    #[test]
    fn test_illegal_transitions() {
        let mut s = session();
        // cannot verify before a challenge went out
        assert!(matches!(
            s.transition(AuthState::Verified),
            Err(PeerError::InvalidTransition { from: AuthState::Idle, to: AuthState::Verified })
        ));
        assert_eq!(s.state(), AuthState::Idle);

        s.transition(AuthState::ChallengeSent).unwrap();
        assert!(s.transition(AuthState::TimedOut).is_err());
        s.transition(AuthState::AwaitingResponse).unwrap();
        s.transition(AuthState::Verified).unwrap();

        // terminal is final
        assert!(s.transition(AuthState::Failed).is_err());
        assert!(s.transition(AuthState::Aborted).is_err());
        assert_eq!(s.state(), AuthState::Verified);
    }

    #[test]
    fn test_abort_from_any_live_state() {
        for steps in 0..3 {
            let mut s = session();
            let path = [AuthState::ChallengeSent, AuthState::AwaitingResponse];
            for state in path.iter().take(steps) {
                s.transition(*state).unwrap();
            }
            s.transition(AuthState::Aborted).unwrap();
        }
    }

    #[test]
    fn test_resolve_unreachable_outcome() {
        let s = session();
        let report = s.resolve(AuthOutcome::TimedOut);
        assert!(matches!(
            report.outcome,
            AuthOutcome::Failed(FailureReason::Internal(_))
        ));
    }

    #[test]
    fn test_publish_failure_path() {
        let mut s = session();
        s.transition(AuthState::ChallengeSent).unwrap();
        let report = s.resolve(AuthOutcome::Failed(FailureReason::Transport("refused".into())));
        assert_eq!(report.outcome.state(), AuthState::Failed);
        assert!(report.outcome.to_string().contains("refused"));
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        assert_ne!(session().id(), session().id());
    }
}
