// ============================================
// File: crates/devauth-peer/src/services/mod.rs
// ============================================
//! # Peer Services
//!
//! ## Creation Reason
//! Holds the protocol roles of a peer, separated from configuration and
//! from the concrete broker connection.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`authenticator`]: Verifier role (challenge out, signature in)
//! - [`responder`]: Prover role (challenge in, signature out)
//! - [`secure_channel`]: Encrypted message exchange
//! - [`session`]: Per-attempt state machine
//! - [`shutdown`]: Cancellation shared by all roles
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐            ┌──────────────────────┐   │
//! │  │  Authenticator  │──creates──►│     AuthSession      │   │
//! │  │  - challenge    │            │  - state machine     │   │
//! │  │  - verify       │            │  - outcome / report  │   │
//! │  └────────┬────────┘            └──────────────────────┘   │
//! │           │                                                 │
//! │  ┌────────▼────────┐   ┌─────────────────┐                 │
//! │  │    Responder    │   │  SecureChannel  │                 │
//! │  │  - sign         │   │  - encrypt/send │                 │
//! │  └────────┬────────┘   └────────┬────────┘                 │
//! │           │                     │                           │
//! │           └──────────┬──────────┘                           │
//! │                      ▼                                      │
//! │        Arc<dyn PubSubTransport>  +  ShutdownListener        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Services take `Arc<dyn PubSubTransport>`; tests pass the memory broker
//! - Services never disconnect the transport. The caller owns it.
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod authenticator;
pub mod responder;
pub mod secure_channel;
pub mod session;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod test_keys;

pub use authenticator::{Authenticator, AUTH_QOS, RESPONSE_TIMEOUT};
pub use responder::{Responder, ResponderStatsSnapshot};
pub use secure_channel::{acknowledgement, ChannelMessage, ChannelReceiver, SecureChannel};
pub use session::{AuthOutcome, AuthReport, AuthSession, AuthState, FailureReason};
pub use shutdown::{ShutdownListener, ShutdownSignal};
