// ============================================
// File: crates/devauth-peer/src/lib.rs
// ============================================
//! # devauth Peer Library
//!
//! ## Creation Reason
//! Turns the protocol primitives of `devauth-core` and the broker
//! abstraction of `devauth-transport` into the running roles of an
//! IoT device: verifier, prover and secure-channel endpoints.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Peer configuration management
//! - [`node`]: Role orchestration and connection lifecycle
//! - [`services`]: Protocol roles
//!   - [`services::authenticator`]: Verifier role
//!   - [`services::responder`]: Prover role
//!   - [`services::secure_channel`]: Encrypted messaging
//!   - [`services::session`]: Attempt state machine
//!   - [`services::shutdown`]: Cancellation
//! - [`error`]: Peer-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          devauth Peer                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐   │
//! │  │ PeerConfig  │────►│    Peer     │────►│  ShutdownSignal │   │
//! │  │   (TOML)    │     │ Orchestrator│     │ (Ctrl+C/SIGTERM)│   │
//! │  └─────────────┘     └──────┬──────┘     └─────────────────┘   │
//! │                             │                                   │
//! │         ┌───────────────────┼───────────────────┐               │
//! │         ▼                   ▼                   ▼               │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐       │
//! │  │Authenticator│     │  Responder  │     │SecureChannel│       │
//! │  └─────────────┘     └─────────────┘     └─────────────┘       │
//! │                                                                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                  PubSubTransport (MQTT broker)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Verifier → challenge topic → Prover → sign → response topic → Verifier → verify
//! Sender   → AES-CFB → data topic → Listener → decrypt → (ack) → data_response topic
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The broker is untrusted for integrity of channel messages (no MAC)
//! - Configuration changes require restart (no hot-reload)
//! - Every role disconnects from the broker on exit, success or not
//!
//! ## Last Modified
//! v0.1.0 - Initial peer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod node;
pub mod services;

// Re-export primary types
pub use config::{PeerConfig, Role};
pub use error::{PeerError, Result};
pub use node::Peer;
pub use services::{AuthOutcome, AuthReport, AuthState};
