// ============================================
// File: crates/devauth-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the text payloads exchanged over the pub/sub broker and the
//! default topic names that make up the wire contract.
//!
//! ## Main Functionality
//! - [`messages`]: `Challenge`, `SignedResponse`, `CipherEnvelope`
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Authentication (QoS 1)                     │
//! │                                                             │
//! │  Verifier ──── challenge (UTF-8) ── iot/auth/challenge ──►  │
//! │  Verifier ◄─── signature (base64) ─ iot/auth/response ────  │
//! │                                                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  Secure Channel (QoS 0)                     │
//! │                                                             │
//! │  Sender ════ hex(IV || AES-256-CFB) ═ device1/data ══════►  │
//! │  Sender ◄═══ hex(IV || AES-256-CFB) ═ device2/response ═══  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format Principles
//! - Every payload is printable text so any broker can carry it
//! - Receivers trim surrounding whitespace before interpreting a payload
//!
//! ## ⚠️ Important Note for Next Developer
//! - Topic names are part of the contract between deployed peers;
//!   changing a default breaks peers that rely on it
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod messages;

pub use messages::{Challenge, CipherEnvelope, SignedResponse};

// ============================================
// Default Topics
// ============================================

/// Topic the verifier publishes challenges on.
pub const DEFAULT_CHALLENGE_TOPIC: &str = "iot/auth/challenge";

/// Topic the prover publishes signed responses on.
pub const DEFAULT_RESPONSE_TOPIC: &str = "iot/auth/response";

/// Topic the secure channel sender publishes on.
pub const DEFAULT_DATA_TOPIC: &str = "device1/data";

/// Topic the secure channel listener replies on.
pub const DEFAULT_DATA_RESPONSE_TOPIC: &str = "device2/response";
