// ============================================
// File: crates/devauth-common/src/lib.rs
// ============================================
//! # devauth Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides foundational types and utilities shared across all devauth
//! crates, so the protocol, transport and peer layers agree on how
//! identifiers, topics and timestamps look.
//!
//! ## Main Functionality
//! - [`types`]: Attempt identifiers and validated pub/sub topic names
//! - [`time`]: High-resolution, strictly increasing timestamps
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                devauth-peer                         │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   devauth-core        devauth-transport             │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │             devauth-common  ◄── You are here        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal (no async runtime, no crypto backends)
//! - Topic names are part of the wire contract; validation rules here
//!   must stay in line with what the broker accepts
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use types::{AttemptId, Topic};
