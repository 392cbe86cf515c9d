// ============================================
// File: crates/devauth-transport/src/lib.rs
// ============================================
//! # devauth Transport - Publish/Subscribe Layer
//!
//! ## Creation Reason
//! Provides the publish/subscribe abstraction the devauth peers talk
//! through, an MQTT implementation of it, and an in-memory broker for
//! tests.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `PubSubTransport`, `QoS`, `Message`, `Subscription`, `ConnectOptions`
//! - [`mqtt`]: MQTT 3.1.1 client over `rumqttc`
//! - `acks`: Correlation of requests with broker acknowledgements
//! - [`router`]: Fan-out from incoming publishes to subscription queues
//! - [`topic`]: Topic filter validation and matching
//! - `memory`: In-process broker (`mock` feature)
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               devauth-peer                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   devauth-core          devauth-transport          │
//! │                         You are here ◄──           │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             devauth-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//!            ┌──────────────────────┐
//!            │     MQTT broker      │
//!            └──────────┬───────────┘
//!                       │ Publish
//!            ┌──────────┴───────────┐
//!            │  event loop task     │
//!            └──────────┬───────────┘
//!                       │ Router::dispatch (try_send)
//!        ┌──────────────┼──────────────┐
//!        ▼              ▼              ▼
//!   Subscription   Subscription   Subscription
//!   (bounded mpsc, consumed with recv().await)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always program against `PubSubTransport` for testability
//! - Mock implementations available with `mock` feature
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod acks;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
pub mod mqtt;
pub mod router;
pub mod topic;
pub mod traits;

// Re-export primary types
pub use error::{Result, TransportError};
pub use mqtt::MqttTransport;
pub use traits::{
    ConnectOptions, ConnectionLostHook, Message, PubSubTransport, QoS, Subscription,
    CONNECT_TIMEOUT,
};
