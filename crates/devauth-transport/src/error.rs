// ============================================
// File: crates/devauth-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for broker connections and publish/subscribe
//! operations.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for transport operations
//! - Categorization of retryable vs fatal errors
//!
//! ## Error Categories
//! 1. **Connection Errors**: Bad broker URL, refused/failed/timed-out connect
//! 2. **Operation Errors**: Publish/subscribe rejected, not connected
//! 3. **Input Errors**: Invalid topic filters
//!
//! ## ⚠️ Important Note for Next Developer
//! - Errors during initial connect are fatal to the run; callers do not retry
//! - Once connected, the MQTT adapter reconnects by itself (if enabled);
//!   a publish during that window reports `NotConnected`
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use devauth_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Connection Errors
    // ========================================

    /// Broker URL could not be parsed.
    #[error("Invalid broker URL '{url}': {reason}")]
    InvalidBrokerUrl {
        /// The URL as configured
        url: String,
        /// What is wrong with it
        reason: String,
    },

    /// Connecting to the broker failed.
    #[error("Failed to connect to {broker}: {reason}")]
    ConnectFailed {
        /// Broker address
        broker: String,
        /// Why the connection failed
        reason: String,
    },

    /// The transport is not connected.
    #[error("Not connected to broker")]
    NotConnected,

    // ========================================
    // Operation Errors
    // ========================================

    /// Publish was rejected.
    #[error("Failed to publish to '{topic}': {reason}")]
    PublishFailed {
        /// Destination topic
        topic: String,
        /// Why publish failed
        reason: String,
    },

    /// Subscribe was rejected.
    #[error("Failed to subscribe to '{filter}': {reason}")]
    SubscribeFailed {
        /// Topic filter
        filter: String,
        /// Why subscribe failed
        reason: String,
    },

    /// Operation timed out.
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        /// What operation timed out
        operation: String,
        /// The bound that was exceeded
        duration_ms: u64,
    },

    // ========================================
    // Input Errors
    // ========================================

    /// Topic filter is not valid MQTT syntax.
    #[error("Invalid topic filter '{filter}': {reason}")]
    InvalidTopicFilter {
        /// The rejected filter
        filter: String,
        /// Which rule it breaks
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidBrokerUrl` error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBrokerUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(broker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            broker: broker.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `PublishFailed` error.
    pub fn publish_failed(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PublishFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `SubscribeFailed` error.
    pub fn subscribe_failed(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SubscribeFailed {
            filter: filter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates an `InvalidTopicFilter` error.
    pub fn invalid_filter(filter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTopicFilter {
            filter: filter.into(),
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::NotConnected | Self::ConnectFailed { .. }
        )
    }

    /// Returns `true` if this error concerns the broker connection itself.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBrokerUrl { .. } | Self::ConnectFailed { .. } | Self::NotConnected
        )
    }
}

// ============================================
// Tests
// ============================================
