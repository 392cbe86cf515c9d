// ============================================
// File: crates/devauth-peer/src/error.rs
// ============================================
//! # Peer Error Types
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use devauth_common::error::CommonError;
use devauth_core::error::CoreError;
use devauth_transport::error::TransportError;

use crate::services::session::AuthState;

/// Result type for peer operations.
pub type Result<T> = std::result::Result<T, PeerError>;

/// Peer error types.
#[derive(Error, Debug)]
pub enum PeerError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// File that was read
        path: String,
        /// Read or parse error
        reason: String,
    },

    /// A configuration value is out of range or malformed.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Dotted key, e.g. `topics.challenge`
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// A required configuration value is empty.
    #[error("Missing required configuration: {field}")]
    ConfigMissing {
        /// Dotted key
        field: String,
    },

    /// `AuthSession` was asked to move along an edge it does not have.
    #[error("Illegal session transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: AuthState,
        /// Requested state
        to: AuthState,
    },

    /// The transport ended a subscription a role still needed.
    #[error("Subscription to '{filter}' closed by transport")]
    SubscriptionClosed {
        /// Topic filter of the subscription
        filter: String,
    },

    /// The peer stopped before its role began (e.g. shutdown while connecting).
    #[error("Peer failed to start: {reason}")]
    StartupFailed {
        /// Why startup was abandoned
        reason: String,
    },

    /// Error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Key, crypto or payload error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Broker connection error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl PeerError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigMissing` error.
    pub fn config_missing(field: impl Into<String>) -> Self {
        Self::ConfigMissing {
            field: field.into(),
        }
    }

    /// Creates a `SubscriptionClosed` error.
    pub fn subscription_closed(filter: impl Into<String>) -> Self {
        Self::SubscriptionClosed {
            filter: filter.into(),
        }
    }

    /// Creates a `StartupFailed` error.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Returns `true` for configuration errors.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } | Self::ConfigMissing { .. }
        )
    }

    /// Errors that end the run rather than a single message.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. }
                | Self::ConfigInvalid { .. }
                | Self::ConfigMissing { .. }
                | Self::StartupFailed { .. }
                | Self::Transport(_)
                | Self::Core(CoreError::KeyLoad { .. })
        )
    }

    /// Returns `true` if retrying with a new connection may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PeerError::config_load("devauth.toml", "file not found");
        assert!(err.to_string().contains("devauth.toml"));

        let err = PeerError::InvalidTransition {
            from: AuthState::Verified,
            to: AuthState::Failed,
        };
        assert!(err.to_string().contains("Verified -> Failed"));
    }

    #[test]
    fn test_error_classification() {
        let config_err = PeerError::config_invalid("topics.challenge", "empty");
        assert!(config_err.is_config_error());
        assert!(config_err.is_fatal());

        let transport: PeerError = TransportError::NotConnected.into();
        assert!(transport.is_fatal());
        assert!(transport.is_retryable());

        let interrupted = PeerError::startup_failed("shutdown requested while connecting to broker");
        assert!(interrupted.is_fatal());
        assert!(!interrupted.is_retryable());

        let decode: PeerError = CoreError::decode("challenge", "not UTF-8").into();
        assert!(!decode.is_fatal());
    }
}
