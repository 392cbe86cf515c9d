// ============================================
// File: crates/devauth-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types for challenge handling, signatures and the
//! symmetric channel cipher in the devauth core crate.
//!
//! ## Main Functionality
//! - `CoreError`: Primary error enum for core operations
//!
//! ## Error Categories
//! 1. **Crypto Errors**: Key loading, signing, cipher setup
//! 2. **Decode Errors**: Malformed wire payloads (base64, hex, UTF-8, short envelopes)
//!
//! A signature that simply does not match is NOT an error: verification
//! returns `false` for it. Errors are reserved for inputs that cannot be
//! interpreted at all.
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - Decode errors are per-message: callers drop the message and continue
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use devauth_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol and cryptographic operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// A key could not be loaded or generated.
    #[error("Key load failed: {context}")]
    KeyLoad {
        /// Which key and why
        context: String,
    },

    /// Signature creation failed.
    #[error("Failed to create signature: {reason}")]
    SignatureCreation {
        /// Why signing failed
        reason: String,
    },

    /// Symmetric key has the wrong length for the cipher.
    #[error("Cipher init failed: key must be {expected} bytes, got {actual}")]
    CipherInit {
        /// Required key length
        expected: usize,
        /// Supplied key length
        actual: usize,
    },

    // ========================================
    // Decode Errors
    // ========================================

    /// A wire payload could not be decoded.
    #[error("Decode failed for {context}: {details}")]
    Decode {
        /// What was being decoded
        context: String,
        /// What went wrong
        details: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `KeyLoad` error.
    pub fn key_load(context: impl Into<String>) -> Self {
        Self::KeyLoad {
            context: context.into(),
        }
    }

    /// Creates a `SignatureCreation` error.
    pub fn signing(reason: impl Into<String>) -> Self {
        Self::SignatureCreation {
            reason: reason.into(),
        }
    }

    /// Creates a `CipherInit` error.
    pub const fn cipher_init(expected: usize, actual: usize) -> Self {
        Self::CipherInit { expected, actual }
    }

    /// Creates a `Decode` error.
    pub fn decode(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decode {
            context: context.into(),
            details: details.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this is a cryptographic error.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::KeyLoad { .. }
                | Self::SignatureCreation { .. }
                | Self::CipherInit { .. }
        )
    }

    /// Returns `true` if this is a payload decoding error.
    ///
    /// Decode errors are isolated to one message.
    #[must_use]
    pub const fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Common(CommonError::Decoding { .. }))
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::cipher_init(32, 16);
        assert!(err.to_string().contains("32"));
        assert!(err.to_string().contains("16"));

        let err = CoreError::decode("signed response", "invalid base64");
        assert!(err.to_string().contains("signed response"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::cipher_init(32, 0).is_crypto_error());
        assert!(CoreError::signing("bad key").is_crypto_error());
        assert!(!CoreError::cipher_init(32, 0).is_decode_error());

        assert!(CoreError::decode("envelope", "too short").is_decode_error());
        let wrapped: CoreError = CommonError::decoding("hex", "odd length").into();
        assert!(wrapped.is_decode_error());
    }

    #[test]
    fn test_common_error_conversion() {
        let common = CommonError::invalid_input("field", "bad value");
        let core: CoreError = common.into();
        assert!(matches!(core, CoreError::Common(_)));
    }
}
