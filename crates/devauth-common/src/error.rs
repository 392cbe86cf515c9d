// ============================================
// File: crates/devauth-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! The identifier and topic types in this crate are parsed from
//! configuration and from the wire; their failures need one error type
//! that every other devauth crate can wrap.
//!
//! ## Main Functionality
//! - `CommonError`: Validation and decoding failures of shared types
//! - `Result<T>`: Type alias using `CommonError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Higher crates wrap this with `#[from]`; keep variants few and generic
//! - Never include keys or shared secrets in error messages
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

/// Common result type.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Failure to accept a value of one of the shared types.
///
/// # Example
/// ```
/// use devauth_common::error::{CommonError, Result};
///
/// fn non_empty(topic: &str) -> Result<()> {
///     if topic.is_empty() {
///         return Err(CommonError::invalid_input("topic", "cannot be empty"));
///     }
///     Ok(())
/// }
///
/// assert!(matches!(non_empty(""), Err(CommonError::InvalidInput { .. })));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// A value breaks a naming or format rule.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Rule that was broken
        reason: String,
    },

    /// Decoded bytes have the wrong length.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Required length in bytes
        expected: usize,
        /// Length received
        actual: usize,
    },

    /// Text could not be decoded (base64, hex, UTF-8).
    #[error("Decoding error: {context}: {details}")]
    Decoding {
        /// What was being decoded
        context: String,
        /// Decoder message
        details: String,
    },
}

impl CommonError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidLength` error.
    #[must_use]
    pub const fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }

    /// Creates a `Decoding` error.
    pub fn decoding(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decoding {
            context: context.into(),
            details: details.into(),
        }
    }

    /// Returns `true` for decoder failures.
    #[must_use]
    pub const fn is_decoding(&self) -> bool {
        matches!(self, Self::Decoding { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommonError::invalid_input("topic", "cannot contain '#'");
        assert!(err.to_string().contains("topic"));
        assert!(err.to_string().contains("'#'"));

        let err = CommonError::invalid_length(16, 3);
        assert_eq!(err.to_string(), "Invalid length: expected 16, got 3");
    }

    #[test]
    fn test_error_classification() {
        assert!(CommonError::decoding("attempt id", "bad char").is_decoding());
        assert!(!CommonError::invalid_length(32, 16).is_decoding());
    }
}
