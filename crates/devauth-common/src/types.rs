// ============================================
// File: crates/devauth-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the small value types that cross crate boundaries:
//! the identifier attached to every authentication attempt, and the
//! validated topic names that make up the pub/sub wire contract.
//!
//! ## Main Functionality
//! - `AttemptId`: Random 16-byte identifier for one authentication attempt
//! - `Topic`: A concrete (wildcard-free) pub/sub topic name
//!
//! ## ⚠️ Important Note for Next Developer
//! - `AttemptId` is for log correlation only; it never goes on the wire
//! - `Topic` rejects `+` and `#`: configured topics are publish targets,
//!   and publishing to a filter is a broker protocol violation
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

// ============================================
// Constants
// ============================================

/// Size of an `AttemptId` in bytes.
pub const ATTEMPT_ID_SIZE: usize = 16;

/// Maximum topic length in bytes (MQTT UTF-8 string limit).
pub const MAX_TOPIC_LEN: usize = 65_535;

// ============================================
// AttemptId
// ============================================

/// Identifier for a single authentication attempt.
///
/// Generated fresh for every `AuthSession` so that log lines from the
/// issuing, waiting and verifying steps of one attempt can be tied
/// together, and so that a retry is visibly a different attempt.
///
/// # Example
/// ```
/// use devauth_common::types::AttemptId;
///
/// let a = AttemptId::generate();
/// let b = AttemptId::generate();
/// assert_ne!(a, b);
///
/// let parsed: AttemptId = a.to_string().parse().unwrap();
/// assert_eq!(a, parsed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId([u8; ATTEMPT_ID_SIZE]);

impl AttemptId {
    /// Generates a new random `AttemptId`.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = [0u8; ATTEMPT_ID_SIZE];
        rand::thread_rng().fill_bytes(&mut id);
        Self(id)
    }

    /// Creates an `AttemptId` from raw bytes.
    ///
    /// Returns `None` if `bytes` is not exactly 16 bytes long.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let id: [u8; ATTEMPT_ID_SIZE] = bytes.try_into().ok()?;
        Some(Self(id))
    }

    /// Returns the raw bytes of the identifier.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ATTEMPT_ID_SIZE] {
        &self.0
    }
}

impl fmt::Debug for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AttemptId({:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BASE64.encode(self.0))
    }
}

impl FromStr for AttemptId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| CommonError::decoding("attempt id", e.to_string()))?;
        Self::from_bytes(&bytes)
            .ok_or_else(|| CommonError::invalid_length(ATTEMPT_ID_SIZE, bytes.len()))
    }
}

impl Serialize for AttemptId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

// ============================================
// Topic
// ============================================

/// A concrete publish/subscribe topic name.
///
/// # Validation
/// - Not empty, at most 65535 bytes
/// - No wildcard characters (`+`, `#`)
/// - No NUL characters
///
/// # Example
/// ```
/// use devauth_common::types::Topic;
///
/// let topic = Topic::new("iot/auth/challenge").unwrap();
/// assert_eq!(topic.as_str(), "iot/auth/challenge");
///
/// assert!(Topic::new("iot/+/challenge").is_err());
/// assert!(Topic::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Creates a validated topic.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the name breaks any rule listed above.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(CommonError::invalid_input("topic", "cannot be empty"));
        }
        if name.len() > MAX_TOPIC_LEN {
            return Err(CommonError::invalid_input(
                "topic",
                format!("exceeds {MAX_TOPIC_LEN} bytes"),
            ));
        }
        if name.contains(['+', '#']) {
            return Err(CommonError::invalid_input(
                "topic",
                format!("'{name}' contains a wildcard"),
            ));
        }
        if name.contains('\0') {
            return Err(CommonError::invalid_input("topic", "contains NUL"));
        }
        Ok(())
    }

    /// Returns the topic name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Topic {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Topic {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================
// Tests
// ============================================
