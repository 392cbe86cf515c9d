// ============================================
// File: crates/devauth-core/src/challenge.rs
// ============================================
//! # Challenge Generation
//!
//! ## Creation Reason
//! Every authentication attempt needs a value the prover has never seen
//! and an attacker cannot predict, so a captured signature is useless
//! for any later attempt.
//!
//! ## Main Functionality
//! - `ChallengeGenerator`: Produces fresh base64 challenges
//!
//! ## Construction
//! ```text
//!   input     = "{monotonic unix nanos}-{hex SHA-256(salt)}-{hex nonce}"
//!   challenge = base64( SHA-256(input) )                     (44 chars)
//! ```
//! - `salt`: 32 random bytes, fixed per generator
//! - `nonce`: 16 random bytes, fresh per call
//! - timestamps are strictly increasing per generator, so two calls in
//!   the same nanosecond still differ even before the nonce is mixed in
//!
//! ## ⚠️ Important Note for Next Developer
//! - Generation never fails; keep it that way (callers do not handle errors)
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use devauth_common::time::MonotonicNanos;

use crate::protocol::Challenge;

const SALT_SIZE: usize = 32;
const NONCE_SIZE: usize = 16;

/// Source of fresh challenges.
///
/// # Example
/// ```
/// use devauth_core::ChallengeGenerator;
///
/// let generator = ChallengeGenerator::new();
/// let a = generator.generate();
/// let b = generator.generate();
/// assert_ne!(a, b);
/// ```
#[derive(Debug)]
pub struct ChallengeGenerator {
    salt_digest: String,
    clock: MonotonicNanos,
}

impl ChallengeGenerator {
    /// Creates a generator with a random salt.
    #[must_use]
    pub fn new() -> Self {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Self {
            salt_digest: hex::encode(Sha256::digest(salt)),
            clock: MonotonicNanos::new(),
        }
    }

    /// Generates a new challenge.
    #[must_use]
    pub fn generate(&self) -> Challenge {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let input = format!(
            "{}-{}-{}",
            self.clock.next(),
            self.salt_digest,
            hex::encode(nonce)
        );
        let encoded = BASE64.encode(Sha256::digest(input.as_bytes()));

        // base64 of a 32-byte digest is never blank
        Challenge::from_encoded(encoded)
    }
}

impl Default for ChallengeGenerator {
    fn default() -> Self {
        Self::new()
    }
}
