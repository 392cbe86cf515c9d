// ============================================
// File: crates/devauth-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Wraps the raw RSA and AES key material used by devauth in types that
//! encode ownership (prover vs verifier) and clean up after themselves.
//!
//! ## Main Functionality
//! - `ProverKey`: RSA private key held only by the Responder
//! - `VerifierKey`: RSA public key held only by the Authenticator
//! - `SymmetricKey`: Pre-shared 32-byte AES-256 key for the SecureChannel
//!
//! ## Key Ownership
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  ProverKey (Responder only)                                │
//! │  ├─ Loaded from PEM by a KeyProvider                       │
//! │  └─ Signs challenges, never transmitted                    │
//! │                                                            │
//! │  VerifierKey (Authenticator only)                          │
//! │  ├─ Distributed out of band                                │
//! │  └─ Verifies signed responses                              │
//! │                                                            │
//! │  SymmetricKey (both channel peers)                         │
//! │  ├─ Pre-shared                                             │
//! │  └─ Zeroed on drop                                         │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private and symmetric keys must NEVER be logged; Debug impls redact them
//! - `rsa::RsaPrivateKey` zeroizes its own limbs on drop
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::SYMMETRIC_KEY_SIZE;
use crate::error::{CoreError, Result};

// ============================================
// ProverKey (RSA private)
// ============================================

/// RSA private key used by the prover to sign challenges.
///
/// # Example
/// ```no_run
/// use devauth_core::crypto::ProverKey;
///
/// let prover = ProverKey::generate(2048).unwrap();
/// let verifier = prover.verifier_key();
/// assert_eq!(verifier.size(), 256);
/// ```
pub struct ProverKey {
    inner: RsaPrivateKey,
}

impl ProverKey {
    /// Generates a fresh RSA key of `bits` bits from the OS RNG.
    ///
    /// # Errors
    /// Returns `KeyLoad` if the RSA backend rejects the size.
    pub fn generate(bits: usize) -> Result<Self> {
        let inner = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CoreError::key_load(format!("RSA-{bits} generation: {e}")))?;
        Ok(Self { inner })
    }

    /// Returns the matching public half.
    #[must_use]
    pub fn verifier_key(&self) -> VerifierKey {
        VerifierKey::from(self.inner.to_public_key())
    }

    /// Modulus size in bytes, which is also the signature length.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub(crate) fn as_rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl From<RsaPrivateKey> for ProverKey {
    fn from(inner: RsaPrivateKey) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for ProverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material
        f.debug_struct("ProverKey")
            .field("bits", &(self.size() * 8))
            .finish_non_exhaustive()
    }
}

// ============================================
// VerifierKey (RSA public)
// ============================================

/// RSA public key used by the verifier to check signed responses.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifierKey {
    inner: RsaPublicKey,
}

impl VerifierKey {
    /// Modulus size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub(crate) fn as_rsa(&self) -> &RsaPublicKey {
        &self.inner
    }
}

impl From<RsaPublicKey> for VerifierKey {
    fn from(inner: RsaPublicKey) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for VerifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierKey")
            .field("bits", &(self.size() * 8))
            .finish()
    }
}

// ============================================
// SymmetricKey (AES-256)
// ============================================

/// Pre-shared AES-256 key for the secure channel.
///
/// # Security
/// - Zeroed on drop
/// - Debug output is redacted
///
/// # Example
/// ```
/// use devauth_core::crypto::SymmetricKey;
///
/// let key = SymmetricKey::from_slice(b"0123456789abcdef0123456789abcdef").unwrap();
/// assert_eq!(key.as_bytes().len(), 32);
///
/// assert!(SymmetricKey::from_slice(b"too short").is_err());
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_SIZE]);

impl SymmetricKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    /// Returns `CipherInit` if `bytes` is not exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; SYMMETRIC_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CoreError::cipher_init(SYMMETRIC_KEY_SIZE, bytes.len()))?;
        Ok(Self(key))
    }

    /// Creates a key from a hex string (64 hex characters).
    ///
    /// # Errors
    /// - `Decode` if the string is not valid hex
    /// - `CipherInit` if it does not decode to 32 bytes
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|e| CoreError::decode("symmetric key hex", e.to_string()))?,
        );
        Self::from_slice(&bytes)
    }

    /// Generates a random key. Mostly useful for tests and provisioning.
    #[must_use]
    pub fn generate() -> Self {
        use rand::RngCore;

        let mut key = [0u8; SYMMETRIC_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

// ============================================
// Test Keys
// ============================================

/// Shared RSA key for unit tests. Generation is slow in debug builds so
/// it happens once per test binary.
#[cfg(test)]
pub(crate) fn test_prover_key() -> &'static ProverKey {
    use std::sync::OnceLock;

    static KEY: OnceLock<ProverKey> = OnceLock::new();
    KEY.get_or_init(|| ProverKey::generate(1024).expect("test key generation"))
}

// ============================================
// Tests
// ============================================
