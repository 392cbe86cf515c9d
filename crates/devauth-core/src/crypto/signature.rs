// ============================================
// File: crates/devauth-core/src/crypto/signature.rs
// ============================================
//! # Challenge Signatures
//!
//! ## Creation Reason
//! The prover demonstrates possession of its private key by signing the
//! verifier's challenge; the verifier checks that signature with the
//! matching public key.
//!
//! ## Main Functionality
//! - `CryptoSigner` / `CryptoVerifier`: Traits used by the peer roles
//! - `RsaSigner` / `RsaVerifier`: RSASSA-PKCS1-v1_5 over SHA-256
//!
//! ## Signature Scheme
//! ```text
//!   message ──► SHA-256 ──► digest ──► PKCS#1 v1.5 (DigestInfo + pad) ──► RSA
//! ```
//! PKCS#1 v1.5 padding is deterministic: the same key and message always
//! produce the same signature bytes.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `verify` answers a yes/no question and never errors. Inputs that are
//!   not even well-formed (bad base64) are rejected earlier, when the
//!   `SignedResponse` is decoded.
//! - Callers trim the challenge BEFORE signing/verifying (see `Challenge`)
//!
//! ## Last Modified
//! v0.1.0 - Initial RSA implementation

use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256};
use tracing::trace;

use super::keys::{ProverKey, VerifierKey};
use crate::error::{CoreError, Result};

// ============================================
// Traits
// ============================================

/// Produces detached signatures.
pub trait CryptoSigner: Send + Sync {
    /// Signs `message`, returning the raw signature bytes.
    ///
    /// # Errors
    /// Returns `SignatureCreation` if the key cannot sign a SHA-256 digest.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Checks detached signatures.
pub trait CryptoVerifier: Send + Sync {
    /// Returns `true` iff `signature` is valid for `message`.
    fn verify(&self, message: &[u8], signature: &[u8]) -> bool;
}

// ============================================
// RSA Implementations
// ============================================

fn sha256(message: &[u8]) -> [u8; 32] {
    Sha256::digest(message).into()
}

/// RSA PKCS#1 v1.5 / SHA-256 signer.
#[derive(Debug)]
pub struct RsaSigner {
    key: ProverKey,
}

impl RsaSigner {
    /// Creates a signer that owns `key`.
    #[must_use]
    pub const fn new(key: ProverKey) -> Self {
        Self { key }
    }

    /// Length of the signatures this signer produces.
    #[must_use]
    pub fn signature_len(&self) -> usize {
        self.key.size()
    }
}

impl CryptoSigner for RsaSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let digest = sha256(message);
        let signature = self
            .key
            .as_rsa()
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| CoreError::signing(e.to_string()))?;
        trace!(message_len = message.len(), signature_len = signature.len(), "Signed message");
        Ok(signature)
    }
}

/// RSA PKCS#1 v1.5 / SHA-256 verifier.
#[derive(Debug, Clone)]
pub struct RsaVerifier {
    key: VerifierKey,
}

impl RsaVerifier {
    /// Creates a verifier for `key`.
    #[must_use]
    pub const fn new(key: VerifierKey) -> Self {
        Self { key }
    }
}

impl CryptoVerifier for RsaVerifier {
    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let digest = sha256(message);
        match self
            .key
            .as_rsa()
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        {
            Ok(()) => true,
            Err(e) => {
                trace!(error = %e, "Signature rejected");
                false
            }
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::test_prover_key;

    fn signer() -> RsaSigner {
        // RsaSigner owns its key; rebuild one from the shared test key.
        RsaSigner::new(ProverKey::from(test_prover_key().as_rsa().clone()))
    }

    fn verifier() -> RsaVerifier {
        RsaVerifier::new(test_prover_key().verifier_key())
    }

    #[test]
    fn test_sign_verify() {
        let signature = signer().sign(b"abc123").unwrap();
        assert_eq!(signature.len(), 128);
        assert!(verifier().verify(b"abc123", &signature));
    }

    #[test]
    fn test_wrong_challenge_rejected() {
        let signature = signer().sign(b"abc123").unwrap();
        assert!(!verifier().verify(b"xyz789", &signature));
    }

    #[test]
    fn test_signatures_are_deterministic() {
        let s = signer();
        assert_eq!(s.sign(b"same").unwrap(), s.sign(b"same").unwrap());
        assert_ne!(s.sign(b"same").unwrap(), s.sign(b"other").unwrap());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let other = ProverKey::generate(1024).unwrap();
        let signature = RsaSigner::new(other).sign(b"abc123").unwrap();
        assert!(!verifier().verify(b"abc123", &signature));
    }

    #[test]
    fn test_garbage_signature_is_false_not_panic() {
        let v = verifier();
        assert!(!v.verify(b"abc123", &[]));
        assert!(!v.verify(b"abc123", &[0u8; 7]));
        assert!(!v.verify(b"abc123", &[0xff; 128]));
        assert!(!v.verify(b"abc123", &[0u8; 512]));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let mut signature = signer().sign(b"abc123").unwrap();
        signature[10] ^= 0x01;
        assert!(!verifier().verify(b"abc123", &signature));
    }
}
