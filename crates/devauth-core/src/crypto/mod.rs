// ============================================
// File: crates/devauth-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes all cryptographic operations for devauth, using RustCrypto
//! implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: Key types (RSA prover/verifier keys, AES shared key)
//! - [`provider`]: PEM key loading
//! - [`signature`]: Challenge signing and verification
//! - [`cipher`]: Secure channel encryption (AES-256-CFB)
//! - [`identity`]: Device identifier derivation (HMAC-SHA256)
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Authentication                           │
//! │  Verifier                                     Prover        │
//! │    │                                              │         │
//! │    │  challenge ─────────────────────────────►   │         │
//! │    │                   RSA-PKCS1v15(SHA-256(challenge))     │
//! │    │ ◄───────────────────────────── signature    │         │
//! │    │                                              │         │
//! │    │  verify(public key, challenge, signature)    │         │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Secure Channel                           │
//! │                                                             │
//! │   Shared Key + random IV ──► AES-256-CFB ──► IV||Cipher     │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL implementations use RustCrypto crates
//! - NEVER roll your own crypto
//! - The channel cipher is unauthenticated (see [`cipher`])
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod cipher;
pub mod identity;
pub mod keys;
pub mod provider;
pub mod signature;

// Re-export primary types at module level
pub use cipher::SymmetricCipher;
pub use identity::derive_device_id;
pub use keys::{ProverKey, SymmetricKey, VerifierKey};
pub use provider::{KeyProvider, PemKeyProvider};
pub use signature::{CryptoSigner, CryptoVerifier, RsaSigner, RsaVerifier};

// ============================================
// Constants
// ============================================

/// AES-256 key size in bytes.
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// AES block size, and therefore the CFB IV size, in bytes.
pub const IV_SIZE: usize = 16;

/// Fixed HMAC message used for device identifiers.
pub const DEVICE_ID_CONTEXT: &[u8] = b"UniqueIoTIdentifier";
