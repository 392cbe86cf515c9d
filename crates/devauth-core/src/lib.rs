// ============================================
// File: crates/devauth-core/src/lib.rs
// ============================================
//! # devauth Core - Protocol & Cryptography Library
//!
//! ## Creation Reason
//! Provides the challenge, signature and channel-encryption primitives
//! that the devauth peers are built from. Nothing in this crate touches
//! the network.
//!
//! ## Main Functionality
//!
//! ### Challenge ([`challenge`])
//! - `ChallengeGenerator`: fresh, unpredictable challenge per attempt
//!
//! ### Protocol Module ([`protocol`])
//! - Wire payload types (`Challenge`, `SignedResponse`, `CipherEnvelope`)
//! - Default topic names
//!
//! ### Crypto Module ([`crypto`])
//! - Key types (`ProverKey`, `VerifierKey`, `SymmetricKey`) and PEM loading
//! - RSA PKCS#1 v1.5 / SHA-256 signing and verification
//! - AES-256-CFB channel encryption
//! - Device identifier derivation (HMAC-SHA256)
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               devauth-peer                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   devauth-core          devauth-transport          │
//! │   You are here                │                    │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             devauth-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//! - **Authenticity**: RSA signatures over the verifier's challenge
//! - **Freshness**: one never-reused challenge per attempt
//! - **Confidentiality**: AES-256-CFB with a random IV per message
//! - **No integrity** on the channel: CFB carries no MAC
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses RustCrypto implementations
//! - NEVER implement custom crypto primitives
//! - Secret key types implement Zeroize or wrap types that do
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod challenge;
pub mod crypto;
pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use challenge::ChallengeGenerator;
pub use crypto::{
    CryptoSigner, CryptoVerifier, KeyProvider, PemKeyProvider, ProverKey, RsaSigner,
    RsaVerifier, SymmetricCipher, SymmetricKey, VerifierKey,
};
pub use error::{CoreError, Result};
pub use protocol::{Challenge, CipherEnvelope, SignedResponse};
