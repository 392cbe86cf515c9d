// ============================================
// File: crates/devauth-core/src/crypto/provider.rs
// ============================================
//! # Key Provider
//!
//! ## Creation Reason
//! Key provisioning lives outside the protocol. This module is the seam
//! between the two: protocol components take keys, a `KeyProvider`
//! produces them.
//!
//! ## Main Functionality
//! - `KeyProvider`: Trait for sources of prover/verifier keys
//! - `PemKeyProvider`: Loads keys from PEM files on disk
//!
//! ## Accepted Formats
//! - Private key: PKCS#8 (`BEGIN PRIVATE KEY`), then PKCS#1 (`BEGIN RSA PRIVATE KEY`)
//! - Public key: PKIX (`BEGIN PUBLIC KEY`), then PKCS#1 (`BEGIN RSA PUBLIC KEY`)
//!
//! A PKCS#8/PKIX document holding a non-RSA key fails both parsers and
//! is reported as `KeyLoad` here, at load time.
//!
//! ## Last Modified
//! v0.1.0 - Initial PEM provider

use std::fs;
use std::path::{Path, PathBuf};

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;
use zeroize::Zeroizing;

use super::keys::{ProverKey, VerifierKey};
use crate::error::{CoreError, Result};

// ============================================
// KeyProvider Trait
// ============================================

/// Source of asymmetric key material.
pub trait KeyProvider {
    /// Loads the private key used to sign challenges.
    ///
    /// # Errors
    /// Returns `KeyLoad` if no key is configured or it cannot be parsed.
    fn load_prover_key(&self) -> Result<ProverKey>;

    /// Loads the public key used to verify responses.
    ///
    /// # Errors
    /// Returns `KeyLoad` if no key is configured or it cannot be parsed.
    fn load_verifier_key(&self) -> Result<VerifierKey>;
}

// ============================================
// PemKeyProvider
// ============================================

/// Loads keys from PEM files.
///
/// Either path may be absent: a Responder only needs the private key
/// and an Authenticator only the public one.
#[derive(Debug, Clone, Default)]
pub struct PemKeyProvider {
    private_key_path: Option<PathBuf>,
    public_key_path: Option<PathBuf>,
}

impl PemKeyProvider {
    /// Creates a provider with no paths configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the private key file.
    #[must_use]
    pub fn with_private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    /// Sets the public key file.
    #[must_use]
    pub fn with_public_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.public_key_path = Some(path.into());
        self
    }

    fn read_pem(path: &Path) -> Result<Zeroizing<String>> {
        fs::read_to_string(path)
            .map(Zeroizing::new)
            .map_err(|e| CoreError::key_load(format!("reading {}: {e}", path.display())))
    }
}

/// Parses a PEM private key, PKCS#8 first then PKCS#1.
///
/// # Errors
/// Returns `KeyLoad` if neither encoding matches.
pub fn parse_private_key_pem(pem: &str) -> Result<ProverKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|pkcs8_err| {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                CoreError::key_load(format!(
                    "private key is neither PKCS#8 ({pkcs8_err}) nor PKCS#1 RSA ({pkcs1_err})"
                ))
            })
        })
        .map(ProverKey::from)
}

/// Parses a PEM public key, PKIX first then PKCS#1.
///
/// # Errors
/// Returns `KeyLoad` if neither encoding matches.
pub fn parse_public_key_pem(pem: &str) -> Result<VerifierKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|pkix_err| {
            RsaPublicKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                CoreError::key_load(format!(
                    "public key is neither PKIX RSA ({pkix_err}) nor PKCS#1 RSA ({pkcs1_err})"
                ))
            })
        })
        .map(VerifierKey::from)
}

impl KeyProvider for PemKeyProvider {
    fn load_prover_key(&self) -> Result<ProverKey> {
        let path = self
            .private_key_path
            .as_deref()
            .ok_or_else(|| CoreError::key_load("no private key file configured"))?;
        let pem = Self::read_pem(path)?;
        let key = parse_private_key_pem(&pem)?;
        debug!(path = %path.display(), bits = key.size() * 8, "Loaded private key");
        Ok(key)
    }

    fn load_verifier_key(&self) -> Result<VerifierKey> {
        let path = self
            .public_key_path
            .as_deref()
            .ok_or_else(|| CoreError::key_load("no public key file configured"))?;
        let pem = Self::read_pem(path)?;
        let key = parse_public_key_pem(&pem)?;
        debug!(path = %path.display(), bits = key.size() * 8, "Loaded public key");
        Ok(key)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use tempfile::NamedTempFile;

    use super::*;
    use crate::crypto::keys::test_prover_key;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_pkcs8_and_pkix() {
        let prover = test_prover_key();
        let private_pem = prover.as_rsa().to_pkcs8_pem(LineEnding::LF).unwrap();
        let public_pem = prover
            .verifier_key()
            .as_rsa()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();

        let private_file = write_temp(&private_pem);
        let public_file = write_temp(&public_pem);

        let provider = PemKeyProvider::new()
            .with_private_key(private_file.path())
            .with_public_key(public_file.path());

        let loaded = provider.load_prover_key().unwrap();
        assert_eq!(loaded.verifier_key(), prover.verifier_key());
        assert_eq!(provider.load_verifier_key().unwrap(), prover.verifier_key());
    }

    #[test]
    fn test_load_pkcs1_fallback() {
        let prover = test_prover_key();
        let private_pem = prover.as_rsa().to_pkcs1_pem(LineEnding::LF).unwrap();
        let public_pem = prover
            .verifier_key()
            .as_rsa()
            .to_pkcs1_pem(LineEnding::LF)
            .unwrap();

        assert_eq!(
            parse_private_key_pem(&private_pem).unwrap().verifier_key(),
            prover.verifier_key()
        );
        assert_eq!(parse_public_key_pem(&public_pem).unwrap(), prover.verifier_key());
    }

    #[test]
    fn test_garbage_pem_rejected() {
        let err = parse_private_key_pem("-----BEGIN NOTHING-----\n-----END NOTHING-----\n")
            .unwrap_err();
        assert!(err.is_crypto_error());
        assert!(parse_public_key_pem("not a key").is_err());
    }

    #[test]
    fn test_missing_paths() {
        let provider = PemKeyProvider::new();
        assert!(matches!(provider.load_prover_key(), Err(CoreError::KeyLoad { .. })));
        assert!(matches!(provider.load_verifier_key(), Err(CoreError::KeyLoad { .. })));

        let provider = PemKeyProvider::new().with_private_key("/nonexistent/devauth.pem");
        assert!(matches!(provider.load_prover_key(), Err(CoreError::KeyLoad { .. })));
    }
}
