// ============================================
// File: crates/devauth-core/src/crypto/cipher.rs
// ============================================
//! # Symmetric Cipher
//!
//! ## Creation Reason
//! Encrypts application messages on the secure channel with the
//! pre-shared AES-256 key.
//!
//! ## Main Functionality
//! - `SymmetricCipher`: AES-256-CFB with a fresh random IV per message
//! - `encrypt` / `decrypt`: One-shot helpers that take a raw key slice
//!   and the hex wire form
//!
//! ## Encryption Flow
//! ```text
//!   IV ← OsRng (16 bytes)
//!   ciphertext = AES-256-CFB(key, IV, plaintext)      (no padding)
//!   wire       = hex(IV || ciphertext)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - CFB gives confidentiality only. There is NO integrity tag: a flipped
//!   ciphertext bit decrypts to a flipped plaintext bit without any error.
//!   Peers relying on this channel must treat plaintext as unauthenticated.
//! - NEVER reuse an IV with the same key; always go through `encrypt`
//!
//! ## Last Modified
//! v0.1.0 - Initial AES-CFB implementation

use aes::Aes256;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;

use super::keys::SymmetricKey;
use super::IV_SIZE;
use crate::error::Result;
use crate::protocol::CipherEnvelope;

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;

// ============================================
// SymmetricCipher
// ============================================

/// AES-256-CFB cipher bound to one shared key.
///
/// # Example
/// ```
/// use devauth_core::crypto::SymmetricCipher;
///
/// let cipher = SymmetricCipher::new(b"0123456789abcdef0123456789abcdef").unwrap();
/// let envelope = cipher.encrypt(b"hello");
/// assert_eq!(cipher.decrypt(&envelope), b"hello");
/// ```
#[derive(Debug, Clone)]
pub struct SymmetricCipher {
    key: SymmetricKey,
}

impl SymmetricCipher {
    /// Creates a cipher from raw key bytes.
    ///
    /// # Errors
    /// Returns `CipherInit` if `key` is not 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        Ok(Self::with_key(SymmetricKey::from_slice(key)?))
    }

    /// Creates a cipher from an already validated key.
    #[must_use]
    pub const fn with_key(key: SymmetricKey) -> Self {
        Self { key }
    }

    /// Encrypts `plaintext` under a fresh random IV.
    #[must_use]
    pub fn encrypt(&self, plaintext: &[u8]) -> CipherEnvelope {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let mut ciphertext = plaintext.to_vec();
        Aes256CfbEnc::new(self.key.as_bytes().into(), &iv.into()).encrypt(&mut ciphertext);

        CipherEnvelope { iv, ciphertext }
    }

    /// Decrypts an envelope.
    ///
    /// Without an integrity tag this cannot fail: a wrong key or tampered
    /// ciphertext yields garbage, not an error.
    #[must_use]
    pub fn decrypt(&self, envelope: &CipherEnvelope) -> Vec<u8> {
        let mut plaintext = envelope.ciphertext.clone();
        Aes256CfbDec::new(self.key.as_bytes().into(), &envelope.iv.into())
            .decrypt(&mut plaintext);
        plaintext
    }

    /// Encrypts and hex-encodes in one step.
    #[must_use]
    pub fn encrypt_to_hex(&self, plaintext: &[u8]) -> String {
        self.encrypt(plaintext).to_hex()
    }

    /// Decodes a received payload and decrypts it.
    ///
    /// # Errors
    /// Returns `Decode` if the payload is not a hex envelope.
    pub fn decrypt_wire(&self, payload: &[u8]) -> Result<Vec<u8>> {
        Ok(self.decrypt(&CipherEnvelope::from_wire(payload)?))
    }
}

// ============================================
// One-shot Helpers
// ============================================

/// Encrypts `plaintext` with a raw key, returning the hex envelope.
///
/// # Errors
/// Returns `CipherInit` if `key` is not 32 bytes. No cipher work is done
/// in that case.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<String> {
    Ok(SymmetricCipher::new(key)?.encrypt_to_hex(plaintext))
}

/// Decrypts a hex envelope with a raw key.
///
/// # Errors
/// - `CipherInit` if `key` is not 32 bytes (checked before decoding)
/// - `Decode` if `envelope` is not hex or shorter than one IV
pub fn decrypt(key: &[u8], envelope: &str) -> Result<Vec<u8>> {
    let cipher = SymmetricCipher::new(key)?;
    Ok(cipher.decrypt(&CipherEnvelope::from_hex(envelope)?))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_roundtrip() {
        let wire = encrypt(KEY, b"hello").unwrap();
        assert_eq!(decrypt(KEY, &wire).unwrap(), b"hello");
    }

    #[test]
    fn test_iv_freshness() {
        let a = encrypt(KEY, b"hello").unwrap();
        let b = encrypt(KEY, b"hello").unwrap();
        assert_ne!(a, b);
        assert_ne!(a[..IV_SIZE * 2], b[..IV_SIZE * 2]);
    }

    #[test]
    fn test_envelope_layout() {
        let cipher = SymmetricCipher::new(KEY).unwrap();
        let env = cipher.encrypt(b"twelve bytes");
        // CFB is a stream mode: no padding
        assert_eq!(env.ciphertext.len(), 12);
        assert_ne!(env.ciphertext, b"twelve bytes");
        assert_eq!(cipher.encrypt_to_hex(b"x").len(), (IV_SIZE + 1) * 2);
    }

    #[test]
    fn test_empty_plaintext() {
        let wire = encrypt(KEY, b"").unwrap();
        assert_eq!(wire.len(), IV_SIZE * 2);
        assert!(decrypt(KEY, &wire).unwrap().is_empty());
    }

    #[test]
    fn test_known_vector() {
        // NIST SP 800-38A F.3.17, CFB128-AES256.Encrypt, first block
        let key = hex::decode("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4")
            .unwrap();
        let iv: [u8; IV_SIZE] = hex::decode("000102030405060708090a0b0c0d0e0f")
            .unwrap()
            .try_into()
            .unwrap();
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();

        let cipher = SymmetricCipher::new(&key).unwrap();
        let mut ciphertext = plaintext.clone();
        Aes256CfbEnc::new(cipher.key.as_bytes().into(), &iv.into()).encrypt(&mut ciphertext);
        assert_eq!(hex::encode(&ciphertext), "dc7e84bfda79164b7ecd8486985d3860");

        let env = CipherEnvelope { iv, ciphertext };
        assert_eq!(cipher.decrypt(&env), plaintext);
    }

    #[test]
    fn test_wrong_key_length_fails_first() {
        assert!(matches!(
            encrypt(b"short", b"hello"),
            Err(CoreError::CipherInit { expected: 32, actual: 5 })
        ));
        // key checked before the (invalid) envelope is looked at
        assert!(matches!(
            decrypt(b"short", "not hex"),
            Err(CoreError::CipherInit { .. })
        ));
    }

    #[test]
    fn test_malformed_envelope() {
        assert!(decrypt(KEY, "zz").unwrap_err().is_decode_error());
        assert!(decrypt(KEY, "00112233").unwrap_err().is_decode_error());
    }

    #[test]
    fn test_wrong_key_yields_garbage() {
        let wire = encrypt(KEY, b"hello").unwrap();
        let other = [0x55u8; 32];
        assert_ne!(decrypt(&other, &wire).unwrap(), b"hello");
    }

    #[test]
    fn test_decrypt_wire_payload() {
        let cipher = SymmetricCipher::new(KEY).unwrap();
        let wire = cipher.encrypt_to_hex(b"payload");
        assert_eq!(cipher.decrypt_wire(wire.as_bytes()).unwrap(), b"payload");
        assert!(cipher.decrypt_wire(&[0xff]).is_err());
    }
}
