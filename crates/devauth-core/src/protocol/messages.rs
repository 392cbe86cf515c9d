// ============================================
// File: crates/devauth-core/src/protocol/messages.rs
// ============================================
//! # Protocol Messages
//!
//! ## Creation Reason
//! Gives each wire payload its own type so that a signature can never be
//! confused with a challenge, and so decoding rules live in one place.
//!
//! ## Main Functionality
//! - `Challenge`: Trimmed UTF-8 challenge text
//! - `SignedResponse`: Raw signature bytes, base64 on the wire
//! - `CipherEnvelope`: IV + ciphertext, hex on the wire
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::crypto::IV_SIZE;
use crate::error::{CoreError, Result};

fn wire_text<'a>(payload: &'a [u8], context: &str) -> Result<&'a str> {
    std::str::from_utf8(payload)
        .map(str::trim)
        .map_err(|e| CoreError::decode(context, format!("not UTF-8: {e}")))
}

// ============================================
// Challenge
// ============================================

/// Challenge text issued by the verifier.
///
/// Surrounding whitespace is never part of a challenge: both the prover
/// and the verifier sign/verify the trimmed bytes.
///
/// # Example
/// ```
/// use devauth_core::protocol::Challenge;
///
/// let c = Challenge::from_wire(b"  abc123\n").unwrap();
/// assert_eq!(c.as_str(), "abc123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Challenge(String);

impl Challenge {
    /// Creates a challenge from text, trimming it.
    ///
    /// # Errors
    /// Returns `Decode` if nothing is left after trimming.
    pub fn new(text: impl AsRef<str>) -> Result<Self> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CoreError::decode("challenge", "empty"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Wraps generator output that is known to be non-blank and trimmed.
    pub(crate) fn from_encoded(encoded: String) -> Self {
        debug_assert!(!encoded.is_empty() && encoded.trim() == encoded);
        Self(encoded)
    }

    /// Parses a challenge from a received payload.
    ///
    /// # Errors
    /// Returns `Decode` if the payload is not UTF-8 or is blank.
    pub fn from_wire(payload: &[u8]) -> Result<Self> {
        Self::new(wire_text(payload, "challenge")?)
    }

    /// The bytes that get signed.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The challenge text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================
// SignedResponse
// ============================================

/// Detached signature over a challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedResponse(Vec<u8>);

impl SignedResponse {
    /// Wraps raw signature bytes.
    #[must_use]
    pub const fn new(signature: Vec<u8>) -> Self {
        Self(signature)
    }

    /// Encodes for the wire (standard base64 with padding).
    #[must_use]
    pub fn encode(&self) -> String {
        BASE64.encode(&self.0)
    }

    /// Decodes a received payload.
    ///
    /// # Errors
    /// Returns `Decode` if the payload is not UTF-8, not base64, or empty.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let text = wire_text(payload, "signed response")?;
        if text.is_empty() {
            return Err(CoreError::decode("signed response", "empty"));
        }
        BASE64
            .decode(text)
            .map(Self)
            .map_err(|e| CoreError::decode("signed response", e.to_string()))
    }

    /// Raw signature bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SignedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedResponse({} bytes)", self.0.len())
    }
}

// ============================================
// CipherEnvelope
// ============================================

/// IV-prefixed ciphertext.
///
/// # Wire Format
/// ```text
/// hex( iv (16 bytes) || ciphertext (len(plaintext) bytes) )
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherEnvelope {
    /// Per-message random IV
    pub iv: [u8; IV_SIZE],
    /// CFB ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
}

impl CipherEnvelope {
    /// Splits raw `IV || ciphertext` bytes.
    ///
    /// # Errors
    /// Returns `Decode` if `bytes` is shorter than one IV.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IV_SIZE {
            return Err(CoreError::decode(
                "cipher envelope",
                format!("{} bytes is shorter than the {IV_SIZE}-byte IV", bytes.len()),
            ));
        }
        let (iv, ciphertext) = bytes.split_at(IV_SIZE);
        let mut iv_arr = [0u8; IV_SIZE];
        iv_arr.copy_from_slice(iv);
        Ok(Self {
            iv: iv_arr,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Joins IV and ciphertext.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IV_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Encodes for the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Decodes a hex envelope.
    ///
    /// # Errors
    /// Returns `Decode` if the text is not hex or too short.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| CoreError::decode("cipher envelope", e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Decodes a received payload.
    ///
    /// # Errors
    /// Returns `Decode` if the payload is not UTF-8 hex or too short.
    pub fn from_wire(payload: &[u8]) -> Result<Self> {
        Self::from_hex(wire_text(payload, "cipher envelope")?)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_trimmed() {
        let c = Challenge::from_wire(b"\t abc123 \r\n").unwrap();
        assert_eq!(c.as_bytes(), b"abc123");
        assert_eq!(c, Challenge::new("abc123").unwrap());
    }

    #[test]
    fn test_challenge_rejects_bad_payloads() {
        assert!(Challenge::from_wire(&[0xff, 0xfe, 0x00]).unwrap_err().is_decode_error());
        assert!(Challenge::from_wire(b"   \n").unwrap_err().is_decode_error());
    }

    #[test]
    fn test_signed_response_wire() {
        let resp = SignedResponse::new(vec![1, 2, 3, 250]);
        assert_eq!(resp.encode(), "AQID+g==");

        let decoded = SignedResponse::decode(b" AQID+g==\n").unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn test_signed_response_decode_errors() {
        assert!(SignedResponse::decode(b"not base64!").unwrap_err().is_decode_error());
        assert!(SignedResponse::decode(b"").unwrap_err().is_decode_error());
        assert!(SignedResponse::decode(&[0xc3, 0x28]).unwrap_err().is_decode_error());
    }

    #[test]
    fn test_signed_response_debug_hides_bytes() {
        let resp = SignedResponse::new(vec![0xaa; 128]);
        assert_eq!(format!("{resp:?}"), "SignedResponse(128 bytes)");
    }

    #[test]
    fn test_envelope_split() {
        let mut raw = vec![9u8; IV_SIZE];
        raw.extend_from_slice(b"cipher");
        let env = CipherEnvelope::from_bytes(&raw).unwrap();
        assert_eq!(env.iv, [9u8; IV_SIZE]);
        assert_eq!(env.ciphertext, b"cipher");
        assert_eq!(CipherEnvelope::from_hex(&env.to_hex()).unwrap(), env);
    }

    #[test]
    fn test_envelope_iv_only_is_empty_message() {
        let env = CipherEnvelope::from_bytes(&[0u8; IV_SIZE]).unwrap();
        assert!(env.ciphertext.is_empty());
    }

    #[test]
    fn test_envelope_too_short() {
        let err = CipherEnvelope::from_bytes(&[0u8; IV_SIZE - 1]).unwrap_err();
        assert!(err.is_decode_error());
        assert!(CipherEnvelope::from_hex("00ff").unwrap_err().is_decode_error());
        assert!(CipherEnvelope::from_hex("xyz").unwrap_err().is_decode_error());
        assert!(CipherEnvelope::from_wire(b"abc").unwrap_err().is_decode_error());
    }
}
