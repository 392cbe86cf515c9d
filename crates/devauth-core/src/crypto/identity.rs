// ============================================
// File: crates/devauth-core/src/crypto/identity.rs
// ============================================
//! # Device Identity
//!
//! Derives a stable, non-reversible device identifier from a per-device
//! secret: `hex(HMAC-SHA256(key = secret, msg = "UniqueIoTIdentifier"))`.
//! Used to build broker client identifiers that survive restarts without
//! exposing the secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::DEVICE_ID_CONTEXT;
use crate::error::{CoreError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Derives the 64-hex-character device identifier for `secret`.
///
/// # Errors
/// Returns `KeyLoad` if the HMAC backend rejects the key.
pub fn derive_device_id(secret: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| CoreError::key_load(format!("device secret: {e}")))?;
    mac.update(DEVICE_ID_CONTEXT);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_shape() {
        let id = derive_device_id(b"device-secret").unwrap();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_device_id_stable_and_distinct() {
        assert_eq!(derive_device_id(b"a").unwrap(), derive_device_id(b"a").unwrap());
        assert_ne!(derive_device_id(b"a").unwrap(), derive_device_id(b"b").unwrap());
    }

    #[test]
    fn test_empty_secret_allowed() {
        assert_eq!(derive_device_id(b"").unwrap().len(), 64);
    }
}
