//! Master key handling.
//!
//! The master key exists only in process memory while the vault is unlocked.
//! It is never persisted directly - only its derivation inputs (password) or
//! the raw bytes inside the platform secret store.

use crate::crypto::{CryptoError, Result};
use subtle::ConstantTimeEq;
use zeroize::ZeroizeOnDrop;

/// Key length in bytes (256-bit key for AES-256-GCM).
pub const KEY_LENGTH: usize = 32;

/// The symmetric master key protecting all vault contents.
///
/// Zeroed on drop. Cloning is allowed so in-flight encrypt/decrypt calls can
/// snapshot the key under the lock and keep working even if a concurrent
/// `lock()` discards the original.
#[derive(Clone, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    /// Create a master key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create a master key from a byte slice, validating the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LENGTH,
                got: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Get a reference to the key bytes (use sparingly).
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Constant-time comparison against stored key material.
    ///
    /// Used during password unlock; never branches on key bytes.
    pub fn ct_eq_bytes(&self, other: &[u8]) -> bool {
        if other.len() != KEY_LENGTH {
            return false;
        }
        self.key.as_ref().ct_eq(other).into()
    }
}

impl std::fmt::Debug for MasterKey {
    // Key bytes must never appear in logs or messages.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}
