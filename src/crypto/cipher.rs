//! AES-256-GCM encryption and decryption of vault objects.
//!
//! On-disk layout per encrypted object:
//! - `{uuid}.encrypted`: one opaque combined blob `nonce(12) || ciphertext || auth_tag(16)`
//! - `{uuid}.encrypted.meta`: JSON sidecar with the original file name,
//!   encryption timestamp (epoch seconds), and the nonce duplicated as base64.
//!
//! Nonces are freshly random per encryption call; reuse under the same key is
//! a critical invariant violation, so there is no code path that accepts a
//! caller-supplied nonce.

use crate::crypto::keys::MasterKey;
use crate::crypto::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

/// Nonce length in bytes (96-bit GCM nonce).
pub const NONCE_LENGTH: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_LENGTH: usize = 16;

/// An encrypted vault object: `nonce || ciphertext || auth_tag` as one blob.
///
/// The blob is opaque to everything outside this module; the tag is verified
/// on decrypt and no partial plaintext is ever returned on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedObject {
    combined: Vec<u8>,
}

impl EncryptedObject {
    /// Reconstruct an object from stored bytes.
    ///
    /// The minimum is nonce + tag with an empty ciphertext, since empty
    /// plaintexts are legal.
    pub fn from_bytes(combined: Vec<u8>) -> Result<Self> {
        if combined.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(CryptoError::MalformedObject(format!(
                "Blob too short: {} bytes",
                combined.len()
            )));
        }
        Ok(Self { combined })
    }

    /// The combined blob as stored on disk.
    pub fn as_bytes(&self) -> &[u8] {
        &self.combined
    }

    /// Consume the object, returning the combined blob.
    pub fn into_bytes(self) -> Vec<u8> {
        self.combined
    }

    /// The 12-byte nonce prefix.
    pub fn nonce(&self) -> &[u8] {
        &self.combined[..NONCE_LENGTH]
    }

    fn ciphertext_with_tag(&self) -> &[u8] {
        &self.combined[NONCE_LENGTH..]
    }
}

/// Sidecar metadata stored next to each ciphertext object.
///
/// Field names match the container's JSON format exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sidecar {
    #[serde(rename = "originalFileName")]
    pub original_file_name: String,

    /// Epoch seconds at encryption time.
    #[serde(rename = "dateEncrypted")]
    pub date_encrypted: i64,

    /// Nonce duplicated as base64 (also present in the combined blob).
    pub nonce: String,
}

/// Encrypt plaintext bytes with a fresh random nonce.
///
/// Returns the combined object and its sidecar. Empty plaintexts are allowed;
/// the result is then just `nonce || tag`.
pub fn encrypt_bytes(
    key: &MasterKey,
    plaintext: &[u8],
    original_file_name: &str,
) -> Result<(EncryptedObject, Sidecar)> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let nonce_bytes: [u8; NONCE_LENGTH] = nonce.into();

    // aes-gcm appends the auth tag to the ciphertext
    let ciphertext_with_tag = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

    let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext_with_tag.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext_with_tag);

    let sidecar = Sidecar {
        original_file_name: original_file_name.to_string(),
        date_encrypted: chrono::Utc::now().timestamp(),
        nonce: BASE64.encode(nonce_bytes),
    };

    Ok((EncryptedObject { combined }, sidecar))
}

/// Decrypt a combined object, verifying its authentication tag.
///
/// Tag mismatch and wrong key are indistinguishable by design; both surface
/// as [`CryptoError::IntegrityFailure`].
pub fn decrypt_object(key: &MasterKey, object: &EncryptedObject) -> Result<Vec<u8>> {
    let nonce_bytes: [u8; NONCE_LENGTH] = object.nonce()
        .try_into()
        .map_err(|_| CryptoError::MalformedObject("Invalid nonce length".to_string()))?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from(nonce_bytes);

    cipher
        .decrypt(&nonce, object.ciphertext_with_tag())
        .map_err(|_| CryptoError::IntegrityFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::derive_key;

    fn test_key() -> MasterKey {
        derive_key("cipher-test-password", b"cipher-test-salt")
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"Confidential report contents.";

        let (object, sidecar) = encrypt_bytes(&key, plaintext, "report.pdf").unwrap();
        assert_eq!(sidecar.original_file_name, "report.pdf");

        let decrypted = decrypt_object(&key, &object).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let key = test_key();
        let (object, _) = encrypt_bytes(&key, b"", "empty.txt").unwrap();
        assert_eq!(object.as_bytes().len(), NONCE_LENGTH + TAG_LENGTH);
        assert_eq!(decrypt_object(&key, &object).unwrap(), b"");
    }

    #[test]
    fn sidecar_nonce_matches_blob_prefix() {
        let key = test_key();
        let (object, sidecar) = encrypt_bytes(&key, b"data", "a.txt").unwrap();
        assert_eq!(sidecar.nonce, BASE64.encode(object.nonce()));
    }

    #[test]
    fn tampering_any_bit_is_detected() {
        let key = test_key();
        let (object, _) = encrypt_bytes(&key, b"Original data", "a.bin").unwrap();

        let blob = object.as_bytes().to_vec();
        for byte_index in 0..blob.len() {
            let mut tampered = blob.clone();
            tampered[byte_index] ^= 0x01;
            let tampered = EncryptedObject::from_bytes(tampered).unwrap();
            assert!(
                matches!(
                    decrypt_object(&key, &tampered),
                    Err(CryptoError::IntegrityFailure)
                ),
                "bit flip at byte {} was not detected",
                byte_index
            );
        }
    }

    #[test]
    fn wrong_key_fails_like_tampering() {
        let key = test_key();
        let wrong = derive_key("wrong-password", b"cipher-test-salt");

        let (object, _) = encrypt_bytes(&key, b"secret", "s.txt").unwrap();
        assert!(matches!(
            decrypt_object(&wrong, &object),
            Err(CryptoError::IntegrityFailure)
        ));
    }

    #[test]
    fn nonces_never_repeat() {
        let key = test_key();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            let (object, _) = encrypt_bytes(&key, b"x", "n.txt").unwrap();
            assert!(seen.insert(object.nonce().to_vec()), "nonce repeated");
        }
    }

    #[test]
    fn from_bytes_rejects_truncated_blob() {
        assert!(EncryptedObject::from_bytes(vec![0u8; NONCE_LENGTH + TAG_LENGTH - 1]).is_err());
        assert!(EncryptedObject::from_bytes(vec![0u8; NONCE_LENGTH + TAG_LENGTH]).is_ok());
    }

    #[test]
    fn sidecar_json_uses_container_field_names() {
        let sidecar = Sidecar {
            original_file_name: "report.pdf".to_string(),
            date_encrypted: 1_700_000_000,
            nonce: "AAAA".to_string(),
        };
        let json = serde_json::to_value(&sidecar).unwrap();
        assert!(json.get("originalFileName").is_some());
        assert!(json.get("dateEncrypted").is_some());
        assert!(json.get("nonce").is_some());
    }
}
