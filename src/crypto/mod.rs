//! Cryptographic primitives for the file vault.
//!
//! This module provides:
//! - Iterated SHA-256 key derivation
//! - AES-256-GCM encryption/decryption of file bytes and metadata blobs
//! - Master key handling with zeroization

pub mod cipher;
pub mod kdf;
pub mod keys;

pub use cipher::{decrypt_object, encrypt_bytes, EncryptedObject, Sidecar};
pub use kdf::{derive_key, KDF_ROUNDS};
pub use keys::{MasterKey, KEY_LENGTH};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KdfFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Integrity check failed - data may have been tampered with or the key is wrong")]
    IntegrityFailure,

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Malformed encrypted object: {0}")]
    MalformedObject(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
