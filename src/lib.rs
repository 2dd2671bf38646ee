//! Personal File Vault Core Library
//!
//! This library provides the core functionality for an encrypted file vault:
//! key derivation, authenticated encryption, the on-disk container, the audit
//! log, and the metadata sync client. Presentation layers (UI, content
//! classification, biometric prompts) are external collaborators that call
//! into this core.

pub mod analysis;
pub mod audit;
pub mod crypto;
pub mod events;
pub mod keystore;
pub mod platform;
pub mod sync;
pub mod vault;

pub use analysis::{Category, Classifier, ClassifierVerdict, RiskLevel};
pub use audit::{AuditEvent, AuditEventKind, AuditLog};
pub use crypto::{derive_key, EncryptedObject, MasterKey, Sidecar, CryptoError, KEY_LENGTH};
pub use events::{EventBus, VaultEvent};
pub use keystore::{CredentialStore, KeyringStore, MemoryStore};
pub use platform::{
    get_container_dir, get_data_dir, get_default_audit_log_path, get_default_sync_state_path,
};
pub use sync::{SyncClient, SyncError, SyncState};
pub use vault::{MetadataBlob, VaultCipher, VaultEntry, VaultStore};

use thiserror::Error;

/// Result type for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// General error type for vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Vault is locked")]
    VaultLocked,

    #[error("Secret store read failed: {0}")]
    StoreRead(String),

    #[error("Secret store write failed: {0}")]
    StoreWrite(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
