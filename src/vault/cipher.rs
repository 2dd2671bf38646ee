//! Vault cipher state machine: Locked <-> Unlocked.
//!
//! Owns the in-memory master key's lifecycle. All key-state mutations go
//! through one mutex; encrypt/decrypt snapshot the key under that mutex at
//! call time, so a racing `lock()` cannot invalidate an in-flight operation
//! but does prevent any new one from starting.

use crate::audit::{AuditEvent, AuditEventKind, AuditLog};
use crate::crypto::{cipher, derive_key, EncryptedObject, MasterKey, Sidecar};
use crate::events::{EventBus, VaultEvent};
use crate::keystore::CredentialStore;
use crate::{Result, VaultError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Application-scoped KDF salt.
///
/// Fixed so that the same password always re-derives the same key across
/// restarts; the stored key in the credential store is what unlock compares
/// against.
pub const VAULT_SALT: &[u8] = b"havenvault.kdf.salt.v1";

/// Plaintext fields of the encrypted metadata blob sent to the sync server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataBlob {
    pub filename: String,
    pub size: u64,
    pub date_added: i64,
    pub file_id: String,
}

/// Authenticated encryption service gated on the vault lock state.
pub struct VaultCipher {
    key: Mutex<Option<MasterKey>>,
    store: Arc<dyn CredentialStore>,
    audit: Arc<AuditLog>,
    events: EventBus,
}

impl VaultCipher {
    /// Create a cipher in the Locked state.
    pub fn new(store: Arc<dyn CredentialStore>, audit: Arc<AuditLog>, events: EventBus) -> Self {
        Self {
            key: Mutex::new(None),
            store,
            audit,
            events,
        }
    }

    /// True iff a master key has been set up in the credential store.
    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    /// True iff the key is currently held in memory.
    pub fn is_unlocked(&self) -> bool {
        self.key.lock().map(|k| k.is_some()).unwrap_or(false)
    }

    /// Set up a new vault: derive the key, persist it, transition to Unlocked.
    pub fn setup(&self, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(VaultError::InvalidInput(
                "Password must not be empty".to_string(),
            ));
        }

        let key = derive_key(password, VAULT_SALT);
        self.store.save(key.as_bytes())?;
        self.set_unlocked(key)?;

        let _ = self.audit.append(AuditEvent::now(
            AuditEventKind::VaultUnlocked,
            None,
            "Vault set up and unlocked",
        ));
        Ok(())
    }

    /// Unlock with a password.
    ///
    /// The derived key is compared in constant time against the stored key;
    /// on mismatch the state stays Locked and the derived value is discarded
    /// without ever being logged or exposed.
    pub fn unlock_with_password(&self, password: &str) -> Result<()> {
        let derived = derive_key(password, VAULT_SALT);
        let stored = self.store.load()?;

        if !derived.ct_eq_bytes(&stored) {
            return Err(VaultError::AuthenticationFailed);
        }

        self.set_unlocked(derived)?;
        let _ = self.audit.append(AuditEvent::now(
            AuditEventKind::VaultUnlocked,
            None,
            "Vault unlocked with password",
        ));
        Ok(())
    }

    /// Unlock with raw key bytes supplied by an out-of-band credential gate
    /// (biometric prompt) that the OS has already validated.
    pub fn unlock_with_external_credential(&self, raw_key: &[u8]) -> Result<()> {
        let key = MasterKey::from_slice(raw_key)?;
        self.set_unlocked(key)?;
        let _ = self.audit.append(AuditEvent::now(
            AuditEventKind::VaultUnlocked,
            None,
            "Vault unlocked with external credential",
        ));
        Ok(())
    }

    /// Lock the vault, discarding the in-memory key. Idempotent.
    ///
    /// In-flight encrypt/decrypt calls that already snapshotted the key will
    /// complete; no new call may start once locked.
    pub fn lock(&self) {
        let was_unlocked = self
            .key
            .lock()
            .map(|mut key| key.take().is_some())
            .unwrap_or(false);

        if was_unlocked {
            let _ = self.audit.append(AuditEvent::now(
                AuditEventKind::VaultLocked,
                None,
                "Vault locked",
            ));
            self.events.publish(VaultEvent::Locked);
        }
    }

    /// Encrypt file bytes under the current key with a fresh nonce.
    pub fn encrypt(&self, plaintext: &[u8], original_name: &str) -> Result<(EncryptedObject, Sidecar)> {
        let key = self.snapshot_key()?;
        let (object, sidecar) = cipher::encrypt_bytes(&key, plaintext, original_name)?;

        let _ = self.audit.append(AuditEvent::now(
            AuditEventKind::FileEncrypted,
            Some(original_name.to_string()),
            "File encrypted and stored in vault",
        ));
        Ok((object, sidecar))
    }

    /// Decrypt a stored object, verifying its authentication tag.
    pub fn decrypt(&self, object: &EncryptedObject, sidecar: &Sidecar) -> Result<(Vec<u8>, String)> {
        let key = self.snapshot_key()?;
        let plaintext = cipher::decrypt_object(&key, object)?;

        let _ = self.audit.append(AuditEvent::now(
            AuditEventKind::FileDecrypted,
            Some(sidecar.original_file_name.clone()),
            &format!("File decrypted: {}", sidecar.original_file_name),
        ));
        Ok((plaintext, sidecar.original_file_name.clone()))
    }

    /// Encrypt a small metadata record for sync transport.
    ///
    /// Returns base64 of the combined `nonce || ciphertext || tag` blob; the
    /// server only ever sees this opaque string.
    pub fn encrypt_metadata_blob(&self, fields: &MetadataBlob) -> Result<String> {
        let key = self.snapshot_key()?;

        let json = serde_json::to_vec(fields)
            .map_err(|e| VaultError::InvalidInput(format!("Unserializable metadata: {}", e)))?;
        let (object, _) = cipher::encrypt_bytes(&key, &json, &fields.filename)?;

        Ok(BASE64.encode(object.as_bytes()))
    }

    // Fails, leaving the vault Locked, when the key state is unusable
    // (poisoned by a panicked holder); the Unlocked event is only published
    // once the key is actually stored.
    fn set_unlocked(&self, key: MasterKey) -> Result<()> {
        let mut slot = self.key.lock().map_err(|_| VaultError::VaultLocked)?;
        *slot = Some(key);
        drop(slot);

        self.events.publish(VaultEvent::Unlocked);
        Ok(())
    }

    fn snapshot_key(&self) -> Result<MasterKey> {
        self.key
            .lock()
            .map_err(|_| VaultError::VaultLocked)?
            .clone()
            .ok_or(VaultError::VaultLocked)
    }
}
