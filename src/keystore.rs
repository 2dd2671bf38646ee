//! Platform-secured credential store for the wrapped master key.
//!
//! The derived key bytes live in the OS secret store (Keychain, Credential
//! Manager, Secret Service) under one fixed application-scoped account name,
//! outside the vault's own files. They survive process restarts and are never
//! part of any plaintext backup/export path taken by the container.

use crate::crypto::KEY_LENGTH;
use crate::{Result, VaultError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::collections::HashMap;
use std::sync::Mutex;
use zeroize::Zeroize;

/// Service name used for the secret-store entry.
pub const KEYSTORE_SERVICE: &str = "havenvault";

/// Account name of the single master-key entry.
pub const KEYSTORE_ACCOUNT: &str = "havenvault.master-key";

/// Storage seam for the derived master key material.
///
/// Constructed explicitly and injected into [`crate::VaultCipher`]; tests use
/// [`MemoryStore`] instead of the OS secret store.
pub trait CredentialStore: Send + Sync {
    /// True iff a key exists under this application's identifier.
    fn is_initialized(&self) -> bool;

    /// Overwrite any existing entry (delete-then-add semantics).
    fn save(&self, key_bytes: &[u8]) -> Result<()>;

    /// Load the stored key bytes.
    fn load(&self) -> Result<Vec<u8>>;
}

/// OS secret-store backend via the `keyring` crate.
pub struct KeyringStore {
    service: String,
    account: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: KEYSTORE_SERVICE.to_string(),
            account: KEYSTORE_ACCOUNT.to_string(),
        }
    }

    /// A store scoped to a non-default account, for side-by-side vaults.
    pub fn with_account(account: &str) -> Self {
        Self {
            service: KEYSTORE_SERVICE.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| VaultError::StoreRead(format!("Failed to open keyring entry: {}", e)))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn is_initialized(&self) -> bool {
        self.entry()
            .and_then(|e| {
                e.get_password()
                    .map(|_| ())
                    .map_err(|err| VaultError::StoreRead(err.to_string()))
            })
            .is_ok()
    }

    fn save(&self, key_bytes: &[u8]) -> Result<()> {
        let entry = self
            .entry()
            .map_err(|e| VaultError::StoreWrite(e.to_string()))?;

        // Stale entries are removed first; NoEntry is not an error here.
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => {
                return Err(VaultError::StoreWrite(format!(
                    "Failed to clear previous key: {}",
                    e
                )))
            }
        }

        // Base64 keeps the stored value UTF-8 safe across keychain backends.
        let mut encoded = BASE64.encode(key_bytes);
        let result = entry
            .set_password(&encoded)
            .map_err(|e| VaultError::StoreWrite(format!("Failed to store key: {}", e)));
        encoded.zeroize();
        result
    }

    fn load(&self) -> Result<Vec<u8>> {
        let entry = self.entry()?;
        let mut encoded = entry
            .get_password()
            .map_err(|e| VaultError::StoreRead(format!("Failed to read key: {}", e)))?;

        let decoded = BASE64
            .decode(&encoded)
            .map_err(|e| VaultError::StoreRead(format!("Stored key is not valid base64: {}", e)));
        encoded.zeroize();

        let bytes = decoded?;
        if bytes.len() != KEY_LENGTH {
            return Err(VaultError::StoreRead(format!(
                "Stored key has wrong length: {}",
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

/// In-memory credential store for tests and ephemeral vaults.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn is_initialized(&self) -> bool {
        self.entries
            .lock()
            .map(|m| m.contains_key(KEYSTORE_ACCOUNT))
            .unwrap_or(false)
    }

    fn save(&self, key_bytes: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| VaultError::StoreWrite("Store lock poisoned".to_string()))?;
        entries.insert(KEYSTORE_ACCOUNT.to_string(), key_bytes.to_vec());
        Ok(())
    }

    fn load(&self) -> Result<Vec<u8>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| VaultError::StoreRead("Store lock poisoned".to_string()))?;
        entries
            .get(KEYSTORE_ACCOUNT)
            .cloned()
            .ok_or_else(|| VaultError::StoreRead("No key stored".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_starts_uninitialized() {
        let store = MemoryStore::new();
        assert!(!store.is_initialized());
        assert!(store.load().is_err());
    }

    #[test]
    fn memory_store_save_load_roundtrip() {
        let store = MemoryStore::new();
        store.save(&[42u8; 32]).unwrap();
        assert!(store.is_initialized());
        assert_eq!(store.load().unwrap(), vec![42u8; 32]);
    }

    #[test]
    fn memory_store_save_overwrites() {
        let store = MemoryStore::new();
        store.save(&[1u8; 32]).unwrap();
        store.save(&[2u8; 32]).unwrap();
        assert_eq!(store.load().unwrap(), vec![2u8; 32]);
    }
}
