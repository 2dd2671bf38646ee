//! On-disk encrypted container.
//!
//! One directory holds `{uuid}.encrypted` ciphertext objects with
//! `{uuid}.encrypted.meta` JSON sidecars. A ciphertext object without a
//! readable, well-formed sidecar is treated as corrupt and skipped during
//! enumeration - never fatal to the rest of the container.

use crate::analysis::ClassifierVerdict;
use crate::audit::{AuditEvent, AuditEventKind, AuditLog};
use crate::crypto::{EncryptedObject, Sidecar};
use crate::events::{EventBus, VaultEvent};
use crate::vault::cipher::VaultCipher;
use crate::{Result, VaultError};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Suffix of ciphertext objects in the container directory.
const OBJECT_SUFFIX: &str = "encrypted";

/// One user file stored in the vault.
///
/// Immutable except for deletion: one ciphertext object plus one sidecar,
/// both addressed by the generated identifier.
#[derive(Debug, Clone)]
pub struct VaultEntry {
    pub id: Uuid,
    pub original_name: String,
    pub ciphertext_path: PathBuf,
    pub date_added: DateTime<Utc>,
    pub size: u64,
    /// Opaque classifier annotation; not persisted in the sidecar.
    pub analysis: Option<ClassifierVerdict>,
}

impl VaultEntry {
    /// Attach a classifier verdict to this entry.
    pub fn with_analysis(mut self, verdict: ClassifierVerdict) -> Self {
        self.analysis = Some(verdict);
        self
    }

    fn sidecar_path(&self) -> PathBuf {
        sidecar_path_for(&self.ciphertext_path)
    }
}

fn sidecar_path_for(ciphertext_path: &Path) -> PathBuf {
    let mut name = ciphertext_path.as_os_str().to_os_string();
    name.push(".meta");
    PathBuf::from(name)
}

/// Manages the encrypted container directory.
pub struct VaultStore {
    container_dir: PathBuf,
    cipher: Arc<VaultCipher>,
    audit: Arc<AuditLog>,
    events: EventBus,
}

impl VaultStore {
    /// Open (creating if needed) the container at the given directory.
    pub fn open<P: AsRef<Path>>(
        container_dir: P,
        cipher: Arc<VaultCipher>,
        audit: Arc<AuditLog>,
        events: EventBus,
    ) -> Result<Self> {
        let container_dir = container_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&container_dir)?;

        Ok(Self {
            container_dir,
            cipher,
            audit,
            events,
        })
    }

    /// The container directory path.
    pub fn container_dir(&self) -> &Path {
        &self.container_dir
    }

    /// Encrypt raw bytes into the container under a fresh identifier.
    ///
    /// Identifiers are random 128-bit UUIDs, so concurrent adds cannot
    /// collide.
    pub fn add_file(&self, raw_bytes: &[u8], name: &str) -> Result<VaultEntry> {
        let (object, sidecar) = self.cipher.encrypt(raw_bytes, name)?;

        let id = Uuid::new_v4();
        let ciphertext_path = self
            .container_dir
            .join(format!("{}.{}", id, OBJECT_SUFFIX));
        let sidecar_path = sidecar_path_for(&ciphertext_path);

        std::fs::write(&ciphertext_path, object.as_bytes())?;
        let sidecar_json = serde_json::to_vec(&sidecar)
            .map_err(|e| VaultError::InvalidInput(format!("Unserializable sidecar: {}", e)))?;
        std::fs::write(&sidecar_path, sidecar_json)?;

        let entry = VaultEntry {
            id,
            original_name: sidecar.original_file_name.clone(),
            size: object.as_bytes().len() as u64,
            date_added: DateTime::from_timestamp(sidecar.date_encrypted, 0).unwrap_or_default(),
            ciphertext_path,
            analysis: None,
        };

        self.events.publish(VaultEvent::EntryAdded(entry.id));
        Ok(entry)
    }

    /// Enumerate the container, newest first.
    ///
    /// Objects with missing or corrupt sidecars are logged and skipped; a
    /// single bad entry never aborts enumeration of the rest.
    pub fn list_entries(&self) -> Result<Vec<VaultEntry>> {
        let mut entries = Vec::new();

        for dir_entry in std::fs::read_dir(&self.container_dir)? {
            let path = match dir_entry {
                Ok(e) => e.path(),
                Err(e) => {
                    warn!("Unreadable directory entry in container: {}", e);
                    continue;
                }
            };

            if path.extension().and_then(|e| e.to_str()) != Some(OBJECT_SUFFIX) {
                continue;
            }

            match self.load_entry(&path) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping corrupt vault entry {:?}: {}", path, e),
            }
        }

        entries.sort_by(|a, b| {
            b.date_added
                .cmp(&a.date_added)
                .then_with(|| a.original_name.cmp(&b.original_name))
        });
        Ok(entries)
    }

    /// Decrypt an entry's file bytes.
    pub fn read_entry(&self, entry: &VaultEntry) -> Result<Vec<u8>> {
        let object = EncryptedObject::from_bytes(std::fs::read(&entry.ciphertext_path)?)?;
        let sidecar = self.read_sidecar(&entry.sidecar_path())?;

        let (plaintext, original_name) = self.cipher.decrypt(&object, &sidecar)?;

        let _ = self.audit.append(AuditEvent::now(
            AuditEventKind::FileAccessed,
            Some(original_name),
            "File accessed from vault",
        ));
        Ok(plaintext)
    }

    /// Remove an entry's ciphertext object and sidecar.
    ///
    /// Both removals are attempted even when one object is already missing.
    /// Ordinary file deletion only; the underlying storage is not securely
    /// wiped (known limitation).
    pub fn delete_entry(&self, entry: &VaultEntry) -> Result<()> {
        let ciphertext_result = remove_if_present(&entry.ciphertext_path);
        let sidecar_result = remove_if_present(&entry.sidecar_path());

        ciphertext_result?;
        sidecar_result?;

        let _ = self.audit.append(AuditEvent::now(
            AuditEventKind::FileDeleted,
            Some(entry.original_name.clone()),
            "File removed from vault",
        ));
        self.events.publish(VaultEvent::EntryRemoved(entry.id));
        Ok(())
    }

    fn load_entry(&self, ciphertext_path: &Path) -> Result<VaultEntry> {
        let stem = ciphertext_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| VaultError::InvalidInput("Object has no file stem".to_string()))?;
        let id = Uuid::parse_str(stem)
            .map_err(|e| VaultError::InvalidInput(format!("Object name is not a UUID: {}", e)))?;

        let sidecar = self.read_sidecar(&sidecar_path_for(ciphertext_path))?;
        let size = std::fs::metadata(ciphertext_path)?.len();

        Ok(VaultEntry {
            id,
            original_name: sidecar.original_file_name,
            date_added: DateTime::from_timestamp(sidecar.date_encrypted, 0).unwrap_or_default(),
            size,
            ciphertext_path: ciphertext_path.to_path_buf(),
            analysis: None,
        })
    }

    fn read_sidecar(&self, path: &Path) -> Result<Sidecar> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| VaultError::InvalidInput(format!("Malformed sidecar: {}", e)))
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
