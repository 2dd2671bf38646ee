//! Per-device sync bookkeeping persisted between runs.
//!
//! Tracks the stable device identifier, the server continuation token, and a
//! per-record version counter with tombstones for deletions. Versions are the
//! conflict currency: the server keeps whichever copy of a record carries the
//! higher version.

use crate::sync::models::VaultFileMetadata;
use crate::vault::{MetadataBlob, VaultCipher, VaultEntry};
use crate::{Result, VaultError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Version bookkeeping for one record id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordVersion {
    pub version: i64,
    pub is_deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    device_id: String,
    sync_token: String,
    #[serde(default)]
    versions: HashMap<String, RecordVersion>,
}

/// Durable sync state for this device.
pub struct SyncState {
    path: PathBuf,
    device_id: String,
    sync_token: String,
    versions: HashMap<String, RecordVersion>,
}

impl SyncState {
    /// Load the state file, or create a fresh identity if none exists yet.
    ///
    /// A fresh state starts with an empty continuation token, which asks the
    /// server for its full record set on the first exchange.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        match std::fs::read(&path) {
            Ok(bytes) => {
                let persisted: PersistedState = serde_json::from_slice(&bytes)
                    .map_err(|e| VaultError::InvalidInput(format!("Malformed sync state: {}", e)))?;
                Ok(Self {
                    path,
                    device_id: persisted.device_id,
                    sync_token: persisted.sync_token,
                    versions: persisted.versions,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let state = Self {
                    path,
                    device_id: Uuid::new_v4().to_string(),
                    sync_token: String::new(),
                    versions: HashMap::new(),
                };
                state.save()?;
                Ok(state)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn sync_token(&self) -> &str {
        &self.sync_token
    }

    /// Adopt the continuation token returned by the server and persist.
    pub fn set_sync_token(&mut self, token: &str) -> Result<()> {
        self.sync_token = token.to_string();
        self.save()
    }

    /// Current version of a record, if this device has ever tracked it.
    pub fn version_of(&self, id: &Uuid) -> Option<&RecordVersion> {
        self.versions.get(&id.to_string())
    }

    /// Bump the version for a modified record. New records start at 1.
    pub fn record_modified(&mut self, id: &Uuid) -> Result<i64> {
        let slot = self
            .versions
            .entry(id.to_string())
            .or_insert(RecordVersion {
                version: 0,
                is_deleted: false,
            });
        slot.version += 1;
        slot.is_deleted = false;

        let version = slot.version;
        self.save()?;
        Ok(version)
    }

    /// Mark a record deleted, bumping its version so the tombstone wins
    /// against the stale live copy on other devices.
    pub fn record_deleted(&mut self, id: &Uuid) -> Result<i64> {
        let slot = self
            .versions
            .entry(id.to_string())
            .or_insert(RecordVersion {
                version: 0,
                is_deleted: false,
            });
        slot.version += 1;
        slot.is_deleted = true;

        let version = slot.version;
        self.save()?;
        Ok(version)
    }

    /// Merge server-side state into local bookkeeping after an exchange.
    pub fn absorb_remote(&mut self, updated: &[(String, i64)], deleted: &[String]) -> Result<()> {
        for (id, version) in updated {
            let slot = self.versions.entry(id.clone()).or_insert(RecordVersion {
                version: 0,
                is_deleted: false,
            });
            if *version > slot.version {
                slot.version = *version;
                slot.is_deleted = false;
            }
        }
        for id in deleted {
            if let Some(slot) = self.versions.get_mut(id) {
                slot.is_deleted = true;
            }
        }
        self.save()
    }

    /// Build the outbound record set for a push: one encrypted metadata blob
    /// per live vault entry plus tombstones for everything tracked as deleted.
    ///
    /// Requires the vault to be unlocked; the server never sees plaintext.
    pub fn prepare_records(
        &mut self,
        cipher: &VaultCipher,
        entries: &[VaultEntry],
    ) -> Result<Vec<VaultFileMetadata>> {
        let mut records = Vec::with_capacity(entries.len());
        let now = Utc::now();

        for entry in entries {
            let blob = MetadataBlob {
                filename: entry.original_name.clone(),
                size: entry.size,
                date_added: entry.date_added.timestamp(),
                file_id: entry.id.to_string(),
            };
            let encrypted_metadata = cipher.encrypt_metadata_blob(&blob)?;

            let version = match self.versions.get(&entry.id.to_string()) {
                Some(v) => v.version,
                None => self.record_modified(&entry.id)?,
            };

            records.push(VaultFileMetadata {
                id: entry.id,
                encrypted_metadata,
                version,
                last_modified: now,
                is_deleted: false,
            });
        }

        for (id, slot) in &self.versions {
            if !slot.is_deleted {
                continue;
            }
            let id = match Uuid::parse_str(id) {
                Ok(id) => id,
                Err(_) => continue,
            };
            records.push(VaultFileMetadata {
                id,
                encrypted_metadata: String::new(),
                version: slot.version,
                last_modified: now,
                is_deleted: true,
            });
        }

        Ok(records)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let persisted = PersistedState {
            device_id: self.device_id.clone(),
            sync_token: self.sync_token.clone(),
            versions: self.versions.clone(),
        };
        let json = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| VaultError::InvalidInput(format!("Unserializable sync state: {}", e)))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::events::EventBus;
    use crate::keystore::MemoryStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn state_path(dir: &TempDir) -> PathBuf {
        dir.path().join("sync_state.json")
    }

    fn unlocked_cipher(dir: &TempDir) -> VaultCipher {
        let audit = Arc::new(AuditLog::new(dir.path().join("audit.json")));
        let cipher = VaultCipher::new(Arc::new(MemoryStore::new()), audit, EventBus::new());
        cipher.setup("correct-horse").unwrap();
        cipher
    }

    fn entry_named(dir: &TempDir, id: Uuid, name: &str) -> VaultEntry {
        VaultEntry {
            id,
            original_name: name.to_string(),
            ciphertext_path: dir.path().join(format!("{}.encrypted", id)),
            date_added: Utc::now(),
            size: 42,
            analysis: None,
        }
    }

    #[test]
    fn fresh_state_generates_stable_device_id() {
        let dir = TempDir::new().unwrap();
        let first = SyncState::load_or_create(state_path(&dir)).unwrap();
        let device_id = first.device_id().to_string();
        assert!(!device_id.is_empty());
        assert_eq!(first.sync_token(), "");
        drop(first);

        let second = SyncState::load_or_create(state_path(&dir)).unwrap();
        assert_eq!(second.device_id(), device_id);
    }

    #[test]
    fn versions_start_at_one_and_increment() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load_or_create(state_path(&dir)).unwrap();
        let id = Uuid::new_v4();

        assert_eq!(state.record_modified(&id).unwrap(), 1);
        assert_eq!(state.record_modified(&id).unwrap(), 2);
        assert_eq!(state.version_of(&id).unwrap().version, 2);
        assert!(!state.version_of(&id).unwrap().is_deleted);
    }

    #[test]
    fn deletion_bumps_version_and_sets_tombstone() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load_or_create(state_path(&dir)).unwrap();
        let id = Uuid::new_v4();

        state.record_modified(&id).unwrap();
        assert_eq!(state.record_deleted(&id).unwrap(), 2);
        assert!(state.version_of(&id).unwrap().is_deleted);
    }

    #[test]
    fn token_and_versions_survive_reload() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        {
            let mut state = SyncState::load_or_create(state_path(&dir)).unwrap();
            state.record_modified(&id).unwrap();
            state.set_sync_token("token-17").unwrap();
        }

        let state = SyncState::load_or_create(state_path(&dir)).unwrap();
        assert_eq!(state.sync_token(), "token-17");
        assert_eq!(state.version_of(&id).unwrap().version, 1);
    }

    #[test]
    fn absorb_remote_keeps_higher_local_version() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load_or_create(state_path(&dir)).unwrap();
        let id = Uuid::new_v4();

        state.record_modified(&id).unwrap();
        state.record_modified(&id).unwrap();
        state.record_modified(&id).unwrap();

        state
            .absorb_remote(&[(id.to_string(), 2)], &[])
            .unwrap();
        assert_eq!(state.version_of(&id).unwrap().version, 3);

        state
            .absorb_remote(&[(id.to_string(), 9)], &[])
            .unwrap();
        assert_eq!(state.version_of(&id).unwrap().version, 9);
    }

    #[test]
    fn absorb_remote_marks_deleted_ids_as_tombstones() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load_or_create(state_path(&dir)).unwrap();
        let id = Uuid::new_v4();

        state.record_modified(&id).unwrap();
        state.absorb_remote(&[], &[id.to_string()]).unwrap();

        let slot = state.version_of(&id).unwrap();
        assert!(slot.is_deleted);
        assert_eq!(slot.version, 1);
    }

    #[test]
    fn prepare_records_builds_live_records_and_tombstones() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load_or_create(state_path(&dir)).unwrap();
        let cipher = unlocked_cipher(&dir);

        let live_id = Uuid::new_v4();
        let entry = entry_named(&dir, live_id, "report.pdf");

        let gone_id = Uuid::new_v4();
        state.record_modified(&gone_id).unwrap();
        state.record_deleted(&gone_id).unwrap();

        let records = state.prepare_records(&cipher, &[entry]).unwrap();
        assert_eq!(records.len(), 2);

        let live = records.iter().find(|r| r.id == live_id).unwrap();
        assert!(!live.is_deleted);
        assert_eq!(live.version, 1);
        // Opaque to the server: an encrypted blob, never the plaintext name.
        assert!(!live.encrypted_metadata.is_empty());
        assert!(!live.encrypted_metadata.contains("report.pdf"));

        let tombstone = records.iter().find(|r| r.id == gone_id).unwrap();
        assert!(tombstone.is_deleted);
        assert_eq!(tombstone.version, 2);
        assert!(tombstone.encrypted_metadata.is_empty());
    }

    #[test]
    fn prepare_records_keeps_existing_versions_for_known_entries() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load_or_create(state_path(&dir)).unwrap();
        let cipher = unlocked_cipher(&dir);

        let id = Uuid::new_v4();
        state.record_modified(&id).unwrap();
        state.record_modified(&id).unwrap();

        let entry = entry_named(&dir, id, "notes.txt");
        let records = state.prepare_records(&cipher, &[entry]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, 2);
    }

    #[test]
    fn prepare_records_requires_unlocked_vault() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load_or_create(state_path(&dir)).unwrap();
        let cipher = unlocked_cipher(&dir);
        cipher.lock();

        let id = Uuid::new_v4();
        let entry = entry_named(&dir, id, "locked.txt");
        assert!(matches!(
            state.prepare_records(&cipher, &[entry]),
            Err(VaultError::VaultLocked)
        ));
    }

    #[test]
    fn malformed_state_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = state_path(&dir);
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            SyncState::load_or_create(&path),
            Err(VaultError::InvalidInput(_))
        ));
    }
}
