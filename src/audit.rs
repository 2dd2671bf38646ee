//! Append-only audit log of vault lifecycle and file-access events.
//!
//! The log is a single JSON array document rewritten in full on each append,
//! which is acceptable at the expected event volume. Audit logging is
//! best-effort by contract: failures are reported to the caller but must never
//! block the vault operation that triggered them, so every call site uses
//! `let _ = log.append(..)`.

use crate::{Result, VaultError};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Timestamp format used in the log document.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Audit event types covering the vault lifecycle and file access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventKind {
    #[serde(rename = "VAULT_UNLOCKED")]
    VaultUnlocked,
    #[serde(rename = "VAULT_LOCKED")]
    VaultLocked,
    #[serde(rename = "FILE_ENCRYPTED")]
    FileEncrypted,
    #[serde(rename = "FILE_DECRYPTED")]
    FileDecrypted,
    #[serde(rename = "FILE_ACCESSED")]
    FileAccessed,
    #[serde(rename = "FILE_DELETED")]
    FileDeleted,
}

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Formatted as `yyyy-MM-dd HH:mm:ss`.
    pub timestamp: String,
    #[serde(rename = "eventType")]
    pub event_type: AuditEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub details: String,
}

impl AuditEvent {
    /// Build an event stamped with the current time.
    pub fn now(event_type: AuditEventKind, filename: Option<String>, details: &str) -> Self {
        Self {
            timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            event_type,
            filename,
            details: details.to_string(),
        }
    }

    /// Parse the event timestamp back into a UTC instant.
    ///
    /// Events with unparseable timestamps sort as the epoch rather than being
    /// dropped.
    pub fn parsed_timestamp(&self) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or_else(|_| DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default())
    }
}

/// The audit log backed by one JSON array file.
pub struct AuditLog {
    log_path: PathBuf,
    // Serializes the read-modify-write append cycle.
    write_guard: Mutex<()>,
}

impl AuditLog {
    /// Open (or lazily create) the audit log at the given path.
    pub fn new<P: AsRef<Path>>(log_path: P) -> Self {
        Self {
            log_path: log_path.as_ref().to_path_buf(),
            write_guard: Mutex::new(()),
        }
    }

    /// Path to the backing document.
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Append one event, rewriting the full document.
    ///
    /// A missing or empty backing file initializes to an empty log. Existing
    /// events are preserved verbatim; the log is never pruned here.
    pub fn append(&self, event: AuditEvent) -> Result<()> {
        let _guard = self
            .write_guard
            .lock()
            .map_err(|_| VaultError::StoreWrite("Audit log lock poisoned".to_string()))?;

        let mut raw = self.read_raw_elements();
        raw.push(
            serde_json::to_value(&event)
                .map_err(|e| VaultError::InvalidInput(format!("Unserializable event: {}", e)))?,
        );

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let document = serde_json::to_vec_pretty(&raw)
            .map_err(|e| VaultError::InvalidInput(format!("Failed to render log: {}", e)))?;
        std::fs::write(&self.log_path, document)?;
        Ok(())
    }

    /// All decodable events, newest first.
    ///
    /// Individually undecodable elements are skipped, never fatal; a missing
    /// file reads as empty.
    pub fn read_all(&self) -> Vec<AuditEvent> {
        let mut events: Vec<AuditEvent> = self
            .read_raw_elements()
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Skipping undecodable audit entry: {}", e);
                    None
                }
            })
            .collect();

        events.sort_by_key(|e| std::cmp::Reverse(e.parsed_timestamp()));
        events
    }

    fn read_raw_elements(&self) -> Vec<serde_json::Value> {
        let Ok(content) = std::fs::read(&self.log_path) else {
            return Vec::new();
        };
        if content.is_empty() {
            return Vec::new();
        }
        match serde_json::from_slice::<Vec<serde_json::Value>>(&content) {
            Ok(elements) => elements,
            Err(e) => {
                warn!("Audit log document is not a JSON array, starting fresh: {}", e);
                Vec::new()
            }
        }
    }
}
