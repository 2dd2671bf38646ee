//! Sync wire format: auth, metadata records, and the exchange bodies.
//!
//! Field names match the server's JSON exactly. Response decoding is
//! defensive: an individually-undecodable field degrades to a safe default,
//! but an explicit server `error` field always takes precedence.

use crate::sync::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credentials plus device identity sent to `/api/auth/{register,login}`.
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
    pub device_id: String,
}

/// Session payload returned on successful registration or login.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: i64,
    pub user_id: i64,
}

/// One encrypted metadata record as the server stores it.
///
/// `encrypted_data` is opaque to the server: base64 of an AEAD blob produced
/// by [`crate::VaultCipher::encrypt_metadata_blob`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadataRecord {
    pub id: String,
    pub encrypted_data: String,
    pub user_id: i64,
    /// Monotonic per-id version counter; bumped on every local modification.
    pub version: i64,
    pub last_modified_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// Local pre-wire form of a record, built from a vault entry.
#[derive(Debug, Clone)]
pub struct VaultFileMetadata {
    pub id: Uuid,
    pub encrypted_metadata: String,
    pub version: i64,
    pub last_modified: DateTime<Utc>,
    pub is_deleted: bool,
}

impl VaultFileMetadata {
    /// Convert to the wire record for the given owner.
    pub fn into_record(self, user_id: i64) -> FileMetadataRecord {
        FileMetadataRecord {
            id: self.id.to_string(),
            encrypted_data: self.encrypted_metadata,
            user_id,
            version: self.version,
            last_modified_at: self.last_modified,
            is_deleted: self.is_deleted,
        }
    }
}

/// Body of `POST /api/sync`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRequest {
    pub device_id: String,
    pub items: Vec<FileMetadataRecord>,
    pub sync_token: String,
}

/// The server's authoritative merged view since the sent continuation token.
#[derive(Debug, Clone)]
pub struct SyncExchange {
    pub updated_items: Vec<FileMetadataRecord>,
    pub deleted_ids: Vec<String>,
    pub sync_token: String,
    pub timestamp: DateTime<Utc>,
}

impl SyncExchange {
    /// Decode a sync response defensively.
    ///
    /// An explicit `error` field wins unconditionally. Otherwise each field
    /// that fails to decode falls back to its safe default (empty lists, the
    /// previous token semantics are the caller's concern, timestamp = now).
    pub fn from_value(value: &serde_json::Value) -> Result<Self, SyncError> {
        if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
            return Err(SyncError::Server(message.to_string()));
        }

        let updated_items = value
            .get("updated_items")
            .and_then(|items| items.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let deleted_ids = value
            .get("deleted_ids")
            .cloned()
            .and_then(|ids| serde_json::from_value(ids).ok())
            .unwrap_or_default();

        let sync_token = value
            .get("sync_token")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();

        let timestamp = value
            .get("timestamp")
            .and_then(|t| t.as_str())
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Self {
            updated_items,
            deleted_ids,
            sync_token,
            timestamp,
        })
    }
}

/// Body of `GET /api/sync/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncStatusResponse {
    pub last_sync_at: DateTime<Utc>,
    pub device_id: String,
    pub item_count: u64,
    pub sync_token: String,
}

/// `GET /api/status` probe body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatusResponse {
    pub status: String,
}

/// Error body shape used by the server on failures.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_wire_field_names() {
        let record = FileMetadataRecord {
            id: "abc".to_string(),
            encrypted_data: "b64".to_string(),
            user_id: 7,
            version: 3,
            last_modified_at: Utc::now(),
            is_deleted: false,
        };
        let value = serde_json::to_value(&record).unwrap();
        for key in [
            "id",
            "encrypted_data",
            "user_id",
            "version",
            "last_modified_at",
            "is_deleted",
        ] {
            assert!(value.get(key).is_some(), "missing wire field {}", key);
        }
    }

    #[test]
    fn exchange_decodes_complete_response() {
        let value = json!({
            "updated_items": [{
                "id": "one",
                "encrypted_data": "blob",
                "user_id": 1,
                "version": 2,
                "last_modified_at": "2026-01-05T12:00:00Z",
                "is_deleted": false
            }],
            "deleted_ids": ["two"],
            "sync_token": "token-9",
            "timestamp": "2026-01-05T12:00:01Z"
        });

        let exchange = SyncExchange::from_value(&value).unwrap();
        assert_eq!(exchange.updated_items.len(), 1);
        assert_eq!(exchange.updated_items[0].version, 2);
        assert_eq!(exchange.deleted_ids, vec!["two".to_string()]);
        assert_eq!(exchange.sync_token, "token-9");
        assert_eq!(
            exchange.timestamp,
            "2026-01-05T12:00:01Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn exchange_degrades_missing_fields_to_defaults() {
        let before = Utc::now();
        let exchange = SyncExchange::from_value(&json!({"sync_token": "t2"})).unwrap();
        assert!(exchange.updated_items.is_empty());
        assert!(exchange.deleted_ids.is_empty());
        assert_eq!(exchange.sync_token, "t2");
        assert!(exchange.timestamp >= before);
    }

    #[test]
    fn exchange_degrades_malformed_timestamp_to_now() {
        let before = Utc::now();
        let exchange =
            SyncExchange::from_value(&json!({"sync_token": "t", "timestamp": "not-a-date"}))
                .unwrap();
        assert!(exchange.timestamp >= before);
    }

    #[test]
    fn exchange_skips_undecodable_items_keeps_rest() {
        let value = json!({
            "updated_items": [
                {"bogus": true},
                {
                    "id": "keep",
                    "encrypted_data": "blob",
                    "user_id": 1,
                    "version": 1,
                    "last_modified_at": "2026-01-05T12:00:00Z",
                    "is_deleted": false
                }
            ],
            "sync_token": "t"
        });
        let exchange = SyncExchange::from_value(&value).unwrap();
        assert_eq!(exchange.updated_items.len(), 1);
        assert_eq!(exchange.updated_items[0].id, "keep");
    }

    #[test]
    fn explicit_server_error_always_wins() {
        let value = json!({
            "error": "version conflict",
            "sync_token": "t",
            "updated_items": []
        });
        assert!(matches!(
            SyncExchange::from_value(&value),
            Err(SyncError::Server(msg)) if msg == "version conflict"
        ));
    }

    #[test]
    fn local_record_converts_to_wire_form() {
        let id = Uuid::new_v4();
        let local = VaultFileMetadata {
            id,
            encrypted_metadata: "blob".to_string(),
            version: 4,
            last_modified: Utc::now(),
            is_deleted: true,
        };
        let record = local.into_record(42);
        assert_eq!(record.id, id.to_string());
        assert_eq!(record.user_id, 42);
        assert_eq!(record.version, 4);
        assert!(record.is_deleted);
    }
}
