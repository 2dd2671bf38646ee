//! Metadata synchronization with the remote server.
//!
//! The sync layer only ever transports already-encrypted metadata strings; it
//! never touches plaintext file bytes. The server is the arbiter of conflicts
//! (last writer by version/timestamp wins); this side only transmits correct
//! versions and the per-device continuation token.

pub mod client;
pub mod models;
pub mod state;

pub use client::{Session, SyncClient};
pub use models::{
    AuthRequest, AuthResponse, FileMetadataRecord, SyncExchange, SyncRequest, SyncStatusResponse,
    VaultFileMetadata,
};
pub use state::SyncState;

use thiserror::Error;

/// Errors surfaced by the sync layer.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Server not available")]
    ServerUnavailable,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Sync exchange timed out")]
    Timeout,

    #[error("Error decoding server response: {0}")]
    Decoding(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
