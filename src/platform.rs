//! Platform-specific path helpers.

use std::path::PathBuf;

/// Platform data directory for vault state.
///
/// - Windows: `%APPDATA%\HavenVault`
/// - macOS: `~/Library/Application Support/HavenVault`
/// - Linux/Other: `~/.local/share/havenvault`
pub fn get_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".data")))
        .unwrap_or_else(|| PathBuf::from("."));

    if cfg!(target_os = "linux") {
        base.join("havenvault")
    } else {
        base.join("HavenVault")
    }
}

/// Default on-disk container directory holding the encrypted objects.
///
/// On platforms with a backup service this directory should additionally be
/// flagged as excluded from device backups by the embedding application.
pub fn get_container_dir() -> PathBuf {
    get_data_dir().join("SecureVault")
}

/// Default path of the audit log document.
pub fn get_default_audit_log_path() -> PathBuf {
    get_data_dir().join("vault_audit_log.json")
}

/// Default path of the sync state document (device id, token, versions).
pub fn get_default_sync_state_path() -> PathBuf {
    get_data_dir().join("sync_state.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_lives_under_data_dir() {
        assert!(get_container_dir().starts_with(get_data_dir()));
    }

    #[test]
    fn audit_log_is_a_json_document() {
        assert!(get_default_audit_log_path()
            .to_string_lossy()
            .ends_with("vault_audit_log.json"));
    }
}
