use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::http;

/// Default upload chunk size: hosting services commonly cap single
/// uploads at 100 MB, so stay comfortably under.
pub const DEFAULT_CHUNK_SIZE: u64 = 90 * 1024 * 1024;

/// Engine settings persisted as `config.json` in the workspace root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum size of a single uploaded part, in bytes.
    pub chunk_size_bytes: u64,
    /// Timeout applied to hosting-service requests, in seconds.
    pub http_timeout_secs: u64,
    /// Keep split parts on disk after a successful upload.
    pub retain_upload_parts: bool,
    /// Override for the staging workspace root.
    pub workspace_root: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            http_timeout_secs: http::DEFAULT_TIMEOUT_SECS,
            retain_upload_parts: false,
            workspace_root: None,
        }
    }
}

impl SyncConfig {
    /// Load from `path`, returning defaults when the file does not exist.
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        let config: SyncConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// Persist as pretty JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        std::fs::write(path, json).map_err(|e| SyncError::io(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.chunk_size_bytes, DEFAULT_CHUNK_SIZE);
        assert!(!config.retain_upload_parts);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let config = SyncConfig {
            chunk_size_bytes: 1024,
            http_timeout_secs: 30,
            retain_upload_parts: true,
            workspace_root: Some(PathBuf::from("/tmp/elsewhere")),
        };
        config.save(&path).unwrap();

        let loaded = SyncConfig::load(&path).unwrap();
        assert_eq!(loaded.chunk_size_bytes, 1024);
        assert_eq!(loaded.http_timeout_secs, 30);
        assert!(loaded.retain_upload_parts);
        assert_eq!(loaded.workspace_root, Some(PathBuf::from("/tmp/elsewhere")));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "chunk_size_bytes": 4096 }"#).unwrap();

        let loaded = SyncConfig::load(&path).unwrap();
        assert_eq!(loaded.chunk_size_bytes, 4096);
        assert_eq!(loaded.http_timeout_secs, http::DEFAULT_TIMEOUT_SECS);
    }
}
