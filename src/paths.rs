use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{SyncError, SyncResult};

/// Staging workspace on local disk.
///
/// All transient and recoverable state lives under one root:
/// - `uploads/`    — split parts awaiting upload
/// - `downloads/`  — fetched parts and reassembled files
/// - `backups/`    — pre-install profile snapshots (never auto-deleted)
/// - `extracted/`  — archive extraction output
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Workspace under the user cache directory, falling back to the
    /// system temp directory when no cache dir is resolvable.
    pub fn open_default() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("modsync");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> SyncResult<PathBuf> {
        self.ensure("uploads")
    }

    pub fn downloads_dir(&self) -> SyncResult<PathBuf> {
        self.ensure("downloads")
    }

    pub fn backups_dir(&self) -> SyncResult<PathBuf> {
        self.ensure("backups")
    }

    pub fn extracted_dir(&self) -> SyncResult<PathBuf> {
        self.ensure("extracted")
    }

    fn ensure(&self, sub: &str) -> SyncResult<PathBuf> {
        let dir = self.root.join(sub);
        fs::create_dir_all(&dir).map_err(|e| SyncError::io(&dir, e))?;
        Ok(dir)
    }

    /// Total size of everything currently staged, in bytes.
    pub fn usage_bytes(&self) -> SyncResult<u64> {
        fn dir_size(dir: &Path) -> SyncResult<u64> {
            let mut total = 0;
            for entry in fs::read_dir(dir).map_err(|e| SyncError::io(dir, e))? {
                let entry = entry.map_err(|e| SyncError::io(dir, e))?;
                let meta = entry.metadata().map_err(|e| SyncError::io(entry.path(), e))?;
                if meta.is_dir() {
                    total += dir_size(&entry.path())?;
                } else {
                    total += meta.len();
                }
            }
            Ok(total)
        }

        if !self.root.exists() {
            return Ok(0);
        }
        dir_size(&self.root)
    }

    /// Remove the whole workspace, backups included. The caller owns the
    /// decision; nothing in the engine clears it implicitly.
    pub fn clear(&self) -> SyncResult<()> {
        if !self.root.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&self.root).map_err(|e| SyncError::io(&self.root, e))?;
        info!("Cleared workspace at {:?}", self.root);
        Ok(())
    }
}

/// Render a byte count for humans (`1.5 MB` style).
pub fn format_bytes(size: u64) -> String {
    let mut size = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_counts_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("modsync"));

        let uploads = ws.uploads_dir().unwrap();
        fs::write(uploads.join("part0.zip"), vec![0u8; 100]).unwrap();
        let downloads = ws.downloads_dir().unwrap();
        fs::write(downloads.join("part1.zip"), vec![0u8; 50]).unwrap();

        assert_eq!(ws.usage_bytes().unwrap(), 150);
    }

    #[test]
    fn clear_removes_root_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("modsync"));
        ws.uploads_dir().unwrap();

        ws.clear().unwrap();
        assert!(!ws.root().exists());
        assert_eq!(ws.usage_bytes().unwrap(), 0);
        // Clearing a missing workspace is not an error.
        ws.clear().unwrap();
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512.0 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(90 * 1024 * 1024), "90.0 MB");
    }
}
