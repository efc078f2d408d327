use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::diff::{ChangeSet, FileEntry};
use crate::error::{SyncError, SyncResult};
use crate::paths::Workspace;

/// Confirmation capability for the destructive install path.
///
/// The two gates are separate methods: the first reviews the change
/// set, the second acknowledges that every existing mod in the profile
/// will be deleted. A single answer cannot satisfy both.
pub trait InstallPrompt {
    /// First gate: proceed with installation (this will replace mods)?
    fn confirm_replace(&mut self, changes: &ChangeSet) -> bool;

    /// Final gate: the profile's current mods are about to be wiped.
    fn confirm_destructive_wipe(&mut self) -> bool;
}

/// A full copy of the profile's files taken immediately before the
/// wipe. Written once, verified, and never auto-deleted.
#[derive(Debug, Clone)]
pub struct BackupSnapshot {
    pub created_at: DateTime<Local>,
    pub directory: PathBuf,
    pub files: Vec<FileEntry>,
}

/// Terminal result of an install attempt. Declined confirmations are
/// ordinary outcomes, not errors.
#[derive(Debug, Clone)]
pub enum InstallOutcome {
    /// Archive and profile already agree; nothing was touched.
    NothingToInstall,
    /// Declined at the first confirmation; nothing was touched.
    CancelledEarly,
    /// Declined at the final confirmation; nothing was touched.
    CancelledAtFinal,
    /// Profile replaced; the pre-install snapshot survives on disk.
    Installed { backup: BackupSnapshot },
}

/// Replace the contents of `profile_mods_dir` with `archive_files`,
/// guarded by two confirmations and a mandatory backup snapshot.
///
/// Order of operations: confirm twice, snapshot every current profile
/// file into a fresh timestamped directory under the workspace, wipe
/// the profile's files (never the directory), then copy the archive
/// files in. The snapshot is verified complete before the first
/// deletion; a backup failure therefore leaves the profile untouched.
/// A copy failure during the final phase is fatal and reported with the
/// backup location; recovery from it is manual.
pub fn install(
    archive_files: &[FileEntry],
    profile_mods_dir: &Path,
    changes: &ChangeSet,
    prompt: &mut dyn InstallPrompt,
    workspace: &Workspace,
) -> SyncResult<InstallOutcome> {
    if changes.is_noop() {
        info!("No differences detected; nothing to install");
        return Ok(InstallOutcome::NothingToInstall);
    }

    if !prompt.confirm_replace(changes) {
        info!("Installation cancelled at first confirmation");
        return Ok(InstallOutcome::CancelledEarly);
    }
    if !prompt.confirm_destructive_wipe() {
        info!("Installation cancelled at final confirmation");
        return Ok(InstallOutcome::CancelledAtFinal);
    }

    let profile_files = FileEntry::scan_flat(profile_mods_dir)?;

    // Backup phase: fail-closed. Nothing has been deleted yet.
    let created_at = Local::now();
    let backup_dir = workspace
        .backups_dir()?
        .join(format!("backup_{}", created_at.format("%Y%m%d%H%M%S")));
    fs::create_dir_all(&backup_dir).map_err(|e| SyncError::io(&backup_dir, e))?;

    for file in &profile_files {
        let dest = backup_dir.join(&file.name);
        copy_preserving(&file.path, &dest)?;
    }
    verify_snapshot(&backup_dir, &profile_files)?;
    info!(
        "Backed up {} profile files to {:?}",
        profile_files.len(),
        backup_dir
    );

    // Wipe phase: only entered after a complete, verified backup.
    for file in &profile_files {
        fs::remove_file(&file.path).map_err(|e| SyncError::io(&file.path, e))?;
    }

    // Install phase: overwrite by name. Failure here leaves a partial
    // profile; surface the backup location instead of rolling back.
    for file in archive_files {
        let dest = profile_mods_dir.join(&file.name);
        copy_preserving(&file.path, &dest).map_err(|e| {
            warn!("Install copy failed for {:?}: {e}", file.path);
            SyncError::Other(format!(
                "Installation failed while copying `{}`: {e}. \
                 The previous profile contents are preserved at {:?} for manual recovery.",
                file.name, backup_dir
            ))
        })?;
    }

    info!("Installation complete; backup at {:?}", backup_dir);
    Ok(InstallOutcome::Installed {
        backup: BackupSnapshot {
            created_at,
            directory: backup_dir,
            files: profile_files,
        },
    })
}

/// Copy a file keeping its modification time where the platform allows.
fn copy_preserving(src: &Path, dest: &Path) -> SyncResult<()> {
    fs::copy(src, dest).map_err(|e| SyncError::io(src, e))?;
    if let Ok(meta) = fs::metadata(src) {
        if let Ok(mtime) = meta.modified() {
            // Best effort; some filesystems refuse to set times.
            let _ = fs::File::options()
                .write(true)
                .open(dest)
                .and_then(|f| f.set_modified(mtime));
        }
    }
    Ok(())
}

/// Confirm every snapshotted file is present on disk before any
/// deletion is allowed to begin.
fn verify_snapshot(backup_dir: &Path, originals: &[FileEntry]) -> SyncResult<()> {
    for file in originals {
        let copied = backup_dir.join(&file.name);
        let meta = fs::metadata(&copied).map_err(|e| SyncError::io(&copied, e))?;
        if meta.len() != file.size_bytes {
            return Err(SyncError::Other(format!(
                "Backup verification failed for `{}`: expected {} bytes, found {}",
                file.name,
                file.size_bytes,
                meta.len()
            )));
        }
    }
    Ok(())
}
