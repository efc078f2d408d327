// ─── ModSync Core ───
// Mod profile synchronization and chunked transfer engine.
//
// Architecture:
//   archive/    — zip bundling + extraction into the staging workspace
//   profile/    — profile descriptors + mod-manager instance scanning
//   diff        — content-hash diff between archive and profile
//   install     — guarded backup → wipe → install state machine
//   manifest    — share-block codec (serialize + parse)
//   transfer/   — file splitting + hosting upload/download
//   paths       — staging workspace (uploads/downloads/backups/extracted)
//   config      — persisted engine settings

pub mod archive;
pub mod config;
pub mod diff;
pub mod error;
pub mod hash;
pub mod http;
pub mod install;
pub mod manifest;
pub mod paths;
pub mod profile;
pub mod transfer;

pub use config::SyncConfig;
pub use diff::{ChangeSet, FileEntry};
pub use error::{SyncError, SyncResult};
pub use install::{BackupSnapshot, InstallOutcome, InstallPrompt};
pub use manifest::TransferManifest;
pub use paths::Workspace;
pub use profile::{Profile, ProfileSource};
pub use transfer::{DownloadResult, HostClient};

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for binaries and integration harnesses.
///
/// Safe to call once per process; honors `RUST_LOG` when set.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,modsync=debug")),
        )
        .init();
}
