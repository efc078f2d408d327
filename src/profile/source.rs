use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::Value;
use tracing::warn;

use super::model::Profile;
use crate::error::{SyncError, SyncResult};

/// Capability seam over whatever owns profile discovery (mod-manager
/// databases, instance folders, test fixtures). The engine only needs
/// `list_profiles`; everything else about the data source stays behind
/// this trait.
#[async_trait]
pub trait ProfileSource {
    async fn list_profiles(&self) -> SyncResult<Vec<Profile>>;
}

/// Metadata filenames probed inside each instance folder, in order.
const METADATA_CANDIDATES: &[&str] = &[
    "instance.json",
    "minecraftinstance.json",
    "config/minecraftinstance.json",
];

/// Profile source backed by a mod manager's instances directory: one
/// subfolder per instance, each carrying a JSON metadata file. Missing
/// or malformed metadata degrades to a folder-name profile instead of
/// failing the whole scan.
pub struct InstanceDirSource {
    instances_dir: PathBuf,
}

impl InstanceDirSource {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self { instances_dir }
    }
}

#[async_trait]
impl ProfileSource for InstanceDirSource {
    async fn list_profiles(&self) -> SyncResult<Vec<Profile>> {
        if !self.instances_dir.exists() {
            return Err(SyncError::ProfileNotFound(format!(
                "Instances directory does not exist: {:?}",
                self.instances_dir
            )));
        }

        let mut profiles = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.instances_dir)
            .await
            .map_err(|e| SyncError::io(&self.instances_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::io(&self.instances_dir, e))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            profiles.push(read_instance_profile(&path).await);
        }

        profiles.sort_by(|a, b| a.folder.cmp(&b.folder));
        Ok(profiles)
    }
}

async fn read_instance_profile(instance_dir: &Path) -> Profile {
    let folder = instance_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut metadata: Option<Value> = None;
    for candidate in METADATA_CANDIDATES {
        let candidate_path = instance_dir.join(candidate);
        if !candidate_path.exists() {
            continue;
        }
        match tokio::fs::read_to_string(&candidate_path).await {
            Ok(json) => match serde_json::from_str::<Value>(&json) {
                Ok(value) => {
                    metadata = Some(value);
                    break;
                }
                Err(e) => {
                    warn!("Malformed metadata at {:?}: {e}", candidate_path);
                }
            },
            Err(e) => {
                warn!("Cannot read {:?}: {e}", candidate_path);
            }
        }
    }

    let display_name = metadata
        .as_ref()
        .and_then(|m| first_string(m, &["name", "instanceName", "displayName"]))
        .unwrap_or_else(|| folder.clone());
    let version_label = metadata
        .as_ref()
        .and_then(|m| first_string(m, &["minecraftVersion", "version", "mcVersion"]))
        .unwrap_or_else(|| "unknown".into());
    let loader_label = metadata
        .as_ref()
        .and_then(|m| first_string(m, &["modLoader", "loader", "modLoaderType"]))
        .unwrap_or_else(|| "unknown".into());

    let last_played_epoch = metadata
        .as_ref()
        .and_then(|m| first_epoch(m, &["lastPlayed", "lastLaunch", "lastLaunchTime"]))
        .or_else(|| folder_mtime_epoch(instance_dir));

    // Instances keep mods either at the top level or under minecraft/.
    let mods_dir = {
        let nested = instance_dir.join("minecraft").join("mods");
        if nested.exists() {
            nested
        } else {
            instance_dir.join("mods")
        }
    };

    Profile {
        folder,
        display_name,
        version_label,
        loader_label,
        last_played_label: format_last_played(last_played_epoch),
        mods_dir,
    }
}

fn first_string(metadata: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// Pull an epoch-seconds timestamp out of the metadata, normalizing
/// millisecond values heuristically.
fn first_epoch(metadata: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| {
        let val = metadata.get(key)?.as_i64()?;
        if val <= 0 {
            return None;
        }
        Some(if val > 1_000_000_000_000 { val / 1000 } else { val })
    })
}

fn folder_mtime_epoch(dir: &Path) -> Option<i64> {
    let modified = std::fs::metadata(dir).ok()?.modified().ok()?;
    let dt: DateTime<Local> = modified.into();
    Some(dt.timestamp())
}

fn format_last_played(epoch: Option<i64>) -> String {
    match epoch.and_then(|s| DateTime::from_timestamp(s, 0)) {
        Some(utc) => utc.with_timezone(&Local).format("%d %B %Y").to_string(),
        None => "never".into(),
    }
}
