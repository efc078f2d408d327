use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A named installed content directory managed by an external mod
/// manager. The sync engine only ever dereferences `mods_dir`; the
/// labels exist for selection displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Instance folder name, the profile's stable identity.
    pub folder: String,
    pub display_name: String,
    pub version_label: String,
    pub loader_label: String,
    pub last_played_label: String,
    /// Resolved mods directory for this profile.
    pub mods_dir: PathBuf,
}

impl Profile {
    /// Column-aligned selection rows for a list of profiles.
    pub fn display_rows(profiles: &[Profile]) -> Vec<String> {
        let name_w = profiles.iter().map(|p| p.display_name.len()).max().unwrap_or(0);
        let version_w = profiles.iter().map(|p| p.version_label.len()).max().unwrap_or(0);
        let loader_w = profiles.iter().map(|p| p.loader_label.len()).max().unwrap_or(0);

        profiles
            .iter()
            .map(|p| {
                format!(
                    "{:<name_w$}   v{:<version_w$}   {:<loader_w$}   Last Played: {}",
                    p.display_name, p.version_label, p.loader_label, p.last_played_label
                )
            })
            .collect()
    }
}
