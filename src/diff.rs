use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::hash::{digest_file, ContentHash};

/// A single file participating in a diff. Identity for classification
/// is `name`; several entries may share a name (nested paths).
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl FileEntry {
    fn from_path(path: PathBuf, size_bytes: u64) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        Some(Self {
            name,
            path,
            size_bytes,
        })
    }

    /// Collect every file under `dir`, recursively. Used for extracted
    /// archives, where mods may sit inside nested folders.
    pub fn scan_recursive(dir: &Path) -> SyncResult<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            for entry in std::fs::read_dir(&current).map_err(|e| SyncError::io(&current, e))? {
                let entry = entry.map_err(|e| SyncError::io(&current, e))?;
                let meta = entry.metadata().map_err(|e| SyncError::io(entry.path(), e))?;
                if meta.is_dir() {
                    pending.push(entry.path());
                } else if let Some(file) = FileEntry::from_path(entry.path(), meta.len()) {
                    entries.push(file);
                }
            }
        }

        Ok(entries)
    }

    /// Collect only the top-level files of `dir`. Used for profile mods
    /// directories, which are flat by convention.
    pub fn scan_flat(dir: &Path) -> SyncResult<Vec<FileEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| SyncError::io(dir, e))? {
            let entry = entry.map_err(|e| SyncError::io(dir, e))?;
            let meta = entry.metadata().map_err(|e| SyncError::io(entry.path(), e))?;
            if meta.is_file() {
                if let Some(file) = FileEntry::from_path(entry.path(), meta.len()) {
                    entries.push(file);
                }
            }
        }
        Ok(entries)
    }
}

/// Four-way classification of file names between an archive and a
/// profile. The four lists partition the union of names: every archive
/// name lands in exactly one of `identical` / `differing` /
/// `added_in_archive`, every profile-only name in `removed_from_profile`.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub identical: Vec<String>,
    pub differing: Vec<String>,
    pub added_in_archive: Vec<String>,
    pub removed_from_profile: Vec<String>,
}

impl ChangeSet {
    /// Number of names that require action.
    pub fn mismatch_count(&self) -> usize {
        self.differing.len() + self.added_in_archive.len() + self.removed_from_profile.len()
    }

    /// True when the archive and profile already agree.
    pub fn is_noop(&self) -> bool {
        self.mismatch_count() == 0
    }
}

/// Classify `archive_files` against `profile_files` by content hash.
///
/// Names are compared first; digests are computed lazily and memoized
/// per path within this call. Among same-named duplicates the first
/// archive/profile pair with equal digests wins — the tie break is
/// discovery order, deliberately left loose.
pub fn diff(archive_files: &[FileEntry], profile_files: &[FileEntry]) -> SyncResult<ChangeSet> {
    let archive_map = group_by_name(archive_files);
    let profile_map = group_by_name(profile_files);

    // Memoize digests per path for the duration of this call, so name
    // collisions never re-hash the same file.
    let mut digests: HashMap<PathBuf, ContentHash> = HashMap::new();
    let mut digest_of = |path: &Path| -> SyncResult<ContentHash> {
        if let Some(hash) = digests.get(path) {
            return Ok(hash.clone());
        }
        let hash = digest_file(path)?;
        digests.insert(path.to_path_buf(), hash.clone());
        Ok(hash)
    };

    let mut changes = ChangeSet::default();

    for (name, archive_entries) in &archive_map {
        let Some(profile_entries) = profile_map.get(name) else {
            changes.added_in_archive.push(name.clone());
            continue;
        };

        let mut matched = false;
        'pairs: for archive_entry in archive_entries {
            let archive_hash = digest_of(&archive_entry.path)?;
            for profile_entry in profile_entries {
                if archive_hash == digest_of(&profile_entry.path)? {
                    matched = true;
                    break 'pairs;
                }
            }
        }

        if matched {
            changes.identical.push(name.clone());
        } else {
            changes.differing.push(name.clone());
        }
    }

    for name in profile_map.keys() {
        if !archive_map.contains_key(name) {
            changes.removed_from_profile.push(name.clone());
        }
    }

    debug!(
        "Diff: {} identical, {} differing, {} new, {} removed",
        changes.identical.len(),
        changes.differing.len(),
        changes.added_in_archive.len(),
        changes.removed_from_profile.len()
    );

    Ok(changes)
}

fn group_by_name(files: &[FileEntry]) -> BTreeMap<String, Vec<&FileEntry>> {
    let mut map: BTreeMap<String, Vec<&FileEntry>> = BTreeMap::new();
    for file in files {
        map.entry(file.name.clone()).or_default().push(file);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dir: &Path, name: &str, content: &[u8]) -> FileEntry {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        FileEntry {
            name: name.to_string(),
            path,
            size_bytes: content.len() as u64,
        }
    }

    #[test]
    fn four_way_classification() {
        let dir = tempfile::tempdir().unwrap();
        let archive_dir = dir.path().join("archive");
        let profile_dir = dir.path().join("profile");
        std::fs::create_dir_all(&archive_dir).unwrap();
        std::fs::create_dir_all(&profile_dir).unwrap();

        // archive: a.jar (X), b.jar (Y); profile: a.jar (X), c.jar (Z)
        let archive = vec![
            entry(&archive_dir, "a.jar", b"hash-x"),
            entry(&archive_dir, "b.jar", b"hash-y"),
        ];
        let profile = vec![
            entry(&profile_dir, "a.jar", b"hash-x"),
            entry(&profile_dir, "c.jar", b"hash-z"),
        ];

        let changes = diff(&archive, &profile).unwrap();
        assert_eq!(changes.identical, vec!["a.jar"]);
        assert!(changes.differing.is_empty());
        assert_eq!(changes.added_in_archive, vec!["b.jar"]);
        assert_eq!(changes.removed_from_profile, vec!["c.jar"]);
        assert_eq!(changes.mismatch_count(), 2);
    }

    #[test]
    fn same_name_different_content_is_differing() {
        let dir = tempfile::tempdir().unwrap();
        let archive_dir = dir.path().join("archive");
        let profile_dir = dir.path().join("profile");
        std::fs::create_dir_all(&archive_dir).unwrap();
        std::fs::create_dir_all(&profile_dir).unwrap();

        let archive = vec![entry(&archive_dir, "mod.jar", b"new build")];
        let profile = vec![entry(&profile_dir, "mod.jar", b"old build")];

        let changes = diff(&archive, &profile).unwrap();
        assert!(changes.identical.is_empty());
        assert_eq!(changes.differing, vec!["mod.jar"]);
        assert!(!changes.is_noop());
    }

    #[test]
    fn duplicate_names_match_on_any_pair() {
        let dir = tempfile::tempdir().unwrap();
        let archive_a = dir.path().join("archive/a");
        let archive_b = dir.path().join("archive/b");
        let profile_dir = dir.path().join("profile");
        std::fs::create_dir_all(&archive_a).unwrap();
        std::fs::create_dir_all(&archive_b).unwrap();
        std::fs::create_dir_all(&profile_dir).unwrap();

        // Two archive copies of mod.jar, only the nested one matches.
        let archive = vec![
            entry(&archive_a, "mod.jar", b"stale copy"),
            entry(&archive_b, "mod.jar", b"installed"),
        ];
        let profile = vec![entry(&profile_dir, "mod.jar", b"installed")];

        let changes = diff(&archive, &profile).unwrap();
        assert_eq!(changes.identical, vec!["mod.jar"]);
        assert!(changes.differing.is_empty());
    }

    #[test]
    fn identical_sets_are_noop() {
        let dir = tempfile::tempdir().unwrap();
        let archive_dir = dir.path().join("archive");
        let profile_dir = dir.path().join("profile");
        std::fs::create_dir_all(&archive_dir).unwrap();
        std::fs::create_dir_all(&profile_dir).unwrap();

        let archive = vec![entry(&archive_dir, "a.jar", b"x")];
        let profile = vec![entry(&profile_dir, "a.jar", b"x")];

        let changes = diff(&archive, &profile).unwrap();
        assert!(changes.is_noop());
        assert_eq!(changes.identical, vec!["a.jar"]);
    }

    #[test]
    fn scan_recursive_finds_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub/deeper");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("top.jar"), b"t").unwrap();
        std::fs::write(nested.join("deep.jar"), b"d").unwrap();

        let mut names: Vec<_> = FileEntry::scan_recursive(dir.path())
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["deep.jar", "top.jar"]);
    }

    #[test]
    fn scan_flat_ignores_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/nested.jar"), b"n").unwrap();
        std::fs::write(dir.path().join("top.jar"), b"t").unwrap();

        let names: Vec<_> = FileEntry::scan_flat(dir.path())
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["top.jar"]);
    }
}
