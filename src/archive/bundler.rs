use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{SyncError, SyncResult};
use crate::paths::Workspace;

/// Bundle every file under `source_dir` into a deflate zip at `dest`,
/// with entry names relative to `source_dir`.
pub fn bundle_zip(source_dir: &Path, dest: &Path) -> SyncResult<PathBuf> {
    let out = File::create(dest).map_err(|e| SyncError::io(dest, e))?;
    let mut writer = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut pending = vec![source_dir.to_path_buf()];
    let mut file_count = 0usize;

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current).map_err(|e| SyncError::io(&current, e))? {
            let entry = entry.map_err(|e| SyncError::io(&current, e))?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }

            let relative = path
                .strip_prefix(source_dir)
                .map_err(|_| SyncError::Other(format!("Path escapes source dir: {path:?}")))?;
            // Zip entry names always use forward slashes.
            let entry_name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            writer.start_file(entry_name, options)?;
            let mut reader = File::open(&path).map_err(|e| SyncError::io(&path, e))?;
            io::copy(&mut reader, &mut writer).map_err(|e| SyncError::io(&path, e))?;
            file_count += 1;
        }
    }

    writer.finish()?;
    info!("Bundled {file_count} file(s) from {:?} into {:?}", source_dir, dest);
    Ok(dest.to_path_buf())
}

/// Extract a zip archive into a fresh uniquely-named directory under
/// the workspace's `extracted/` area, honoring an optional password.
/// Returns the extraction root.
pub fn extract_zip(
    archive_path: &Path,
    password: Option<&str>,
    workspace: &Workspace,
) -> SyncResult<PathBuf> {
    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".into());
    let out_dir = workspace
        .extracted_dir()?
        .join(format!("{stem}_{}", Uuid::new_v4().simple()));
    std::fs::create_dir_all(&out_dir).map_err(|e| SyncError::io(&out_dir, e))?;

    let file = File::open(archive_path).map_err(|e| SyncError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = match password {
            Some(pw) => archive.by_index_decrypt(i, pw.as_bytes())?,
            None => archive.by_index(i)?,
        };

        // Skip entries whose names would escape the extraction root.
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let dest = out_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| SyncError::io(&dest, e))?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        let mut out = File::create(&dest).map_err(|e| SyncError::io(&dest, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| SyncError::io(&dest, e))?;
    }

    info!("Extracted {:?} into {:?}", archive_path, out_dir);
    Ok(out_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::FileEntry;

    #[test]
    fn bundle_then_extract_round_trips_contents() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("mods");
        std::fs::create_dir_all(source.join("nested")).unwrap();
        std::fs::write(source.join("a.jar"), b"alpha").unwrap();
        std::fs::write(source.join("nested/b.jar"), b"beta").unwrap();

        let archive = dir.path().join("mods.zip");
        bundle_zip(&source, &archive).unwrap();

        let ws = Workspace::new(dir.path().join("ws"));
        let extracted = extract_zip(&archive, None, &ws).unwrap();

        assert_eq!(std::fs::read(extracted.join("a.jar")).unwrap(), b"alpha");
        assert_eq!(
            std::fs::read(extracted.join("nested/b.jar")).unwrap(),
            b"beta"
        );
    }

    #[test]
    fn extraction_dirs_are_unique_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("mods");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.jar"), b"alpha").unwrap();

        let archive = dir.path().join("mods.zip");
        bundle_zip(&source, &archive).unwrap();

        let ws = Workspace::new(dir.path().join("ws"));
        let first = extract_zip(&archive, None, &ws).unwrap();
        let second = extract_zip(&archive, None, &ws).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn extracted_tree_scans_for_diffing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("mods");
        std::fs::create_dir_all(source.join("deep/deeper")).unwrap();
        std::fs::write(source.join("top.jar"), b"t").unwrap();
        std::fs::write(source.join("deep/deeper/leaf.jar"), b"l").unwrap();

        let archive = dir.path().join("mods.zip");
        bundle_zip(&source, &archive).unwrap();

        let ws = Workspace::new(dir.path().join("ws"));
        let extracted = extract_zip(&archive, None, &ws).unwrap();

        let mut names: Vec<_> = FileEntry::scan_recursive(&extracted)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["leaf.jar", "top.jar"]);
    }
}
