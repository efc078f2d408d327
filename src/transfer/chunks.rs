use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// Copy buffer for reassembly.
const COPY_BUF: usize = 1024 * 1024;

/// One contiguous slice of a split file. `index` is 0-based, dense and
/// contiguous; reassembly order is the numeric index, never the lexical
/// order of the part filenames.
#[derive(Debug, Clone)]
pub struct TransferPart {
    pub index: u32,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Shareable link, filled in once the part has been uploaded.
    pub remote_link: Option<String>,
}

/// Split `source` into parts of at most `chunk_size` bytes, written to
/// `staging` as `<filename>0.zip`, `<filename>1.zip`, … (the `.zip`
/// suffix keeps hosting services happy about the upload type).
///
/// The last part may be shorter. Stale same-named parts from earlier
/// runs are removed before writing. On any write failure every part
/// produced so far is deleted best-effort before the error propagates.
pub fn split_into_parts(
    source: &Path,
    chunk_size: u64,
    staging: &Path,
) -> SyncResult<Vec<TransferPart>> {
    if chunk_size == 0 {
        return Err(SyncError::Transfer("Chunk size must be at least 1 byte".into()));
    }
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| SyncError::Transfer(format!("Not a file path: {source:?}")))?;

    let mut reader = File::open(source).map_err(|e| SyncError::io(source, e))?;
    let mut parts: Vec<TransferPart> = Vec::new();

    let result = (|| -> SyncResult<()> {
        let mut buf = vec![0u8; COPY_BUF.min(chunk_size as usize).max(1)];
        let mut index: u32 = 0;

        loop {
            // Probe one read before creating the part file, so an
            // exhausted source never leaves an empty trailing part.
            let want = buf.len().min(chunk_size as usize);
            let first = reader
                .read(&mut buf[..want])
                .map_err(|e| SyncError::io(source, e))?;
            if first == 0 {
                break;
            }

            let part_path = staging.join(format!("{file_name}{index}.zip"));
            if part_path.exists() {
                // A collision with a previous run must not leave us
                // appending to stale bytes.
                let _ = fs::remove_file(&part_path);
            }
            let mut out = File::create(&part_path).map_err(|e| SyncError::io(&part_path, e))?;
            out.write_all(&buf[..first])
                .map_err(|e| SyncError::io(&part_path, e))?;
            let mut part_written = first as u64;

            while part_written < chunk_size {
                let want = buf.len().min((chunk_size - part_written) as usize);
                let n = reader
                    .read(&mut buf[..want])
                    .map_err(|e| SyncError::io(source, e))?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n]).map_err(|e| SyncError::io(&part_path, e))?;
                part_written += n as u64;
            }

            out.flush().map_err(|e| SyncError::io(&part_path, e))?;
            parts.push(TransferPart {
                index,
                path: part_path,
                size_bytes: part_written,
                remote_link: None,
            });
            index += 1;
        }
        Ok(())
    })();

    if let Err(e) = result {
        for part in &parts {
            let _ = fs::remove_file(&part.path);
        }
        return Err(e);
    }

    if parts.is_empty() {
        return Err(SyncError::Transfer("Splitting resulted in no parts".into()));
    }

    debug!("Split {:?} into {} part(s)", source, parts.len());
    Ok(parts)
}

/// Concatenate `part_paths` in the given order into `dest`, overwriting
/// any existing file there. The byte stream is exactly the original.
pub fn reassemble(part_paths: &[PathBuf], dest: &Path) -> SyncResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    let mut out = File::create(dest).map_err(|e| SyncError::io(dest, e))?;
    let mut buf = vec![0u8; COPY_BUF];

    for part in part_paths {
        let mut reader = File::open(part).map_err(|e| SyncError::io(part, e))?;
        loop {
            let n = reader.read(&mut buf).map_err(|e| SyncError::io(part, e))?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).map_err(|e| SyncError::io(dest, e))?;
        }
    }

    out.flush().map_err(|e| SyncError::io(dest, e))?;
    Ok(())
}
