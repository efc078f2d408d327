use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::multipart;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::build_http_client;
use crate::manifest::{TransferManifest, HOSTING_HOST};
use crate::paths::Workspace;
use crate::transfer::chunks;

const UPLOAD_URL: &str = "https://tmpfiles.org/api/v1/upload";

/// Result of a manifest download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResult {
    /// A single final file, either renamed or reassembled from parts.
    Assembled(PathBuf),
    /// Ordered part paths; no internal name was available, so the
    /// caller owns reassembly (cat the parts together in this order).
    Parts(Vec<PathBuf>),
}

/// Client for the size-limited file-hosting collaborator.
///
/// All multi-part operations run sequentially: part N+1 is not touched
/// until part N finished, which is what guarantees manifest link order
/// equals part index order.
pub struct HostClient {
    client: reqwest::Client,
    workspace: Workspace,
    retain_upload_parts: bool,
}

impl HostClient {
    pub fn new(workspace: Workspace, config: &SyncConfig) -> SyncResult<Self> {
        let client = build_http_client(config.http_timeout_secs)?;
        Ok(Self {
            client,
            workspace,
            retain_upload_parts: config.retain_upload_parts,
        })
    }

    // ── Upload ──────────────────────────────────────────

    /// Upload a single file, returning its shareable link.
    pub async fn upload(&self, path: &Path) -> SyncResult<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SyncError::Transfer(format!("Not a file path: {path:?}")))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SyncError::io(path, e))?;

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name.clone()));

        let response = self.client.post(UPLOAD_URL).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::UploadFailed {
                url: UPLOAD_URL.to_string(),
                status: status.as_u16(),
            });
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            SyncError::Transfer(format!("Upload response for `{file_name}` was not JSON: {e}"))
        })?;
        let link = link_from_payload(&payload).ok_or_else(|| {
            SyncError::Transfer(format!("Upload of `{file_name}` succeeded but returned no URL"))
        })?;

        debug!("Uploaded {:?} -> {link}", path);
        Ok(link)
    }

    /// Upload `path`, splitting it first when it exceeds `chunk_size`.
    ///
    /// Parts are uploaded sequentially in index order and the returned
    /// manifest's links are in upload order. On any part failure all
    /// staged parts are deleted best-effort and the operation fails
    /// naming the part; on success staged parts are deleted unless the
    /// client was configured to retain them.
    pub async fn upload_in_chunks(
        &self,
        path: &Path,
        chunk_size: u64,
    ) -> SyncResult<TransferManifest> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| SyncError::io(path, e))?;

        if meta.len() <= chunk_size {
            let link = self.upload(path).await?;
            return TransferManifest::for_file(path, vec![link]);
        }

        let staging = self.workspace.uploads_dir()?;
        let mut parts = chunks::split_into_parts(path, chunk_size, &staging)?;
        info!("Uploading {} part(s) for {:?}", parts.len(), path);

        let mut links = Vec::with_capacity(parts.len());
        for i in 0..parts.len() {
            match self.upload(&parts[i].path).await {
                Ok(link) => {
                    parts[i].remote_link = Some(link.clone());
                    links.push(link);
                }
                Err(e) => {
                    let failed = format!(
                        "Chunked upload failed at part {} ({:?}): {e}",
                        parts[i].index, parts[i].path
                    );
                    for p in &parts {
                        let _ = tokio::fs::remove_file(&p.path).await;
                    }
                    return Err(SyncError::Transfer(failed));
                }
            }
        }

        if !self.retain_upload_parts {
            for part in &parts {
                let _ = tokio::fs::remove_file(&part.path).await;
            }
        }

        TransferManifest::for_file(path, links)
    }

    // ── Download ────────────────────────────────────────

    /// Download one hosted file into `dest_dir`, streaming to disk.
    /// Accepts share links or already-canonical direct links.
    pub async fn download(&self, link: &str, dest_dir: &Path) -> SyncResult<PathBuf> {
        let direct = direct_url(link)?;
        let file_name = filename_from_url(&direct)?;
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| SyncError::io(dest_dir, e))?;
        let dest = dest_dir.join(file_name);

        let response = self.client.get(&direct).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::DownloadFailed {
                url: direct,
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(&dest)
            .await
            .map_err(|e| SyncError::io(&dest, e))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| SyncError::io(&dest, e))?;
        }
        file.flush().await.map_err(|e| SyncError::io(&dest, e))?;
        drop(file);

        let written = tokio::fs::metadata(&dest)
            .await
            .map_err(|e| SyncError::io(&dest, e))?;
        if written.len() == 0 {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(SyncError::Transfer(format!(
                "Downloaded file from {direct} is empty"
            )));
        }

        debug!("Downloaded {direct} -> {:?}", dest);
        Ok(dest)
    }

    /// Fetch every manifest link in order and produce the final file.
    ///
    /// A failure on any link aborts the whole operation and deletes the
    /// parts fetched so far. With an internal name present the result
    /// is a single assembled file in the downloads area; without one
    /// the ordered part paths are handed back to the caller.
    pub async fn download_from_manifest(
        &self,
        manifest: &TransferManifest,
    ) -> SyncResult<DownloadResult> {
        if manifest.links.is_empty() {
            return Err(SyncError::Transfer("Manifest contains no links to download".into()));
        }

        let downloads = self.workspace.downloads_dir()?;
        // Fresh session directory so parts from earlier runs can never
        // interleave with this one.
        let session = downloads.join(Uuid::new_v4().simple().to_string());
        tokio::fs::create_dir_all(&session)
            .await
            .map_err(|e| SyncError::io(&session, e))?;

        let mut parts: Vec<PathBuf> = Vec::with_capacity(manifest.links.len());
        for (i, link) in manifest.links.iter().enumerate() {
            info!("Downloading part [{}/{}]: {link}", i + 1, manifest.links.len());
            match self.download(link, &session).await {
                Ok(path) => parts.push(path),
                Err(e) => {
                    for p in &parts {
                        let _ = tokio::fs::remove_file(p).await;
                    }
                    let _ = tokio::fs::remove_dir(&session).await;
                    return Err(SyncError::Transfer(format!(
                        "Failed to download part {link}: {e}"
                    )));
                }
            }
        }

        let Some(internal_name) = manifest.internal_name.as_deref() else {
            return Ok(DownloadResult::Parts(parts));
        };
        let assembled = downloads.join(internal_name);

        if let [single] = parts.as_slice() {
            if tokio::fs::metadata(&assembled).await.is_ok() {
                tokio::fs::remove_file(&assembled)
                    .await
                    .map_err(|e| SyncError::io(&assembled, e))?;
            }
            tokio::fs::rename(single, &assembled)
                .await
                .map_err(|e| SyncError::io(&assembled, e))?;
            let _ = tokio::fs::remove_dir(&session).await;
            return Ok(DownloadResult::Assembled(assembled));
        }

        if let Err(e) = chunks::reassemble(&parts, &assembled) {
            let _ = tokio::fs::remove_file(&assembled).await;
            return Err(e);
        }
        for p in &parts {
            let _ = tokio::fs::remove_file(p).await;
        }
        let _ = tokio::fs::remove_dir(&session).await;

        info!("Reassembled {} part(s) into {:?}", manifest.links.len(), assembled);
        Ok(DownloadResult::Assembled(assembled))
    }
}

// ── Link helpers ────────────────────────────────────────

/// Pull the shareable link out of the hosting API's JSON payload.
/// Known shapes: `{"data": {"url": …}}` and a top-level `{"url": …}`.
fn link_from_payload(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("data")
        .and_then(|d| d.get("url"))
        .or_else(|| payload.get("url"))
        .and_then(|u| u.as_str())
        .map(String::from)
}

/// Rewrite a share link to the canonical direct-fetch form:
/// `http(s)://tmpfiles.org/<id>/<file>` → `https://tmpfiles.org/dl/<id>/<file>`.
/// Already-direct links are normalized to https and passed through.
pub fn direct_url(link: &str) -> SyncResult<String> {
    if link.contains("/dl/") {
        return Ok(link.replacen("http://", "https://", 1));
    }

    let rest = link
        .strip_prefix("https://")
        .or_else(|| link.strip_prefix("http://"))
        .ok_or_else(|| SyncError::Transfer(format!("Not a fetchable URL: {link}")))?;

    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    if !host.to_ascii_lowercase().contains(HOSTING_HOST) {
        return Err(SyncError::Transfer(format!(
            "URL is not a {HOSTING_HOST} link: {link}"
        )));
    }

    Ok(format!("https://{HOSTING_HOST}/dl/{path}"))
}

/// Last path segment of a direct URL, used as the local part filename.
fn filename_from_url(url: &str) -> SyncResult<String> {
    let name = url.rsplit('/').next().unwrap_or_default();
    if name.is_empty() {
        return Err(SyncError::Transfer(format!(
            "Could not determine filename from URL: {url}"
        )));
    }
    Ok(name.to_string())
}
