use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::{SyncError, SyncResult};
use crate::paths::Workspace;

/// Header token identifying a share block.
pub const HEADER_TOKEN: &str = "# MODSYNC";
/// Sub-header preceding the ordered link list.
pub const LINKS_HEADER: &str = "## Download Links";
/// Divider between the instruction preamble and the link section.
pub const DIVIDER: &str =
    "-- -x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x-x- --";

/// Hostname of the file-hosting collaborator; link recognition and the
/// direct-fetch rewrite both key off it.
pub const HOSTING_HOST: &str = "tmpfiles.org";

const NAME_LABEL: &str = "internal name:";
const SIZE_LABEL: &str = "size of modlist:";
const DATE_LABEL: &str = "date of modlist:";

/// Ordered metadata describing the remote parts needed to reconstruct
/// an original file. `links` order is the authoritative reassembly
/// order. The only durable form of a manifest is the pasted share
/// block produced by [`TransferManifest::serialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferManifest {
    pub internal_name: Option<String>,
    pub size_bytes: Option<u64>,
    pub timestamp: Option<String>,
    pub links: Vec<String>,
}

impl TransferManifest {
    /// Manifest describing `original`, freshly stamped.
    pub fn for_file(original: &Path, links: Vec<String>) -> SyncResult<Self> {
        let meta = std::fs::metadata(original).map_err(|e| SyncError::io(original, e))?;
        let internal_name = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Ok(Self {
            internal_name,
            size_bytes: Some(meta.len()),
            timestamp: Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            links,
        })
    }

    /// Manifest carrying links only (loose input, no original metadata).
    pub fn links_only(links: Vec<String>) -> Self {
        Self {
            internal_name: None,
            size_bytes: None,
            timestamp: None,
            links,
        }
    }

    /// Emit the human-paste-able share block. The exact field shape
    /// round-trips through [`parse`].
    pub fn serialize(&self) -> String {
        let name = self.internal_name.clone().unwrap_or_default();
        let size = self.size_bytes.unwrap_or(0);
        let timestamp = self
            .timestamp
            .clone()
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

        let mut block = format!(
            "```{HEADER_TOKEN}\n\
             \n\
             A friend has shared their modlist with you!\n\
             \n\
             *Internal name: \"{name}\"  \n\
             Size of modlist: {size} bytes  \n\
             Date of modlist: {timestamp}*\n\
             \n\
             **Instructions**\n\
             - Copy *this entire text*\n\
             - Open ModSync and choose the load-from-share option\n\
             - ModSync will automatically do the hard work :3\n\
             \n\
             {DIVIDER}\n\
             \n\
             {LINKS_HEADER}\n"
        );
        for link in &self.links {
            block.push_str(link);
            block.push('\n');
        }
        block.push_str("```");
        block
    }
}

/// Parse a share block or loose text containing hosting links.
///
/// Text carrying the header token anywhere is treated as a full share
/// block: the labeled fields are extracted and at least one link must
/// be present. Text without the header falls back to loose mode, where
/// any recognizable hosting links are accepted as-is.
pub fn parse(text: &str) -> SyncResult<TransferManifest> {
    if text.trim().is_empty() {
        return Err(SyncError::Format("Manifest text is empty".into()));
    }

    let links = extract_links(text);
    let is_share_block = text.contains(HEADER_TOKEN);

    if is_share_block {
        if links.is_empty() {
            return Err(SyncError::Format(format!(
                "Found `{HEADER_TOKEN}` header but no {HOSTING_HOST} links"
            )));
        }
        return Ok(TransferManifest {
            internal_name: extract_quoted_field(text, NAME_LABEL),
            size_bytes: extract_size_field(text),
            timestamp: extract_line_field(text, DATE_LABEL),
            links,
        });
    }

    if !links.is_empty() {
        info!("No share header; using {} loose link(s)", links.len());
        return Ok(TransferManifest::links_only(links));
    }

    Err(SyncError::Format(format!(
        "Text contains neither a share block nor {HOSTING_HOST} links"
    )))
}

/// Write the serialized block to a timestamped markdown file in the
/// workspace root, returning its path.
pub fn write_share_block(manifest: &TransferManifest, workspace: &Workspace) -> SyncResult<PathBuf> {
    let short_ts = Local::now().format("%Y%m%d%H%M%S");
    std::fs::create_dir_all(workspace.root()).map_err(|e| SyncError::io(workspace.root(), e))?;
    let path = workspace
        .root()
        .join(format!("MODSYNC_shared_modlist_{short_ts}.md"));
    std::fs::write(&path, manifest.serialize()).map_err(|e| SyncError::io(&path, e))?;
    info!("Share block written to {:?}", path);
    Ok(path)
}

// ── Field scanners ──────────────────────────────────────
// The block is hand-pasted text, so every scanner is case-insensitive
// on labels and tolerant of surrounding markdown emphasis.

fn find_label(text: &str, label: &str) -> Option<usize> {
    // ASCII lowering keeps byte offsets aligned with the original text.
    let lowered = text.to_ascii_lowercase();
    lowered.find(label).map(|pos| pos + label.len())
}

/// `Internal name: "<value>"`
fn extract_quoted_field(text: &str, label: &str) -> Option<String> {
    let after = &text[find_label(text, label)?..];
    let open = after.find('"')?;
    let rest = &after[open + 1..];
    let close = rest.find('"')?;
    let value = rest[..close].trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// `Size of modlist: <N> bytes`
fn extract_size_field(text: &str) -> Option<u64> {
    let after = text[find_label(text, SIZE_LABEL)?..].trim_start();
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || !after[digits.len()..].trim_start().to_lowercase().starts_with("bytes") {
        return None;
    }
    digits.parse().ok()
}

/// `Date of modlist: <value to end of line>`
fn extract_line_field(text: &str, label: &str) -> Option<String> {
    let after = &text[find_label(text, label)?..];
    let line = after.lines().next()?;
    let value = line.trim().trim_end_matches('*').trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Collect hosting links in first-seen order, duplicates kept. A link
/// is a `http(s)://` run ending at whitespace or a backtick whose host
/// is the hosting service.
fn extract_links(text: &str) -> Vec<String> {
    let lowered = text.to_ascii_lowercase();
    let mut links = Vec::new();
    let mut search_from = 0;

    while let Some(rel) = lowered[search_from..].find("http") {
        let start = search_from + rel;
        let candidate: &str = &text[start..];
        let scheme_len = if lowered[start..].starts_with("https://") {
            8
        } else if lowered[start..].starts_with("http://") {
            7
        } else {
            search_from = start + 4;
            continue;
        };

        let end = candidate
            .find(|c: char| c.is_whitespace() || c == '`')
            .unwrap_or(candidate.len());
        let url = &candidate[..end];

        let host = url[scheme_len..].split('/').next().unwrap_or("");
        if host.to_lowercase().contains(HOSTING_HOST) {
            links.push(url.to_string());
        }
        search_from = start + end.max(scheme_len);
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest(links: Vec<&str>) -> TransferManifest {
        TransferManifest {
            internal_name: Some("mods.zip".into()),
            size_bytes: Some(262_144_000),
            timestamp: Some("2025-06-01 12:30:00".into()),
            links: links.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn serialize_parse_round_trip_single_link() {
        let manifest = sample_manifest(vec!["https://tmpfiles.org/123/mods.zip"]);
        let parsed = parse(&manifest.serialize()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn serialize_parse_round_trip_many_links_in_order() {
        let manifest = sample_manifest(vec![
            "https://tmpfiles.org/1/mods.zip0.zip",
            "https://tmpfiles.org/2/mods.zip1.zip",
            "https://tmpfiles.org/3/mods.zip2.zip",
        ]);
        let parsed = parse(&manifest.serialize()).unwrap();
        assert_eq!(parsed.links, manifest.links);
        assert_eq!(parsed.internal_name.as_deref(), Some("mods.zip"));
        assert_eq!(parsed.size_bytes, Some(262_144_000));
        assert_eq!(parsed.timestamp.as_deref(), Some("2025-06-01 12:30:00"));
    }

    #[test]
    fn empty_text_is_format_error() {
        assert!(matches!(parse("   \n "), Err(SyncError::Format(_))));
    }

    #[test]
    fn header_without_links_is_format_error() {
        let text = "# MODSYNC\nsomeone forgot to include the links";
        assert!(matches!(parse(text), Err(SyncError::Format(_))));
    }

    #[test]
    fn loose_text_with_links_parses_links_only() {
        let text = "grab these:\nhttps://tmpfiles.org/9/a.zip then http://tmpfiles.org/10/b.zip";
        let parsed = parse(text).unwrap();
        assert_eq!(
            parsed.links,
            vec![
                "https://tmpfiles.org/9/a.zip",
                "http://tmpfiles.org/10/b.zip"
            ]
        );
        assert_eq!(parsed.internal_name, None);
        assert_eq!(parsed.size_bytes, None);
    }

    #[test]
    fn loose_text_without_links_is_format_error() {
        assert!(matches!(
            parse("just some chatter, no urls"),
            Err(SyncError::Format(_))
        ));
    }

    #[test]
    fn foreign_host_links_are_ignored() {
        let text = "see https://example.com/a.zip and https://tmpfiles.org/5/real.zip";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.links, vec!["https://tmpfiles.org/5/real.zip"]);
    }

    #[test]
    fn duplicate_links_are_preserved() {
        let text = "https://tmpfiles.org/7/x.zip\nhttps://tmpfiles.org/7/x.zip";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.links.len(), 2);
    }

    #[test]
    fn missing_optional_fields_parse_as_absent() {
        let text = format!("{HEADER_TOKEN}\nhttps://tmpfiles.org/1/part.zip");
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.internal_name, None);
        assert_eq!(parsed.size_bytes, None);
        assert_eq!(parsed.timestamp, None);
        assert_eq!(parsed.links.len(), 1);
    }

    #[test]
    fn size_field_requires_bytes_suffix() {
        let text = format!(
            "{HEADER_TOKEN}\nSize of modlist: 1234 pebbles\nhttps://tmpfiles.org/1/p.zip"
        );
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.size_bytes, None);
    }

    #[test]
    fn write_share_block_persists_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("ws"));
        let manifest = sample_manifest(vec!["https://tmpfiles.org/123/mods.zip"]);

        let path = write_share_block(&manifest, &ws).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(parse(&written).unwrap(), manifest);
    }
}
