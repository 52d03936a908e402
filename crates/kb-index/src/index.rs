use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

pub const INDEX_SCHEMA_VERSION: u32 = 1;

/// Sidecar file written into each indexed directory.
pub const INDEX_FILE_NAME: &str = ".quill-kb-index.json";

/// Enumeration cap: recursion stops as soon as this many files are found.
pub const DEFAULT_MAX_FILES: usize = 2000;

/// One chunk of one file, with its embedding inlined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Absolute path of the source file.
    pub path: String,
    /// File name component, kept for display.
    pub file: String,
    /// Document title (first H1 line or the file stem).
    pub title: String,
    /// Nearest preceding H2-H6 heading, may be empty.
    pub heading: String,
    pub text: String,
    /// Unit-normalized embedding; empty only for chunks whose embedding
    /// call failed and was skipped.
    pub embedding: Vec<f32>,
}

/// Staleness record for one indexed file. Exists iff the file exists under
/// the indexed root and was chunked at least once since its last change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Modification time in epoch milliseconds; the sole staleness signal.
    pub mtime_ms: u64,
    pub chunk_count: usize,
}

/// The whole index for one directory, mirrored to the sidecar file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryIndex {
    #[serde(default)]
    pub schema_version: u32,
    /// Embedding model the chunks were built with.
    pub model: String,
    pub chunks: Vec<IndexedChunk>,
    /// Keyed by absolute file path.
    pub files: BTreeMap<String, FileRecord>,
    pub last_built_unix_ms: u64,
}

impl DirectoryIndex {
    #[must_use]
    pub fn empty(model: &str) -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION,
            model: model.to_string(),
            chunks: Vec::new(),
            files: BTreeMap::new(),
            last_built_unix_ms: 0,
        }
    }
}

#[must_use]
pub fn sidecar_path(directory: &Path) -> PathBuf {
    directory.join(INDEX_FILE_NAME)
}

/// Load the sidecar index, if present and readable. Corruption and schema
/// mismatches are not errors: the index is simply rebuilt from scratch.
pub(crate) async fn load_sidecar(directory: &Path) -> Option<DirectoryIndex> {
    let path = sidecar_path(directory);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            log::warn!("failed to read index sidecar {}: {e}", path.display());
            return None;
        }
    };
    let index: DirectoryIndex = match serde_json::from_slice(&bytes) {
        Ok(index) => index,
        Err(e) => {
            log::warn!("failed to parse index sidecar {}: {e}", path.display());
            return None;
        }
    };
    if index.schema_version != INDEX_SCHEMA_VERSION {
        log::warn!(
            "index sidecar {} has schema_version {} (expected {INDEX_SCHEMA_VERSION}); rebuilding",
            path.display(),
            index.schema_version
        );
        return None;
    }
    Some(index)
}

/// Overwrite the sidecar atomically (write to a temp file, then rename).
pub(crate) async fn save_sidecar(directory: &Path, index: &DirectoryIndex) -> Result<()> {
    let path = sidecar_path(directory);
    let bytes = serde_json::to_vec(index)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, &path).await?;
    Ok(())
}

/// Recursively enumerate markdown files under `directory`, depth-first,
/// stopping as soon as `max_files` are found. Unreadable entries are
/// skipped with a warning.
#[must_use]
pub fn list_markdown_files(directory: &Path, max_files: usize) -> Vec<PathBuf> {
    WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("skipping unreadable entry under {}: {e}", directory.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_markdown(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .take(max_files)
        .collect()
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}

pub(crate) fn mtime_ms(metadata: &std::fs::Metadata) -> Option<u64> {
    let modified = metadata.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    u64::try_from(since_epoch.as_millis()).ok()
}

pub(crate) fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
