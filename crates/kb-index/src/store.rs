use crate::error::{KbIndexError, Result};
use crate::index::{
    list_markdown_files, load_sidecar, mtime_ms, save_sidecar, unix_now_ms, DirectoryIndex,
    FileRecord, IndexedChunk, DEFAULT_MAX_FILES, INDEX_SCHEMA_VERSION,
};
use lru::LruCache;
use quill_embeddings::Embedder;
use quill_markdown_chunker::{derive_title, Chunker};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// How many directory indexes stay resident; least-recently-used beyond that.
const DIRECTORY_CACHE_CAP: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct EnsureOptions {
    /// Enumeration cap for the recursive markdown lister.
    pub max_files: usize,
}

impl Default for EnsureOptions {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

/// Outcome of one `ensure_index` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Files that were (re)chunked and (re)embedded this call.
    pub updated: usize,
    /// Files currently tracked by the index.
    pub files: usize,
    /// Chunks currently held by the index.
    pub chunks: usize,
}

type DirSlot = Arc<tokio::sync::Mutex<Option<DirectoryIndex>>>;

/// Process-wide store of per-directory indexes.
///
/// Each directory gets its own async mutex, so overlapping build/search
/// calls for one directory serialize while distinct directories proceed in
/// parallel. The slot map itself is LRU-bounded; a directory evicted from
/// the map falls back to its sidecar on the next call.
pub struct KbStore {
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    slots: Mutex<LruCache<PathBuf, DirSlot>>,
}

impl KbStore {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let cap = NonZeroUsize::new(DIRECTORY_CACHE_CAP).unwrap_or(NonZeroUsize::MIN);
        Self {
            embedder,
            chunker: Chunker::default(),
            slots: Mutex::new(LruCache::new(cap)),
        }
    }

    fn slot(&self, directory: &Path) -> DirSlot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(&directory.to_path_buf()) {
            return Arc::clone(slot);
        }
        let slot: DirSlot = Arc::new(tokio::sync::Mutex::new(None));
        slots.put(directory.to_path_buf(), Arc::clone(&slot));
        slot
    }

    /// Bring the directory's index up to date. Idempotent and cheap when
    /// nothing changed: a second call with no file modifications reports
    /// `updated == 0` and leaves every chunk untouched.
    ///
    /// Degradation is deliberate: if the embedding backend cannot
    /// initialize, the call still prunes deleted files, persists the index
    /// as-is and reports `updated == 0` so keyword search keeps working.
    pub async fn ensure_index(
        &self,
        directory: &Path,
        options: &EnsureOptions,
    ) -> Result<IndexStats> {
        let directory = canonical_dir(directory).await?;

        let slot = self.slot(&directory);
        let mut guard = slot.lock().await;

        // 1. Memory cache, else sidecar, else fresh.
        let mut index = match guard.take() {
            Some(index) => index,
            None => match load_sidecar(&directory).await {
                Some(index) => index,
                None => DirectoryIndex::empty(self.embedder.model_id()),
            },
        };

        // 2. Enumerate candidates.
        let files = {
            let root = directory.clone();
            let max_files = options.max_files;
            tokio::task::spawn_blocking(move || list_markdown_files(&root, max_files))
                .await
                .map_err(|e| KbIndexError::Other(format!("file enumeration failed: {e}")))?
        };

        // 3. Compare mtimes against stored records.
        let live: HashSet<String> = files
            .iter()
            .map(|path| path.to_string_lossy().to_string())
            .collect();
        let mut stale: Vec<(String, u64)> = Vec::new();
        for path in &files {
            let key = path.to_string_lossy().to_string();
            let Ok(metadata) = tokio::fs::metadata(path).await else {
                continue;
            };
            let Some(mtime) = mtime_ms(&metadata) else {
                continue;
            };
            match index.files.get(&key) {
                Some(record) if record.mtime_ms == mtime => {}
                _ => stale.push((key, mtime)),
            }
        }

        // 4. Drop files that disappeared from the corpus, chunks included.
        let tracked_before = index.files.len();
        index.files.retain(|path, _| live.contains(path));
        if index.files.len() != tracked_before {
            let files = &index.files;
            index.chunks.retain(|chunk| files.contains_key(&chunk.path));
        }

        // 5. One backend probe for the whole batch. Failure degrades this
        //    call to keyword-only capability instead of failing it.
        let updated = stale.len();
        if !stale.is_empty() {
            if let Err(e) = self.embedder.prepare().await {
                log::warn!(
                    "embedding backend unavailable, leaving {} stale file(s) unindexed in {}: {e}",
                    stale.len(),
                    directory.display()
                );
                index.last_built_unix_ms = unix_now_ms();
                let stats = IndexStats {
                    updated: 0,
                    files: index.files.len(),
                    chunks: index.chunks.len(),
                };
                self.persist(&directory, &index).await;
                *guard = Some(index);
                return Ok(stats);
            }
        }

        // 6. Re-chunk and re-embed each stale file, replacing its chunks
        //    wholesale. Per-chunk embedding failures are skipped, not fatal.
        for (key, mtime) in stale {
            let path = PathBuf::from(&key);
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    log::warn!("failed to read {}: {e}", path.display());
                    continue;
                }
            };
            let title = derive_title(&content, &path);
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let chunks = self.chunker.chunk(&content);
            let chunk_count = chunks.len();

            index.chunks.retain(|chunk| chunk.path != key);

            let mut embedded = 0usize;
            for chunk in chunks {
                let embedding = match self.embedder.embed(&chunk.text).await {
                    Ok(embedding) => embedding,
                    Err(e) => {
                        log::warn!("embedding failed for a chunk of {}: {e}", path.display());
                        continue;
                    }
                };
                index.chunks.push(IndexedChunk {
                    path: key.clone(),
                    file: file_name.clone(),
                    title: title.clone(),
                    heading: chunk.heading,
                    text: chunk.text,
                    embedding,
                });
                embedded += 1;
            }
            log::debug!(
                "indexed {} ({embedded}/{chunk_count} chunks embedded)",
                path.display()
            );
            index.files.insert(
                key,
                FileRecord {
                    mtime_ms: mtime,
                    chunk_count,
                },
            );
        }

        // 7. Stamp and persist.
        index.schema_version = INDEX_SCHEMA_VERSION;
        index.model = self.embedder.model_id().to_string();
        index.last_built_unix_ms = unix_now_ms();
        let stats = IndexStats {
            updated,
            files: index.files.len(),
            chunks: index.chunks.len(),
        };
        if updated > 0 {
            log::info!(
                "index refreshed for {}: {updated} file(s) updated, {} chunk(s) total",
                directory.display(),
                stats.chunks
            );
        }
        self.persist(&directory, &index).await;
        *guard = Some(index);

        Ok(stats)
    }

    /// Run `f` over the directory's current chunks without cloning them.
    /// Returns `None` when the directory has never been ensured (or was
    /// evicted and not yet re-ensured).
    pub async fn with_chunks<T>(
        &self,
        directory: &Path,
        f: impl FnOnce(&[IndexedChunk]) -> T,
    ) -> Option<T> {
        let directory = canonical_dir(directory).await.ok()?;
        let slot = self.slot(&directory);
        let guard = slot.lock().await;
        guard.as_ref().map(|index| f(&index.chunks))
    }

    /// Sidecar write failures are logged and swallowed: the in-memory index
    /// stays correct for the process lifetime.
    async fn persist(&self, directory: &Path, index: &DirectoryIndex) {
        if let Err(e) = save_sidecar(directory, index).await {
            log::warn!(
                "failed to persist index sidecar for {}: {e}",
                directory.display()
            );
        }
    }
}

async fn canonical_dir(directory: &Path) -> Result<PathBuf> {
    let canonical = tokio::fs::canonicalize(directory)
        .await
        .map_err(|e| KbIndexError::InvalidDirectory(format!("{}: {e}", directory.display())))?;
    let metadata = tokio::fs::metadata(&canonical).await?;
    if !metadata.is_dir() {
        return Err(KbIndexError::InvalidDirectory(format!(
            "{} is not a directory",
            directory.display()
        )));
    }
    Ok(canonical)
}
