use crate::error::{Result, RetrievalError};
use crate::lexical::score_chunk;
use crate::passage::{truncate_with_marker, Passage};
use crate::tokenize::tokenize;
use quill_embeddings::{dot, Embedder};
use quill_kb_index::{list_markdown_files, EnsureOptions, KbStore};
use quill_markdown_chunker::{derive_title, Chunker};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Options for [`RetrievalService::search_embeddings`].
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingSearchOptions {
    pub top_k: usize,
    pub max_chars_per_passage: usize,
    /// Enumeration cap forwarded to the index refresh.
    pub max_files: usize,
}

impl Default for EmbeddingSearchOptions {
    fn default() -> Self {
        Self {
            top_k: 6,
            max_chars_per_passage: 600,
            max_files: 2000,
        }
    }
}

/// Options for [`RetrievalService::search_passages`].
#[derive(Debug, Clone, Copy)]
pub struct PassageSearchOptions {
    pub max_files: usize,
    pub max_passages: usize,
    pub max_chars_per_passage: usize,
    /// When false, file name / path / title are omitted from results.
    pub include_file_meta: bool,
}

impl Default for PassageSearchOptions {
    fn default() -> Self {
        Self {
            max_files: 2000,
            max_passages: 6,
            max_chars_per_passage: 600,
            include_file_meta: true,
        }
    }
}

/// Passage retrieval over one markdown directory.
pub struct RetrievalService {
    store: Arc<KbStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
}

impl RetrievalService {
    #[must_use]
    pub fn new(store: Arc<KbStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            chunker: Chunker::default(),
        }
    }

    /// Nearest-neighbor search against the directory's embedding index.
    ///
    /// Refreshes the index first, then scores every chunk by dot product
    /// against the query embedding. Returns an empty list for a blank query,
    /// an invalid directory, or an index with no chunks.
    pub async fn search_embeddings(
        &self,
        directory: &Path,
        query: &str,
        options: &EmbeddingSearchOptions,
    ) -> Result<Vec<Passage>> {
        if query.trim().is_empty() || !directory.is_dir() {
            return Ok(Vec::new());
        }

        self.store
            .ensure_index(
                directory,
                &EnsureOptions {
                    max_files: options.max_files,
                },
            )
            .await?;

        let has_chunks = self
            .store
            .with_chunks(directory, |chunks| !chunks.is_empty())
            .await
            .unwrap_or(false);
        if !has_chunks {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let mut passages = self
            .store
            .with_chunks(directory, |chunks| {
                chunks
                    .iter()
                    .map(|chunk| Passage {
                        score: dot(&query_embedding, &chunk.embedding),
                        file: Some(chunk.file.clone()),
                        path: Some(chunk.path.clone()),
                        title: Some(chunk.title.clone()),
                        heading: chunk.heading.clone(),
                        text: truncate_with_marker(&chunk.text, options.max_chars_per_passage),
                    })
                    .collect::<Vec<_>>()
            })
            .await
            .unwrap_or_default();

        passages.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        passages.truncate(options.top_k);

        log::debug!(
            "embedding search in {}: {} passage(s)",
            directory.display(),
            passages.len()
        );
        Ok(passages)
    }

    /// Keyword fallback: re-chunks every markdown file from scratch and
    /// ranks chunks by term overlap. Works with no embedding index at all.
    pub async fn search_passages(
        &self,
        directory: &Path,
        query: &str,
        options: &PassageSearchOptions,
    ) -> Result<Vec<Passage>> {
        if query.trim().is_empty() || !directory.is_dir() {
            return Ok(Vec::new());
        }
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let files = {
            let root = directory.to_path_buf();
            let max_files = options.max_files;
            tokio::task::spawn_blocking(move || list_markdown_files(&root, max_files))
                .await
                .map_err(|e| RetrievalError::Other(format!("file enumeration failed: {e}")))?
        };

        let mut passages = Vec::new();
        for path in files {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    log::warn!("failed to read {}: {e}", path.display());
                    continue;
                }
            };
            let title = derive_title(&content, &path);

            for chunk in self.chunker.chunk(&content) {
                let chunk_tokens = tokenize(&chunk.text);
                if chunk_tokens.is_empty() {
                    continue;
                }
                let score = score_chunk(&query_tokens, &chunk_tokens, &title, &chunk.heading);
                if score == 0 {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                passages.push(Passage {
                    score: score as f32,
                    file: options.include_file_meta.then(|| {
                        path.file_name()
                            .map(|name| name.to_string_lossy().to_string())
                            .unwrap_or_default()
                    }),
                    path: options
                        .include_file_meta
                        .then(|| path.to_string_lossy().to_string()),
                    title: options.include_file_meta.then(|| title.clone()),
                    heading: chunk.heading,
                    text: truncate_with_marker(&chunk.text, options.max_chars_per_passage),
                });
            }
        }

        // Stable sort: equal scores keep scan order.
        passages.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        passages.truncate(options.max_passages);

        log::debug!(
            "keyword search in {}: {} passage(s)",
            directory.display(),
            passages.len()
        );
        Ok(passages)
    }
}

/// Strip an instruction down to a broader keyword query: its content tokens
/// (two chars or longer), deduplicated, in scan order. Returns `None` when
/// nothing usable remains or the result is not actually broader.
#[must_use]
pub fn broaden_query(instruction: &str) -> Option<String> {
    let mut seen = HashSet::new();
    let tokens: Vec<String> = tokenize(instruction)
        .into_iter()
        .filter(|token| token.chars().count() >= 2)
        .filter(|token| seen.insert(token.clone()))
        .collect();
    if tokens.is_empty() {
        return None;
    }
    let broadened = tokens.join(" ");
    if broadened == instruction.trim().to_lowercase() {
        return None;
    }
    Some(broadened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn broaden_query_keeps_content_tokens() {
        let broadened = broaden_query("Summarize my articles about SEO, please!").unwrap();
        assert_eq!(broadened, "summarize my articles about seo please");
    }

    #[test]
    fn broaden_query_dedupes() {
        let broadened = broaden_query("foo foo bar foo").unwrap();
        assert_eq!(broadened, "foo bar");
    }

    #[test]
    fn broaden_query_drops_single_chars() {
        let broadened = broaden_query("a I x summary").unwrap();
        assert_eq!(broadened, "summary");
    }

    #[test]
    fn broaden_query_returns_none_when_nothing_usable() {
        assert_eq!(broaden_query("!?"), None);
        assert_eq!(broaden_query("x y"), None);
    }

    #[test]
    fn broaden_query_returns_none_when_not_broader() {
        assert_eq!(broaden_query("foo bar"), None);
    }
}
