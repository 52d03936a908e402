use quill_embeddings::Embedder;
use quill_kb_index::{EnsureOptions, IndexStats, KbStore};
use quill_retrieval::{
    broaden_query, EmbeddingSearchOptions, Passage, PassageSearchOptions, RetrievalService,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Envelope for `build_index`; `ok == false` carries the error as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildIndexResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Which retrieval stage produced the passages in a [`LocalContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Embeddings,
    Lexical,
    BroadenedLexical,
    Empty,
}

/// Result of the combined retrieval flow. `Empty` passages with a
/// grounding-required instruction should surface an explicit "no relevant
/// local content found" message instead of generating ungrounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalContext {
    pub passages: Vec<Passage>,
    pub mode: RetrievalMode,
}

/// Options for [`KbGateway::retrieve_context`].
#[derive(Debug, Clone, Copy)]
pub struct RetrieveOptions {
    pub max_passages: usize,
    pub max_chars_per_passage: usize,
    /// Enumeration cap for indexing and for the broadened-query retry.
    pub max_files: usize,
    /// Tighter cap for the first lexical probe, which re-chunks files
    /// from scratch on every call.
    pub lexical_probe_max_files: usize,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            max_passages: 6,
            max_chars_per_passage: 600,
            max_files: 2000,
            lexical_probe_max_files: 300,
        }
    }
}

/// The knowledge-base command surface consumed by the editor shell.
pub struct KbGateway {
    store: Arc<KbStore>,
    service: RetrievalService,
}

impl KbGateway {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let store = Arc::new(KbStore::new(Arc::clone(&embedder)));
        let service = RetrievalService::new(Arc::clone(&store), embedder);
        Self { store, service }
    }

    /// Build or refresh the directory's index. Never fails across the
    /// boundary.
    pub async fn build_index(
        &self,
        directory: &Path,
        options: &EnsureOptions,
    ) -> BuildIndexResponse {
        match self.store.ensure_index(directory, options).await {
            Ok(stats) => BuildIndexResponse {
                ok: true,
                stats: Some(stats),
                error: None,
            },
            Err(e) => {
                log::warn!("index build failed for {}: {e}", directory.display());
                BuildIndexResponse {
                    ok: false,
                    stats: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Embedding search; empty list on any failure.
    pub async fn search_embeddings(
        &self,
        directory: &Path,
        query: &str,
        options: &EmbeddingSearchOptions,
    ) -> Vec<Passage> {
        match self.service.search_embeddings(directory, query, options).await {
            Ok(passages) => passages,
            Err(e) => {
                log::warn!("embedding search failed for {}: {e}", directory.display());
                Vec::new()
            }
        }
    }

    /// Keyword search; empty list on any failure.
    pub async fn search_passages(
        &self,
        directory: &Path,
        query: &str,
        options: &PassageSearchOptions,
    ) -> Vec<Passage> {
        match self.service.search_passages(directory, query, options).await {
            Ok(passages) => passages,
            Err(e) => {
                log::warn!("keyword search failed for {}: {e}", directory.display());
                Vec::new()
            }
        }
    }

    /// The full grounding flow: embedding search first, keyword search when
    /// that fails or finds nothing, then one retry with a broadened keyword
    /// query before giving up.
    pub async fn retrieve_context(
        &self,
        directory: &Path,
        instruction: &str,
        options: &RetrieveOptions,
    ) -> LocalContext {
        let build = self
            .build_index(
                directory,
                &EnsureOptions {
                    max_files: options.max_files,
                },
            )
            .await;

        if build.ok {
            let passages = self
                .search_embeddings(
                    directory,
                    instruction,
                    &EmbeddingSearchOptions {
                        top_k: options.max_passages,
                        max_chars_per_passage: options.max_chars_per_passage,
                        max_files: options.max_files,
                    },
                )
                .await;
            if !passages.is_empty() {
                return LocalContext {
                    passages,
                    mode: RetrievalMode::Embeddings,
                };
            }
            log::info!("embedding search found nothing, falling back to keyword search");
        }

        let probe_options = PassageSearchOptions {
            max_files: options.lexical_probe_max_files,
            max_passages: options.max_passages,
            max_chars_per_passage: options.max_chars_per_passage,
            include_file_meta: true,
        };
        let passages = self
            .search_passages(directory, instruction, &probe_options)
            .await;
        if !passages.is_empty() {
            return LocalContext {
                passages,
                mode: RetrievalMode::Lexical,
            };
        }

        if let Some(broadened) = broaden_query(instruction) {
            log::info!("keyword search found nothing, retrying with broadened query");
            let retry_options = PassageSearchOptions {
                max_files: options.max_files,
                ..probe_options
            };
            let passages = self
                .search_passages(directory, &broadened, &retry_options)
                .await;
            if !passages.is_empty() {
                return LocalContext {
                    passages,
                    mode: RetrievalMode::BroadenedLexical,
                };
            }
        }

        LocalContext {
            passages: Vec::new(),
            mode: RetrievalMode::Empty,
        }
    }
}
