use crate::gateway::KbGateway;
use quill_markdown_chunker::derive_title;
use quill_retrieval::truncate_with_marker;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::UNIX_EPOCH;

const PREVIEW_CHARS: usize = 200;

/// Sidebar listing entry for one article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleMeta {
    pub filename: String,
    pub title: String,
    pub path: String,
    pub size_bytes: u64,
    pub modified_unix_ms: u64,
    pub preview: String,
}

impl KbGateway {
    /// Non-recursive listing of the directory's markdown articles, newest
    /// first. Empty list on any failure.
    pub async fn list_articles(&self, directory: &Path) -> Vec<ArticleMeta> {
        match scan_articles(directory).await {
            Ok(articles) => articles.into_iter().map(|(meta, _)| meta).collect(),
            Err(e) => {
                log::warn!("failed to list articles in {}: {e}", directory.display());
                Vec::new()
            }
        }
    }

    /// Case-insensitive substring search over article titles and bodies,
    /// newest first. Empty list on any failure.
    pub async fn search_articles(&self, directory: &Path, query: &str) -> Vec<ArticleMeta> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        match scan_articles(directory).await {
            Ok(articles) => articles
                .into_iter()
                .filter(|(meta, content)| {
                    meta.title.to_lowercase().contains(&query)
                        || content.to_lowercase().contains(&query)
                })
                .map(|(meta, _)| meta)
                .collect(),
            Err(e) => {
                log::warn!("failed to search articles in {}: {e}", directory.display());
                Vec::new()
            }
        }
    }
}

async fn scan_articles(directory: &Path) -> anyhow::Result<Vec<(ArticleMeta, String)>> {
    let mut entries = tokio::fs::read_dir(directory).await?;
    let mut articles = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_markdown = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
        if !is_markdown {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                log::warn!("failed to read {}: {e}", path.display());
                continue;
            }
        };

        let meta = ArticleMeta {
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
            title: derive_title(&content, &path),
            path: path.to_string_lossy().to_string(),
            size_bytes: metadata.len(),
            modified_unix_ms: modified_ms(&metadata),
            preview: truncate_with_marker(&content, PREVIEW_CHARS),
        };
        articles.push((meta, content));
    }

    articles.sort_by(|a, b| b.0.modified_unix_ms.cmp(&a.0.modified_unix_ms));
    Ok(articles)
}

fn modified_ms(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|since| u64::try_from(since.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
