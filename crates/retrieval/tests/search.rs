use async_trait::async_trait;
use pretty_assertions::assert_eq;
use quill_embeddings::{normalize, Embedder, EmbeddingError};
use quill_kb_index::KbStore;
use quill_retrieval::{
    EmbeddingSearchOptions, PassageSearchOptions, RetrievalService,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Deterministic embedder: a byte histogram folded into 8 dims, normalized.
#[derive(Default)]
struct HashEmbedder {
    fail: AtomicBool,
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn prepare(&self) -> quill_embeddings::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Disabled);
        }
        Ok(())
    }

    async fn embed(&self, text: &str) -> quill_embeddings::Result<Vec<f32>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Disabled);
        }
        let mut vector = vec![0.0f32; 8];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % 8] += f32::from(byte);
        }
        normalize(&mut vector);
        Ok(vector)
    }

    fn model_id(&self) -> &str {
        "test-hash-embedder"
    }
}

fn service() -> (RetrievalService, Arc<HashEmbedder>) {
    let embedder = Arc::new(HashEmbedder::default());
    let store = Arc::new(KbStore::new(embedder.clone()));
    (RetrievalService::new(store, embedder.clone()), embedder)
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[tokio::test]
async fn keyword_search_returns_the_matching_file_only() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.md", "# A\n## Intro\nhello world");
    write(dir.path(), "b.md", "# B\n## Intro\nfoo bar");
    let (service, _) = service();

    let passages = service
        .search_passages(dir.path(), "foo", &PassageSearchOptions::default())
        .await
        .unwrap();
    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].file.as_deref(), Some("b.md"));
    assert_eq!(passages[0].heading, "Intro");
    assert_eq!(passages[0].text, "foo bar");
    assert!(passages[0].score >= 3.0);
}

#[tokio::test]
async fn keyword_search_ranks_by_score_with_stable_ties() {
    let dir = tempfile::tempdir().unwrap();
    // c.md: two exact hits. a.md and b.md: one each, so they tie behind it.
    write(dir.path(), "a.md", "needle here");
    write(dir.path(), "b.md", "needle there");
    write(dir.path(), "c.md", "needle needle");
    let (service, _) = service();

    let passages = service
        .search_passages(dir.path(), "needle", &PassageSearchOptions::default())
        .await
        .unwrap();
    assert_eq!(passages.len(), 3);
    assert_eq!(passages[0].file.as_deref(), Some("c.md"));
    assert!(passages[0].score > passages[1].score);
    assert_eq!(passages[1].score, passages[2].score);
}

#[tokio::test]
async fn keyword_search_can_omit_file_meta() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.md", "needle here");
    let (service, _) = service();

    let passages = service
        .search_passages(
            dir.path(),
            "needle",
            &PassageSearchOptions {
                include_file_meta: false,
                ..PassageSearchOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].file, None);
    assert_eq!(passages[0].path, None);
    assert_eq!(passages[0].title, None);
}

#[tokio::test]
async fn embedding_search_orders_by_similarity() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.md", "alpha bravo charlie");
    write(dir.path(), "b.md", "zq zq zq zq");
    let (service, _) = service();

    let passages = service
        .search_embeddings(
            dir.path(),
            "alpha bravo charlie",
            &EmbeddingSearchOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].file.as_deref(), Some("a.md"));
    assert!((passages[0].score - 1.0).abs() < 1e-5);
    assert!(passages[0].score > passages[1].score);
}

#[tokio::test]
async fn top_k_limits_embedding_results() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..5 {
        write(dir.path(), &format!("f{i}.md"), &format!("content number {i}"));
    }
    let (service, _) = service();

    let passages = service
        .search_embeddings(
            dir.path(),
            "content",
            &EmbeddingSearchOptions {
                top_k: 2,
                ..EmbeddingSearchOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(passages.len(), 2);
}

#[tokio::test]
async fn blank_query_and_bad_directory_short_circuit() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.md", "something");
    let (service, _) = service();

    assert!(service
        .search_embeddings(dir.path(), "  \u{3000} ", &EmbeddingSearchOptions::default())
        .await
        .unwrap()
        .is_empty());
    assert!(service
        .search_passages(dir.path(), "", &PassageSearchOptions::default())
        .await
        .unwrap()
        .is_empty());
    assert!(service
        .search_embeddings(
            Path::new("/definitely/not/here"),
            "query",
            &EmbeddingSearchOptions::default()
        )
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn disabled_backend_keeps_keyword_search_alive() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.md", "# A\nfoo bar");
    let (service, embedder) = service();
    embedder.fail.store(true, Ordering::SeqCst);

    // The index degrades to zero chunks, so embedding search is empty.
    let embedding = service
        .search_embeddings(dir.path(), "foo", &EmbeddingSearchOptions::default())
        .await
        .unwrap();
    assert!(embedding.is_empty());

    // Keyword search never touches the backend and still ranks chunks.
    let keyword = service
        .search_passages(dir.path(), "foo", &PassageSearchOptions::default())
        .await
        .unwrap();
    assert_eq!(keyword.len(), 1);
}
