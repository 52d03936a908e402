use crate::error::{EmbeddingError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Identifier recorded in every index built with this backend.
pub const EMBEDDING_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(60);

/// Converts text into fixed-length, unit-normalized float vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Ensure the backend is ready. Called once before a batch of embed
    /// calls so a dead backend fails the whole batch cheaply instead of
    /// per chunk.
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Embed one text. The returned vector is L2-normalized.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier, stamped into persisted indexes.
    fn model_id(&self) -> &str;
}

/// Lazily-initialized all-MiniLM-L6-v2 embedder.
///
/// State machine: uninitialized → initializing (one shared in-flight load)
/// → ready | permanently disabled. Once disabled, every call fails with
/// [`EmbeddingError::Disabled`] without touching the model again.
pub struct MiniLmEmbedder {
    model: OnceCell<Arc<Mutex<TextEmbedding>>>,
    disabled: AtomicBool,
    load_timeout: Duration,
    embed_timeout: Duration,
}

impl MiniLmEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_LOAD_TIMEOUT, DEFAULT_EMBED_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeouts(load_timeout: Duration, embed_timeout: Duration) -> Self {
        Self {
            model: OnceCell::new(),
            disabled: AtomicBool::new(false),
            load_timeout,
            embed_timeout,
        }
    }

    /// Latch the backend into the permanently-disabled state.
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    async fn model(&self) -> Result<Arc<Mutex<TextEmbedding>>> {
        if self.is_disabled() {
            return Err(EmbeddingError::Disabled);
        }

        let loaded = self
            .model
            .get_or_try_init(|| async {
                if self.is_disabled() {
                    return Err(EmbeddingError::Disabled);
                }
                log::info!("loading embedding model {EMBEDDING_MODEL_ID}");
                let load = tokio::task::spawn_blocking(|| {
                    let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                        .with_show_download_progress(false);
                    TextEmbedding::try_new(options)
                });
                let result = match tokio::time::timeout(self.load_timeout, load).await {
                    Err(_) => Err(EmbeddingError::Timeout(self.load_timeout)),
                    Ok(Err(join)) => Err(EmbeddingError::Join(join)),
                    Ok(Ok(Err(e))) => Err(EmbeddingError::Initialization(e.to_string())),
                    Ok(Ok(Ok(model))) => Ok(Arc::new(Mutex::new(model))),
                };
                if result.is_err() {
                    self.disable();
                }
                result
            })
            .await;

        match loaded {
            Ok(model) => Ok(Arc::clone(model)),
            Err(e) => {
                log::warn!("embedding model load failed, backend disabled for this process: {e}");
                Err(e)
            }
        }
    }
}

impl Default for MiniLmEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for MiniLmEmbedder {
    async fn prepare(&self) -> Result<()> {
        self.model().await.map(|_| ())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model().await?;
        let text = text.to_string();
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| "embedding model mutex poisoned".to_string())?;
            guard.embed(vec![text], None).map_err(|e| e.to_string())
        });

        let embeddings = match tokio::time::timeout(self.embed_timeout, task).await {
            Err(_) => return Err(EmbeddingError::Timeout(self.embed_timeout)),
            Ok(Err(join)) => return Err(EmbeddingError::Join(join)),
            Ok(Ok(Err(message))) => return Err(EmbeddingError::Generation(message)),
            Ok(Ok(Ok(embeddings))) => embeddings,
        };

        let mut vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Generation("backend returned no vectors".to_string()))?;
        normalize(&mut vector);
        Ok(vector)
    }

    fn model_id(&self) -> &str {
        EMBEDDING_MODEL_ID
    }
}

/// Scale `vector` to unit length. A zero vector is left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Dot product; equals cosine similarity for unit-normalized inputs.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_produces_unit_length() {
        let mut vector = vec![3.0, 4.0];
        normalize(&mut vector);
        assert_eq!(vector, vec![0.6, 0.8]);
    }

    #[test]
    fn normalize_leaves_zero_vector_alone() {
        let mut vector = vec![0.0, 0.0, 0.0];
        normalize(&mut vector);
        assert_eq!(vector, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn dot_of_identical_unit_vectors_is_one() {
        let mut vector = vec![1.0, 2.0, 2.0];
        normalize(&mut vector);
        let similarity = dot(&vector, &vector);
        assert!((similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dot_of_orthogonal_vectors_is_zero() {
        assert_eq!(dot(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn disabled_backend_fails_without_loading() {
        let embedder = MiniLmEmbedder::new();
        embedder.disable();
        let result = embedder.embed("hello").await;
        assert!(matches!(result, Err(EmbeddingError::Disabled)));
        assert!(embedder.is_disabled());
    }

    #[tokio::test]
    async fn prepare_on_disabled_backend_fails() {
        let embedder = MiniLmEmbedder::new();
        embedder.disable();
        assert!(matches!(
            embedder.prepare().await,
            Err(EmbeddingError::Disabled)
        ));
    }
}
