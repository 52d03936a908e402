//! # Quill Embeddings
//!
//! Text-embedding backend for the knowledge-base index and search.
//!
//! The production implementation, [`MiniLmEmbedder`], lazily loads the
//! all-MiniLM-L6-v2 sentence-transformer exactly once per process. The first
//! caller triggers the load; concurrent callers share the same in-flight
//! initialization. A failed load latches the provider into a permanently
//! disabled state so a broken backend is not retried on every keystroke.
//!
//! Vectors are L2-normalized on the way out, so [`dot`] is cosine similarity.

mod error;
mod provider;

pub use error::{EmbeddingError, Result};
pub use provider::{dot, normalize, Embedder, MiniLmEmbedder, EMBEDDING_MODEL_ID};
