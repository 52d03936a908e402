//! # Quill Retrieval
//!
//! Passage retrieval over a user's markdown directory: embedding-based
//! nearest-neighbor search against the persistent index, a lexical fallback
//! scorer that works without embeddings, and the router that decides which
//! retrieval sources an instruction should consult.

mod error;
mod lexical;
mod passage;
pub mod router;
mod service;
mod tokenize;

pub use error::{Result, RetrievalError};
pub use passage::{truncate_with_marker, Passage};
pub use router::{RetrievalRoute, RouteClassifier, Router};
pub use service::{
    broaden_query, EmbeddingSearchOptions, PassageSearchOptions, RetrievalService,
};
pub use tokenize::tokenize;
