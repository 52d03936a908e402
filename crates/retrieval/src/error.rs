use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("index error: {0}")]
    Index(#[from] quill_kb_index::KbIndexError),

    #[error("embedding error: {0}")]
    Embedding(#[from] quill_embeddings::EmbeddingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
