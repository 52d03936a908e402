use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding backend is permanently disabled for this process")]
    Disabled,

    #[error("model initialization failed: {0}")]
    Initialization(String),

    #[error("embedding generation failed: {0}")]
    Generation(String),

    #[error("embedding call timed out after {0:?}")]
    Timeout(Duration),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
