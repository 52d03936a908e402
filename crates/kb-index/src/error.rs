use thiserror::Error;

pub type Result<T> = std::result::Result<T, KbIndexError>;

#[derive(Error, Debug)]
pub enum KbIndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid directory: {0}")]
    InvalidDirectory(String),

    #[error("{0}")]
    Other(String),
}
