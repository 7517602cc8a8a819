use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Embedding failure: {0}")]
    EmbeddingFailure(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Invalid chunking parameters: max_size={max_size}, overlap={overlap} (need 0 <= overlap < max_size)")]
    InvalidChunking { max_size: usize, overlap: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Corrupt index entry: {0}")]
    CorruptEntry(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<heed::Error> for RetrievalError {
    fn from(err: heed::Error) -> Self {
        RetrievalError::IndexUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
