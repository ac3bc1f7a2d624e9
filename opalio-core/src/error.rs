use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpalError>;

#[derive(Error, Debug)]
pub enum OpalError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Content already uploaded: {0}")]
    ContentUploaded(String),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Forbidden content: {0}")]
    Forbidden(String),

    #[error("Replica upload failed: {0}")]
    ReplicaFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
