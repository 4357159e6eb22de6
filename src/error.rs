use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecError>;

/// Structural failures. User-level outcomes (unknown state, unknown user,
/// no positive history) are ordinary values and never reach this type.
#[derive(Error, Debug)]
pub enum RecError {
    #[error("Index position {position} out of range (index holds {count} vectors)")]
    IndexOutOfRange { position: usize, count: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Factorization failed: {0}")]
    Factorization(String),

    #[error("Snapshot load failed: {0}")]
    SnapshotLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecError {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        RecError::InvalidArgument(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        RecError::Validation(msg.into())
    }

    pub fn snapshot<S: Into<String>>(msg: S) -> Self {
        RecError::SnapshotLoad(msg.into())
    }
}
