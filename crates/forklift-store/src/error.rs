use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid vector: {0}")]
    InvalidVector(String),

    #[error("index dimension is {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index artifacts are inconsistent: {0}")]
    Corrupt(String),

    #[error("Qdrant error: {0}")]
    Qdrant(#[from] Box<qdrant_client::QdrantError>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("index is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub(crate) trait PersistContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> PersistContext<T> for std::io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| StoreError::Persist {
            path: path.into(),
            source,
        })
    }
}
