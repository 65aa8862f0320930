//! Error types for forklift-index.

/// Errors that abort an indexing job or a query.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The repository could not be listed or read.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Embedding backend failed, timed out, or returned unusable vectors.
    #[error("embedding failed: {0}")]
    Embedding(#[from] forklift_llm::LlmError),

    /// Embedding vector has the wrong length for the index.
    #[error("embedding dimension is {actual}, index expects {expected}")]
    Dimension { expected: usize, actual: usize },

    /// Vector index rejected or failed an operation.
    #[error("vector index error: {0}")]
    Store(#[from] forklift_store::StoreError),

    /// A pipeline stage exceeded its deadline.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    /// Chunks, vectors, and stored entries did not reconcile.
    #[error("{stage}: expected {expected}, got {actual}")]
    CountMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Two chunks map to the same entry id, e.g. a source listed one path twice.
    #[error("duplicate entry for {file_path} at line {line_start}")]
    DuplicateEntry { file_path: String, line_start: usize },

    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Background chunking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
