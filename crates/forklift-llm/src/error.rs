#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("{provider} did not respond within {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("{provider} returned status {status}")]
    Status { provider: String, status: u16 },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("{provider} returned {actual} embeddings for {expected} inputs")]
    CountMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
