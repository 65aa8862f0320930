//! Test-only deterministic embedder.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LlmError;
use crate::provider::EmbeddingProvider;

/// Hashes lowercase word tokens into `dimension` buckets, so texts sharing
/// identifiers land close together under cosine similarity.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimension: usize,
    /// Fail every call.
    pub fail: bool,
    /// Fail starting at this zero-based call number.
    pub fail_from_call: Option<usize>,
    /// Drop the last vector of every batch.
    pub short_response: bool,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
    overrides: Arc<HashMap<String, Vec<f32>>>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
            fail_from_call: None,
            short_response: false,
            delay_ms: 0,
            overrides: Arc::new(HashMap::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn failing(dimension: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(dimension)
        }
    }

    #[must_use]
    pub fn with_fail_from_call(mut self, call: usize) -> Self {
        self.fail_from_call = Some(call);
        self
    }

    #[must_use]
    pub fn with_short_response(mut self) -> Self {
        self.short_response = true;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Return `vector` verbatim whenever exactly `text` is embedded.
    #[must_use]
    pub fn with_override(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Arc::make_mut(&mut self.overrides).insert(text.into(), vector);
        self
    }

    /// Number of `embed_batch` calls made so far, shared across clones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.overrides.get(text) {
            return v.clone();
        }
        let mut v = vec![0.0f32; self.dimension.max(1)];
        let mut any = false;
        for token in text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(&token.to_lowercase()) as usize) % v.len();
            v[bucket] += 1.0;
            any = true;
        }
        if !any {
            v[0] = 1.0;
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in s.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

impl EmbeddingProvider for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail || self.fail_from_call.is_some_and(|n| call >= n) {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        let mut out: Vec<Vec<f32>> = texts.iter().map(|t| self.vector_for(t)).collect();
        if self.short_response {
            out.pop();
        }
        Ok(out)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
