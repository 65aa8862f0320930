use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input in the same order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails, times out, or returns a response that
    /// cannot be parsed.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch call fails or comes back empty.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send {
        let batch = vec![text.to_owned()];
        async move {
            let vectors = self.embed_batch(&batch).await?;
            ensure_count(self.name(), 1, vectors.len())?;
            vectors
                .into_iter()
                .next()
                .ok_or_else(|| LlmError::EmptyResponse {
                    provider: self.name().to_owned(),
                })
        }
    }

    fn name(&self) -> &str;
}

/// Check that a backend returned exactly one vector per input.
///
/// # Errors
///
/// Returns [`LlmError::CountMismatch`] when the counts differ.
pub fn ensure_count(provider: &str, expected: usize, actual: usize) -> Result<(), LlmError> {
    if expected == actual {
        Ok(())
    } else {
        Err(LlmError::CountMismatch {
            provider: provider.to_owned(),
            expected,
            actual,
        })
    }
}

/// Await `fut`, mapping an elapsed deadline to [`LlmError::Timeout`].
pub(crate) async fn with_deadline<T, F>(provider: &str, timeout: Duration, fut: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout {
            provider: provider.to_owned(),
            secs: timeout.as_secs(),
        }),
    }
}
