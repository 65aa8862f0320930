use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{EmbeddingProvider, ensure_count, with_deadline};
use crate::retry::{read_success_body, send_with_retry};

const MAX_RETRIES: u32 = 3;

/// Embedder for any endpoint speaking the OpenAI `/embeddings` API.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiEmbedder {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_key: Option<String>,
        mut base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client: crate::http::client_with_timeout(timeout)?,
            api_key,
            base_url,
            model,
            timeout,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = EmbeddingRequest {
            input: texts,
            model: &self.model,
        };
        let url = format!("{}/embeddings", self.base_url);

        let response = send_with_retry(self.name(), MAX_RETRIES, || {
            let mut req = self.client.post(&url).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }
            req.send()
        })
        .await?;

        let text = read_success_body(self.name(), response).await?;
        let resp: EmbeddingResponse = serde_json::from_str(&text)?;
        Ok(into_ordered(resp))
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = with_deadline(self.name(), self.timeout, self.request(texts)).await?;
        ensure_count(self.name(), texts.len(), vectors.len())?;
        Ok(vectors)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

/// The API may return items out of order; `index` is authoritative.
fn into_ordered(resp: EmbeddingResponse) -> Vec<Vec<f32>> {
    let mut data = resp.data;
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
