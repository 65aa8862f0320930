//! Hugging Face inference API feature-extraction backend.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{EmbeddingProvider, ensure_count, with_deadline};
use crate::retry::{read_success_body, send_with_retry};

pub const DEFAULT_HF_BASE_URL: &str = "https://router.huggingface.co/hf-inference";
pub const DEFAULT_HF_MODEL: &str = "microsoft/codebert-base";

const MAX_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct HuggingFaceEmbedder {
    client: reqwest::Client,
    api_token: Option<String>,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl fmt::Debug for HuggingFaceEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuggingFaceEmbedder")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HuggingFaceEmbedder {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_token: Option<String>,
        base_url: &str,
        model: String,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: crate::http::client_with_timeout(timeout)?,
            api_token,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}/pipeline/feature-extraction",
            self.base_url, self.model
        )
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = FeatureRequest { inputs: texts };
        let url = self.endpoint();

        let response = send_with_retry(self.name(), MAX_RETRIES, || {
            let mut req = self.client.post(&url).json(&body);
            if let Some(token) = &self.api_token {
                req = req.bearer_auth(token);
            }
            req.send()
        })
        .await?;

        let text = read_success_body(self.name(), response).await?;
        let parsed: FeatureResponse = serde_json::from_str(&text)?;
        Ok(parsed.into_pooled())
    }
}

impl EmbeddingProvider for HuggingFaceEmbedder {
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
        "huggingface"
    }
}

#[derive(Serialize)]
struct FeatureRequest<'a> {
    inputs: &'a [String],
}

/// Sentence-transformer models return one vector per input; raw encoders such as
/// codebert return per-token vectors which are mean-pooled here.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureResponse {
    Pooled(Vec<Vec<f32>>),
    Tokens(Vec<Vec<Vec<f32>>>),
}

impl FeatureResponse {
    fn into_pooled(self) -> Vec<Vec<f32>> {
        match self {
            Self::Pooled(v) => v,
            Self::Tokens(v) => v.into_iter().map(|tokens| mean_pool(&tokens)).collect(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_pool(tokens: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = tokens.first() else {
        return Vec::new();
    };
    let mut acc = vec![0.0f32; first.len()];
    for token in tokens {
        for (a, x) in acc.iter_mut().zip(token) {
            *a += x;
        }
    }
    let n = tokens.len() as f32;
    for a in &mut acc {
        *a /= n;
    }
    acc
}
