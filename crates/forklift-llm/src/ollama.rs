use std::time::Duration;

use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};

use crate::error::LlmError;
use crate::provider::{EmbeddingProvider, ensure_count, with_deadline};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
    timeout: Duration,
}

impl OllamaEmbedder {
    #[must_use]
    pub fn new(base_url: &str, model: String, timeout: Duration) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            timeout,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = GenerateEmbeddingsRequest::new(
            self.model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );

        let response = with_deadline(self.name(), self.timeout, async {
            self.client
                .generate_embeddings(request)
                .await
                .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))
        })
        .await?;

        ensure_count(self.name(), texts.len(), response.embeddings.len())?;
        Ok(response.embeddings)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), 11434)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_port_with_port() {
        let (host, port) = parse_host_port("http://localhost:11434");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_without_port() {
        let (host, port) = parse_host_port("http://localhost");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_trailing_slashes() {
        let (host, port) = parse_host_port("http://ollama.internal:8080///");
        assert_eq!(host, "http://ollama.internal");
        assert_eq!(port, 8080);
    }

    #[test]
    fn parse_host_port_overflow_falls_back() {
        let (host, port) = parse_host_port("http://localhost:99999");
        assert_eq!(host, "http://localhost:99999");
        assert_eq!(port, 11434);
    }

    #[test]
    fn new_stores_model() {
        let e = OllamaEmbedder::new(
            DEFAULT_OLLAMA_URL,
            "nomic-embed-text".into(),
            Duration::from_secs(5),
        );
        assert_eq!(e.model(), "nomic-embed-text");
        assert_eq!(e.name(), "ollama");
    }

    #[tokio::test]
    async fn empty_batch_skips_request() {
        let e = OllamaEmbedder::new("http://127.0.0.1:1", "embed".into(), Duration::from_secs(1));
        assert!(e.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors() {
        let e = OllamaEmbedder::new("http://127.0.0.1:1", "embed".into(), Duration::from_secs(2));
        assert!(e.embed("def f(): pass").await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires running Ollama instance"]
    async fn integration_embed_batch() {
        let e = OllamaEmbedder::new(
            DEFAULT_OLLAMA_URL,
            "nomic-embed-text".into(),
            Duration::from_secs(60),
        );
        let vectors = e
            .embed_batch(&["fn main() {}".to_owned(), "def main(): pass".to_owned()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), vectors[1].len());
    }
}
