#[cfg(feature = "mock")]
use crate::mock::MockEmbedder;
use crate::error::LlmError;
use crate::huggingface::HuggingFaceEmbedder;
use crate::ollama::OllamaEmbedder;
use crate::openai::OpenAiEmbedder;
use crate::provider::EmbeddingProvider;

/// Generates a match over all `AnyEmbedder` variants, binding the inner embedder
/// and evaluating the given expression for each arm.
macro_rules! delegate_embedder {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Ollama($p) => $expr,
            AnyEmbedder::OpenAi($p) => $expr,
            AnyEmbedder::HuggingFace($p) => $expr,
            #[cfg(feature = "mock")]
            AnyEmbedder::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    Ollama(OllamaEmbedder),
    OpenAi(OpenAiEmbedder),
    HuggingFace(HuggingFaceEmbedder),
    #[cfg(feature = "mock")]
    Mock(MockEmbedder),
}

impl EmbeddingProvider for AnyEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        delegate_embedder!(self, |p| p.embed_batch(texts).await)
    }

    fn name(&self) -> &str {
        delegate_embedder!(self, |p| p.name())
    }
}
