//! Turns a validated [`Config`] into the services the binary runs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use forklift_index::{ChunkerConfig, CodeIndexer, IndexerConfig, LocalSource};
use forklift_llm::any::AnyEmbedder;
use forklift_llm::huggingface::HuggingFaceEmbedder;
#[cfg(feature = "mock")]
use forklift_llm::mock::MockEmbedder;
use forklift_llm::ollama::OllamaEmbedder;
use forklift_llm::openai::OpenAiEmbedder;
use forklift_store::{FlatIndex, QdrantIndex, VectorIndex};

use crate::config::{Config, ProviderKind, StoreBackend};

/// Embedding provider and index handle wired from one config.
pub struct AppServices {
    pub embedder: AnyEmbedder,
    pub index: Arc<dyn VectorIndex>,
    pub indexer_config: IndexerConfig,
}

impl AppServices {
    /// # Errors
    ///
    /// Returns an error if the config is invalid, the embedder cannot be built,
    /// or the index cannot be opened.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let embedder = build_embedder(config)?;
        let index = open_index(config).await?;
        tracing::info!(
            provider = %config.embedding.provider,
            model = %config.embedding.model,
            backend = %config.store.backend,
            dimension = config.embedding.dimension,
            "services ready"
        );
        Ok(Self {
            embedder,
            index,
            indexer_config: indexer_config(config),
        })
    }

    #[must_use]
    pub fn indexer(self) -> CodeIndexer<AnyEmbedder> {
        CodeIndexer::new(self.embedder, self.index, self.indexer_config)
    }
}

/// # Errors
///
/// Returns an error if the HTTP client for the provider cannot be built, or the
/// mock provider is requested without the `mock` feature.
pub fn build_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    let embedding = &config.embedding;
    let timeout = Duration::from_secs(embedding.timeout_secs);
    let embedder = match embedding.provider {
        ProviderKind::Ollama => AnyEmbedder::Ollama(OllamaEmbedder::new(
            &embedding.base_url,
            embedding.model.clone(),
            timeout,
        )),
        ProviderKind::OpenAi => AnyEmbedder::OpenAi(
            OpenAiEmbedder::new(
                config
                    .secrets
                    .openai_api_key
                    .as_ref()
                    .map(|s| s.expose().to_owned()),
                embedding.base_url.clone(),
                embedding.model.clone(),
                timeout,
            )
            .context("failed to build OpenAI embedding client")?,
        ),
        ProviderKind::HuggingFace => AnyEmbedder::HuggingFace(
            HuggingFaceEmbedder::new(
                config
                    .secrets
                    .huggingface_api_key
                    .as_ref()
                    .map(|s| s.expose().to_owned()),
                &embedding.base_url,
                embedding.model.clone(),
                timeout,
            )
            .context("failed to build Hugging Face embedding client")?,
        ),
        #[cfg(feature = "mock")]
        ProviderKind::Mock => AnyEmbedder::Mock(MockEmbedder::new(embedding.dimension)),
        #[cfg(not(feature = "mock"))]
        ProviderKind::Mock => {
            anyhow::bail!("the mock embedding provider requires the `mock` feature")
        }
    };
    Ok(embedder)
}

/// Open the configured backend with the configured dimension.
///
/// # Errors
///
/// Returns an error if the flat index directory cannot be loaded or the Qdrant
/// collection cannot be reached or created.
pub async fn open_index(config: &Config) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let dimension = config.embedding.dimension;
    let index: Arc<dyn VectorIndex> = match config.store.backend {
        StoreBackend::Flat => Arc::new(
            FlatIndex::open(&config.store.path, dimension)
                .await
                .with_context(|| {
                    format!(
                        "failed to open flat index at {}",
                        config.store.path.display()
                    )
                })?,
        ),
        StoreBackend::Qdrant => Arc::new(
            QdrantIndex::open(&config.store.qdrant_url, &config.store.collection, dimension)
                .await
                .with_context(|| {
                    format!(
                        "failed to open qdrant collection {} at {}",
                        config.store.collection, config.store.qdrant_url
                    )
                })?,
        ),
    };
    Ok(index)
}

#[must_use]
pub fn indexer_config(config: &Config) -> IndexerConfig {
    IndexerConfig {
        chunker: ChunkerConfig {
            generic_chunk_size: config.chunker.generic_chunk_size,
        },
        batch_size: config.embedding.batch_size,
        embed_timeout: Duration::from_secs(config.embedding.timeout_secs),
        fetch_timeout: Duration::from_secs(config.ingest.fetch_timeout_secs),
    }
}

/// A [`LocalSource`] over `root` filtered by the `[ingest]` settings.
#[must_use]
pub fn local_source(config: &Config, root: &Path) -> LocalSource {
    LocalSource::new(root)
        .with_extensions(&config.ingest.extensions)
        .with_max_file_size(config.ingest.max_file_size)
}
