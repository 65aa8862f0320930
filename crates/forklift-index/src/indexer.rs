//! Repository indexing orchestrator: fetch → chunk → embed → store.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use forklift_llm::EmbeddingProvider;
use forklift_llm::provider::ensure_count;
use forklift_store::{EntryPayload, IndexEntry, SearchResults, VectorIndex};

use crate::chunker::{ChunkerConfig, CodeChunk, chunk_file};
use crate::context::enhanced_text;
use crate::error::{IndexError, Result};
use crate::source::{SkippedFile, SourceFile, SourceProvider};

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub chunker: ChunkerConfig,
    /// Texts per embedding call (default: 32).
    pub batch_size: usize,
    /// Deadline for each embedding call (default: 60s).
    pub embed_timeout: Duration,
    /// Deadline for the whole fetch (default: 300s).
    pub fetch_timeout: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            batch_size: 32,
            embed_timeout: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(300),
        }
    }
}

/// Summary of one indexing job.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub repository: String,
    pub files_fetched: usize,
    pub skipped: Vec<SkippedFile>,
    pub chunks_created: usize,
    pub entries_stored: usize,
    pub duration_ms: u64,
}

/// Runs indexing jobs and queries against one vector index.
pub struct CodeIndexer<P> {
    provider: P,
    index: Arc<dyn VectorIndex>,
    config: IndexerConfig,
}

impl<P: EmbeddingProvider> CodeIndexer<P> {
    #[must_use]
    pub fn new(provider: P, index: Arc<dyn VectorIndex>, config: IndexerConfig) -> Self {
        Self {
            provider,
            index,
            config,
        }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Index every file `source` yields under the `repository` tag.
    ///
    /// Entries are written in a single upsert after every chunk has been
    /// embedded, so a failed job leaves the index as it was.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching, embedding, or storing fails, or if the
    /// number of stored entries does not match the number of chunks.
    pub async fn index_repository<S: SourceProvider>(
        &self,
        repository: &str,
        source: &S,
    ) -> Result<IndexReport> {
        let start = Instant::now();

        let fetched = tokio::time::timeout(self.config.fetch_timeout, source.fetch())
            .await
            .map_err(|_| IndexError::Timeout {
                stage: "fetch",
                secs: self.config.fetch_timeout.as_secs(),
            })??;
        let files_fetched = fetched.files.len();
        tracing::info!(
            repository,
            files = files_fetched,
            skipped = fetched.skipped.len(),
            "fetched repository"
        );

        let chunks = self.chunk_all(fetched.files).await?;
        tracing::info!(repository, chunks = chunks.len(), "chunked files");
        ensure_unique_ids(repository, &chunks)?;

        let documents: Vec<String> = chunks.iter().map(enhanced_text).collect();
        let vectors = self.embed_all(&documents).await?;
        if vectors.len() != chunks.len() {
            return Err(IndexError::CountMismatch {
                stage: "embed",
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(vectors)
            .zip(documents)
            .map(|((chunk, vector), document)| to_entry(repository, chunk, vector, document))
            .collect();
        let entries_stored = if entries.is_empty() {
            0
        } else {
            self.index.upsert(entries).await?
        };
        if entries_stored != chunks.len() {
            return Err(IndexError::CountMismatch {
                stage: "store",
                expected: chunks.len(),
                actual: entries_stored,
            });
        }

        let report = IndexReport {
            repository: repository.to_owned(),
            files_fetched,
            skipped: fetched.skipped,
            chunks_created: chunks.len(),
            entries_stored,
            duration_ms: start.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        };
        tracing::info!(
            repository,
            entries = report.entries_stored,
            duration_ms = report.duration_ms,
            "indexing finished"
        );
        Ok(report)
    }

    /// Embed `query` and return the `k` closest entries, optionally scoped to
    /// one repository tag.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails or the index rejects the query.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        repository: Option<&str>,
    ) -> Result<SearchResults> {
        let vector = tokio::time::timeout(self.config.embed_timeout, self.provider.embed(query))
            .await
            .map_err(|_| IndexError::Timeout {
                stage: "embed",
                secs: self.config.embed_timeout.as_secs(),
            })??;
        self.check_dimension(&vector)?;
        Ok(self
            .index
            .search(vector, k, repository.map(str::to_owned))
            .await?)
    }

    /// Chunk files on the blocking pool, one contiguous group per worker, and
    /// concatenate the results in file order.
    async fn chunk_all(&self, files: Vec<SourceFile>) -> Result<Vec<CodeChunk>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let workers = std::thread::available_parallelism().map_or(4, NonZeroUsize::get);
        let per_task = files.len().div_ceil(workers);
        let config = Arc::new(self.config.chunker.clone());

        let mut remaining = files;
        let mut handles = Vec::with_capacity(workers);
        while !remaining.is_empty() {
            let rest = remaining.split_off(per_task.min(remaining.len()));
            let group = std::mem::replace(&mut remaining, rest);
            let config = Arc::clone(&config);
            handles.push(tokio::task::spawn_blocking(move || {
                group
                    .iter()
                    .flat_map(|file| {
                        let chunks = chunk_file(file, &config);
                        tracing::debug!(file = %file.path, chunks = chunks.len(), "chunked");
                        chunks
                    })
                    .collect::<Vec<_>>()
            }));
        }

        let mut chunks = Vec::new();
        for handle in handles {
            chunks.extend(handle.await?);
        }
        Ok(chunks)
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_no, batch) in texts.chunks(self.config.batch_size.max(1)).enumerate() {
            let out = tokio::time::timeout(
                self.config.embed_timeout,
                self.provider.embed_batch(batch),
            )
            .await
            .map_err(|_| IndexError::Timeout {
                stage: "embed",
                secs: self.config.embed_timeout.as_secs(),
            })??;
            ensure_count(self.provider.name(), batch.len(), out.len())?;
            for vector in &out {
                self.check_dimension(vector)?;
            }
            tracing::debug!(batch = batch_no, size = batch.len(), "embedded batch");
            vectors.extend(out);
        }
        Ok(vectors)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        let expected = self.index.dimension();
        if vector.len() == expected {
            Ok(())
        } else {
            Err(IndexError::Dimension {
                expected,
                actual: vector.len(),
            })
        }
    }
}

/// Reject the job before anything is embedded or written if two chunks would
/// land on one entry id.
fn ensure_unique_ids(repository: &str, chunks: &[CodeChunk]) -> Result<()> {
    let mut seen = HashSet::with_capacity(chunks.len());
    for chunk in chunks {
        if !seen.insert(chunk.entry_id(repository)) {
            return Err(IndexError::DuplicateEntry {
                file_path: chunk.file_path.clone(),
                line_start: chunk.line_start,
            });
        }
    }
    Ok(())
}

fn to_entry(repository: &str, chunk: &CodeChunk, vector: Vec<f32>, document: String) -> IndexEntry {
    IndexEntry {
        id: chunk.entry_id(repository),
        vector,
        payload: EntryPayload {
            repository: repository.to_owned(),
            file_path: chunk.file_path.clone(),
            kind: chunk.kind.as_str().to_owned(),
            name: chunk.name.clone(),
            line_start: chunk.line_start,
            line_end: chunk.line_end,
        },
        document,
    }
}
