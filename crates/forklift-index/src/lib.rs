//! Code chunking and the repository indexing pipeline.
//!
//! Source files are split into semantically bounded chunks (tree-sitter where a
//! grammar exists, signature heuristics for other brace languages, fixed-size
//! line windows otherwise), rendered into embedding text, embedded in batches,
//! and written to a [`forklift_store::VectorIndex`] in a single upsert.

pub mod chunker;
pub mod context;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod source;

pub use chunker::{ChunkKind, ChunkerConfig, CodeChunk, chunk_file};
pub use error::{IndexError, Result};
pub use indexer::{CodeIndexer, IndexReport, IndexerConfig};
pub use source::{
    FetchedFiles, LocalSource, SkippedFile, SourceFile, SourceProvider, StaticSource,
    repository_tag,
};
