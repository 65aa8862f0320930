//! Durable vector index for code chunk embeddings.
//!
//! [`VectorIndex`] is the single seam the indexing pipeline writes through. Two
//! backends implement it: [`FlatIndex`], an embedded exact-search index persisted
//! as generation directories on disk, and [`QdrantIndex`], a remote collection.

pub mod error;
pub mod flat;
mod persist;
pub mod qdrant;
pub mod types;
pub mod vector_store;

pub use error::StoreError;
pub use flat::FlatIndex;
pub use qdrant::QdrantIndex;
pub use types::{EntryPayload, IndexEntry, IndexStats, SearchHit, SearchResults, entry_id};
pub use vector_store::{BoxFuture, VectorIndex};
