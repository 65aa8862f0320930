use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{IndexEntry, IndexStats, SearchResults};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Storage for `(id, vector, payload, document)` entries with cosine search.
///
/// Every mutation is durable once its future resolves `Ok`. Mutations on one index
/// are serialized; searches run against a consistent view and never observe a
/// half-applied mutation.
pub trait VectorIndex: Send + Sync {
    /// Insert or fully replace entries by id. Vectors are validated and normalized;
    /// one invalid entry rejects the whole batch. Returns the number of distinct
    /// ids written.
    fn upsert(&self, entries: Vec<IndexEntry>) -> BoxFuture<'_, Result<usize>>;

    /// Top `k` entries by cosine similarity, optionally restricted to one repository.
    fn search(
        &self,
        query: Vec<f32>,
        k: usize,
        repository: Option<String>,
    ) -> BoxFuture<'_, Result<SearchResults>>;

    /// Remove every entry tagged with `repository`. Returns the removed count.
    fn delete_by_repository(&self, repository: String) -> BoxFuture<'_, Result<usize>>;

    fn stats(&self) -> BoxFuture<'_, Result<IndexStats>>;

    /// Remove all entries and any durable artifacts.
    fn clear(&self) -> BoxFuture<'_, Result<()>>;

    /// Reject further operations. Idempotent.
    fn close(&self) -> BoxFuture<'_, Result<()>>;

    fn dimension(&self) -> usize;
}
