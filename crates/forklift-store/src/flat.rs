use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Result, StoreError};
use crate::persist;
use crate::types::{
    IndexEntry, IndexStats, SearchHit, SearchResults, dedup_last_wins, dot, normalized,
};
use crate::vector_store::{BoxFuture, VectorIndex};

/// Immutable view of the index. Mutations build a new snapshot and swap it in.
#[derive(Default)]
struct Snapshot {
    entries: Vec<Arc<IndexEntry>>,
    positions: HashMap<String, usize>,
    generation: u64,
}

impl Snapshot {
    fn from_entries(entries: Vec<Arc<IndexEntry>>, generation: u64) -> Self {
        let positions = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        Self {
            entries,
            positions,
            generation,
        }
    }
}

/// Exact cosine search over an in-process entry list, optionally persisted under
/// a root directory.
pub struct FlatIndex {
    dimension: usize,
    root: Option<PathBuf>,
    snapshot: RwLock<Arc<Snapshot>>,
    writer: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl std::fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatIndex")
            .field("dimension", &self.dimension)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FlatIndex {
    /// Non-durable index, for tests and one-shot runs.
    #[must_use]
    pub fn in_memory(dimension: usize) -> Self {
        Self {
            dimension,
            root: None,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            writer: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Open (or create) a durable index under `root`, resuming from the last
    /// published generation.
    ///
    /// Several handles, in this or other processes, may share one root: each
    /// mutation takes the root's file lock and applies on top of the latest
    /// published generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the published artifacts cannot be read, disagree with each
    /// other, or were written with a different dimension.
    pub async fn open(root: impl Into<PathBuf>, dimension: usize) -> Result<Self> {
        let root = root.into();
        let load_root = root.clone();
        let snapshot = tokio::task::spawn_blocking(move || {
            let _lock = persist::RootLock::acquire(&load_root)?;
            load_snapshot(&load_root, dimension)
        })
        .await??;
        tracing::info!(
            root = %root.display(),
            entries = snapshot.entries.len(),
            generation = snapshot.generation,
            "flat index opened"
        );

        Ok(Self {
            dimension,
            root: Some(root),
            snapshot: RwLock::new(Arc::new(snapshot)),
            writer: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, next: Arc<Snapshot>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Apply `change` to the latest state and make the result visible.
    ///
    /// `change` returns the next snapshot (or `None` for no change) and a value
    /// for the caller. Durable indexes run it under the root lock, after
    /// catching up with generations published by other handles, and flush the
    /// next snapshot before it becomes visible.
    async fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Snapshot) -> (Option<Snapshot>, T) + Send + 'static,
    {
        let _guard = self.writer.lock().await;
        let current = self.current();
        let Some(root) = self.root.clone() else {
            let (next, value) = change(&current);
            if let Some(next) = next {
                self.publish(Arc::new(next));
            }
            return Ok(value);
        };

        let dimension = self.dimension;
        let (visible, value) = tokio::task::spawn_blocking(move || -> Result<_> {
            let _lock = persist::RootLock::acquire(&root)?;
            let latest = if persist::published_generation(&root) == Some(current.generation) {
                current
            } else {
                let refreshed = Arc::new(load_snapshot(&root, dimension)?);
                tracing::debug!(
                    generation = refreshed.generation,
                    "flat index caught up with published generation"
                );
                refreshed
            };
            let (next, value) = change(&latest);
            let visible = match next {
                Some(next) => {
                    persist::write_generation(&root, next.generation, dimension, &next.entries)?;
                    Arc::new(next)
                }
                None => latest,
            };
            Ok((visible, value))
        })
        .await??;
        self.publish(visible);
        Ok(value)
    }

    async fn upsert_inner(&self, entries: Vec<IndexEntry>) -> Result<usize> {
        self.ensure_open()?;
        let mut batch = dedup_last_wins(entries);
        for entry in &mut batch {
            entry.vector = normalized(&entry.vector, self.dimension).map_err(|e| {
                StoreError::InvalidVector(format!("entry {}: {e}", entry.id))
            })?;
        }
        if batch.is_empty() {
            return Ok(0);
        }

        let written = self
            .mutate(move |current| {
                let mut entries = current.entries.clone();
                let mut positions = current.positions.clone();
                let written = batch.len();
                for entry in batch {
                    let entry = Arc::new(entry);
                    if let Some(&pos) = positions.get(&entry.id) {
                        entries[pos] = entry;
                    } else {
                        positions.insert(entry.id.clone(), entries.len());
                        entries.push(entry);
                    }
                }
                let next = Snapshot {
                    entries,
                    positions,
                    generation: current.generation + 1,
                };
                (Some(next), written)
            })
            .await?;
        tracing::debug!(written, "flat index upsert committed");
        Ok(written)
    }

    fn search_inner(
        &self,
        query: &[f32],
        k: usize,
        repository: Option<&str>,
    ) -> Result<SearchResults> {
        self.ensure_open()?;
        let query = normalized(query, self.dimension)?;
        if k == 0 {
            return Ok(SearchResults::default());
        }
        let snapshot = self.current();

        let mut scored: Vec<(f32, usize)> = snapshot
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| repository.is_none_or(|r| e.payload.repository == r))
            .map(|(i, e)| (dot(&query, &e.vector), i))
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, i)| {
                let e = &snapshot.entries[i];
                SearchHit {
                    id: e.id.clone(),
                    score: score.clamp(-1.0, 1.0),
                    document: e.document.clone(),
                    payload: e.payload.clone(),
                }
            })
            .collect())
    }

    async fn delete_inner(&self, repository: String) -> Result<usize> {
        self.ensure_open()?;
        let target = repository.clone();
        let removed = self
            .mutate(move |current| {
                let survivors: Vec<Arc<IndexEntry>> = current
                    .entries
                    .iter()
                    .filter(|e| e.payload.repository != target)
                    .cloned()
                    .collect();
                let removed = current.entries.len() - survivors.len();
                if removed == 0 {
                    return (None, 0);
                }
                let next = Snapshot::from_entries(survivors, current.generation + 1);
                (Some(next), removed)
            })
            .await?;
        if removed > 0 {
            tracing::info!(repository, removed, "repository removed from flat index");
        }
        Ok(removed)
    }

    fn stats_inner(&self) -> Result<IndexStats> {
        self.ensure_open()?;
        let snapshot = self.current();
        let repositories: BTreeSet<String> = snapshot
            .entries
            .iter()
            .map(|e| e.payload.repository.clone())
            .collect();
        Ok(IndexStats {
            total_entries: snapshot.entries.len(),
            dimension: self.dimension,
            repositories,
        })
    }

    async fn clear_inner(&self) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.writer.lock().await;
        if let Some(root) = &self.root {
            let root = root.clone();
            tokio::task::spawn_blocking(move || {
                let _lock = persist::RootLock::acquire(&root)?;
                persist::remove_all(&root)
            })
            .await??;
        }
        self.publish(Arc::new(Snapshot::default()));
        tracing::info!("flat index cleared");
        Ok(())
    }
}

/// Snapshot of the generation published under `root`; empty when none is.
/// Callers hold the root lock.
fn load_snapshot(root: &Path, dimension: usize) -> Result<Snapshot> {
    Ok(match persist::load(root, dimension)? {
        Some(l) => Snapshot::from_entries(
            l.entries.into_iter().map(Arc::new).collect(),
            l.generation,
        ),
        None => Snapshot::default(),
    })
}

impl VectorIndex for FlatIndex {
    fn upsert(&self, entries: Vec<IndexEntry>) -> BoxFuture<'_, Result<usize>> {
        Box::pin(self.upsert_inner(entries))
    }

    fn search(
        &self,
        query: Vec<f32>,
        k: usize,
        repository: Option<String>,
    ) -> BoxFuture<'_, Result<SearchResults>> {
        Box::pin(async move { self.search_inner(&query, k, repository.as_deref()) })
    }

    fn delete_by_repository(&self, repository: String) -> BoxFuture<'_, Result<usize>> {
        Box::pin(self.delete_inner(repository))
    }

    fn stats(&self) -> BoxFuture<'_, Result<IndexStats>> {
        Box::pin(async move { self.stats_inner() })
    }

    fn clear(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.clear_inner())
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            // Wait out an in-flight mutation so it is fully flushed before closing.
            let _guard = self.writer.lock().await;
            self.closed.store(true, Ordering::Release);
            Ok(())
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryPayload;

    fn entry(id: &str, repo: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.into(),
            vector,
            payload: EntryPayload {
                repository: repo.into(),
                file_path: format!("{id}.py"),
                kind: "function".into(),
                name: id.into(),
                line_start: 1,
                line_end: 2,
            },
            document: format!("document {id}"),
        }
    }

    #[tokio::test]
    async fn upsert_normalizes_vectors() {
        let index = FlatIndex::in_memory(2);
        index
            .upsert(vec![entry("a", "r", vec![3.0, 4.0])])
            .await
            .unwrap();
        let snap = index.current();
        let v = &snap.entries[0].vector;
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn invalid_entry_rejects_whole_batch() {
        let index = FlatIndex::in_memory(2);
        let err = index
            .upsert(vec![
                entry("a", "r", vec![1.0, 0.0]),
                entry("b", "r", vec![0.0, 0.0]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidVector(_)));
        assert_eq!(index.stats().await.unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn reupsert_replaces_in_place() {
        let index = FlatIndex::in_memory(2);
        index
            .upsert(vec![
                entry("a", "r", vec![1.0, 0.0]),
                entry("b", "r", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        let mut replacement = entry("a", "r", vec![1.0, 0.0]);
        replacement.document = "updated".into();
        assert_eq!(index.upsert(vec![replacement]).await.unwrap(), 1);

        let results = index
            .search(vec![1.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(results.ids, vec!["a", "b"]);
        assert_eq!(results.documents[0], "updated");
        assert_eq!(index.stats().await.unwrap().total_entries, 2);
    }

    #[tokio::test]
    async fn duplicate_ids_in_batch_count_once() {
        let index = FlatIndex::in_memory(2);
        let written = index
            .upsert(vec![
                entry("a", "r", vec![1.0, 0.0]),
                entry("a", "r", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        assert_eq!(written, 1);
        let results = index.search(vec![0.0, 1.0], 1, None).await.unwrap();
        assert!((results.scores[0] - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_ties_follow_insertion_order() {
        let index = FlatIndex::in_memory(2);
        index
            .upsert(vec![
                entry("first", "r", vec![1.0, 1.0]),
                entry("second", "r", vec![2.0, 2.0]),
                entry("third", "r", vec![0.5, 0.5]),
            ])
            .await
            .unwrap();
        let results = index.search(vec![1.0, 1.0], 3, None).await.unwrap();
        assert_eq!(results.ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn search_rejects_invalid_query() {
        let index = FlatIndex::in_memory(2);
        assert!(matches!(
            index.search(vec![0.0, 0.0], 5, None).await,
            Err(StoreError::InvalidVector(_))
        ));
        assert!(matches!(
            index.search(vec![1.0], 5, None).await,
            Err(StoreError::InvalidVector(_))
        ));
    }

    #[tokio::test]
    async fn search_k_zero_is_empty() {
        let index = FlatIndex::in_memory(2);
        index
            .upsert(vec![entry("a", "r", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert!(index.search(vec![1.0, 0.0], 0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_repository_is_noop() {
        let index = FlatIndex::in_memory(2);
        index
            .upsert(vec![entry("a", "r", vec![1.0, 0.0])])
            .await
            .unwrap();
        let generation = index.current().generation;
        assert_eq!(index.delete_by_repository("other".into()).await.unwrap(), 0);
        assert_eq!(index.current().generation, generation);
    }

    #[tokio::test]
    async fn closed_index_rejects_operations() {
        let index = FlatIndex::in_memory(2);
        index.close().await.unwrap();
        index.close().await.unwrap();
        assert!(matches!(
            index.upsert(vec![entry("a", "r", vec![1.0, 0.0])]).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(index.stats().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn stats_lists_repositories() {
        let index = FlatIndex::in_memory(2);
        index
            .upsert(vec![
                entry("a", "alpha", vec![1.0, 0.0]),
                entry("b", "beta", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        let stats = index.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.dimension, 2);
        assert_eq!(
            stats.repositories.into_iter().collect::<Vec<_>>(),
            vec!["alpha", "beta"]
        );
    }
}
