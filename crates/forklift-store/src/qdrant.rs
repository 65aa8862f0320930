//! Remote backend over a Qdrant collection.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, GetPointsBuilder, PointId, PointStruct,
    ScoredPoint, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder, point_id::PointIdOptions, vectors_config,
};

use crate::error::{Result, StoreError};
use crate::types::{
    EntryPayload, IndexEntry, IndexStats, SearchHit, SearchResults, dedup_last_wins, normalized,
};
use crate::vector_store::{BoxFuture, VectorIndex};

const REPOSITORY_FIELD: &str = "repository";
const SEQ_FIELD: &str = "seq";
const SCROLL_PAGE: u32 = 256;

type QdrantPayload = HashMap<String, qdrant_client::qdrant::Value>;

/// [`VectorIndex`] stored in a named Qdrant collection with cosine distance.
///
/// Each point carries a `seq` payload field assigned on first insert and kept on
/// re-upsert, used to order equal scores by insertion.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: usize,
    writer: tokio::sync::Mutex<()>,
    last_seq: AtomicI64,
    closed: AtomicBool,
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("collection", &self.collection)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

fn point_id_string(id: Option<PointId>) -> Option<String> {
    match id?.point_id_options? {
        PointIdOptions::Uuid(u) => Some(u),
        PointIdOptions::Num(n) => Some(n.to_string()),
    }
}

fn repository_filter(repository: &str) -> Filter {
    Filter::must([Condition::matches(
        REPOSITORY_FIELD,
        repository.to_owned(),
    )])
}

fn get_str(payload: &QdrantPayload, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(qdrant_client::qdrant::Value::as_str)
        .cloned()
}

fn get_int(payload: &QdrantPayload, key: &str) -> Option<i64> {
    payload
        .get(key)
        .and_then(qdrant_client::qdrant::Value::as_integer)
}

fn decode_payload(payload: &QdrantPayload) -> Option<EntryPayload> {
    Some(EntryPayload {
        repository: get_str(payload, REPOSITORY_FIELD)?,
        file_path: get_str(payload, "file_path")?,
        kind: get_str(payload, "kind")?,
        name: get_str(payload, "name")?,
        line_start: usize::try_from(get_int(payload, "line_start")?).ok()?,
        line_end: usize::try_from(get_int(payload, "line_end")?).ok()?,
    })
}

fn decode_hit(point: &ScoredPoint) -> Option<(SearchHit, i64)> {
    let payload = decode_payload(&point.payload)?;
    Some((
        SearchHit {
            id: point_id_string(point.id.clone())?,
            score: point.score.clamp(-1.0, 1.0),
            document: get_str(&point.payload, "document").unwrap_or_default(),
            payload,
        },
        get_int(&point.payload, SEQ_FIELD).unwrap_or(i64::MAX),
    ))
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_nanos()).ok())
        .unwrap_or(0)
}

impl QdrantIndex {
    /// Connect to `url` and ensure `collection` exists with the given dimension and a
    /// keyword index on the repository tag.
    ///
    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached, collection setup fails, or an
    /// existing collection has a different vector size.
    pub async fn open(url: &str, collection: &str, dimension: usize) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        let index = Self {
            client,
            collection: collection.to_owned(),
            dimension,
            writer: tokio::sync::Mutex::new(()),
            last_seq: AtomicI64::new(0),
            closed: AtomicBool::new(false),
        };
        index.ensure_collection().await?;
        tracing::info!(url, collection, dimension, "qdrant index opened");
        Ok(index)
    }

    async fn ensure_collection(&self) -> Result<()> {
        if self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(Box::new)?
        {
            return self.check_dimension().await;
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(Box::new)?;
        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(
                    &self.collection,
                    REPOSITORY_FIELD,
                    FieldType::Keyword,
                )
                .wait(true),
            )
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    async fn check_dimension(&self) -> Result<()> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(Box::new)?;
        let size = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                vectors_config::Config::Params(p) => Some(p.size),
                vectors_config::Config::ParamsMap(_) => None,
            });
        match size {
            Some(size) if size != self.dimension as u64 => Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                found: usize::try_from(size).unwrap_or(usize::MAX),
            }),
            _ => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn next_seq(&self) -> i64 {
        let now = now_nanos();
        let prev = self
            .last_seq
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(prev + 1)
    }

    /// Sequence numbers already assigned to any of `ids`.
    async fn existing_seqs(&self, ids: &[String]) -> Result<HashMap<String, i64>> {
        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.as_str())).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, point_ids)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(Box::new)?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|p| {
                let seq = get_int(&p.payload, SEQ_FIELD)?;
                Some((point_id_string(p.id)?, seq))
            })
            .collect())
    }

    async fn count(&self, filter: Option<Filter>) -> Result<usize> {
        let mut builder = CountPointsBuilder::new(&self.collection).exact(true);
        if let Some(f) = filter {
            builder = builder.filter(f);
        }
        let response = self.client.count(builder).await.map_err(Box::new)?;
        let count = response.result.map_or(0, |r| r.count);
        Ok(usize::try_from(count).unwrap_or(usize::MAX))
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

        let _guard = self.writer.lock().await;
        let ids: Vec<String> = batch.iter().map(|e| e.id.clone()).collect();
        let existing = self.existing_seqs(&ids).await?;

        let points = batch
            .into_iter()
            .map(|e| -> Result<PointStruct> {
                let seq = existing
                    .get(&e.id)
                    .copied()
                    .unwrap_or_else(|| self.next_seq());
                let payload: QdrantPayload = serde_json::from_value(serde_json::json!({
                    "repository": e.payload.repository,
                    "file_path": e.payload.file_path,
                    "kind": e.payload.kind,
                    "name": e.payload.name,
                    "line_start": e.payload.line_start,
                    "line_end": e.payload.line_end,
                    "document": e.document,
                    "seq": seq,
                }))?;
                Ok(PointStruct::new(e.id, e.vector, payload))
            })
            .collect::<Result<Vec<_>>>()?;
        let written = points.len();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(Box::new)?;
        tracing::debug!(collection = %self.collection, written, "qdrant upsert committed");
        Ok(written)
    }

    async fn search_inner(
        &self,
        query: Vec<f32>,
        k: usize,
        repository: Option<String>,
    ) -> Result<SearchResults> {
        self.ensure_open()?;
        let query = normalized(&query, self.dimension)?;
        if k == 0 {
            return Ok(SearchResults::default());
        }
        let mut builder = SearchPointsBuilder::new(&self.collection, query, k as u64)
            .with_payload(true);
        if let Some(repo) = repository.as_deref() {
            builder = builder.filter(repository_filter(repo));
        }
        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(Box::new)?;

        let mut hits: Vec<(SearchHit, i64)> =
            response.result.iter().filter_map(decode_hit).collect();
        hits.sort_by(|a, b| b.0.score.total_cmp(&a.0.score).then(a.1.cmp(&b.1)));
        Ok(hits.into_iter().map(|(hit, _)| hit).collect())
    }

    async fn delete_inner(&self, repository: String) -> Result<usize> {
        self.ensure_open()?;
        let _guard = self.writer.lock().await;
        let removed = self.count(Some(repository_filter(&repository))).await?;
        if removed == 0 {
            return Ok(0);
        }
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(repository_filter(&repository))
                    .wait(true),
            )
            .await
            .map_err(Box::new)?;
        tracing::info!(
            collection = %self.collection,
            repository = %repository,
            removed,
            "repository removed from qdrant"
        );
        Ok(removed)
    }

    async fn repositories(&self) -> Result<BTreeSet<String>> {
        let mut repositories = BTreeSet::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .with_payload(true)
                .with_vectors(false)
                .limit(SCROLL_PAGE);
            if let Some(off) = offset.take() {
                builder = builder.offset(off);
            }
            let response = self.client.scroll(builder).await.map_err(Box::new)?;
            repositories.extend(
                response
                    .result
                    .iter()
                    .filter_map(|p| get_str(&p.payload, REPOSITORY_FIELD)),
            );
            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(repositories)
    }

    async fn stats_inner(&self) -> Result<IndexStats> {
        self.ensure_open()?;
        let _guard = self.writer.lock().await;
        Ok(IndexStats {
            total_entries: self.count(None).await?,
            dimension: self.dimension,
            repositories: self.repositories().await?,
        })
    }

    async fn clear_inner(&self) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.writer.lock().await;
        if self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(Box::new)?
        {
            self.client
                .delete_collection(&self.collection)
                .await
                .map_err(Box::new)?;
        }
        self.ensure_collection().await?;
        tracing::info!(collection = %self.collection, "qdrant collection cleared");
        Ok(())
    }
}

impl VectorIndex for QdrantIndex {
    fn upsert(&self, entries: Vec<IndexEntry>) -> BoxFuture<'_, Result<usize>> {
        Box::pin(self.upsert_inner(entries))
    }

    fn search(
        &self,
        query: Vec<f32>,
        k: usize,
        repository: Option<String>,
    ) -> BoxFuture<'_, Result<SearchResults>> {
        Box::pin(self.search_inner(query, k, repository))
    }

    fn delete_by_repository(&self, repository: String) -> BoxFuture<'_, Result<usize>> {
        Box::pin(self.delete_inner(repository))
    }

    fn stats(&self) -> BoxFuture<'_, Result<IndexStats>> {
        Box::pin(self.stats_inner())
    }

    fn clear(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.clear_inner())
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let _guard = self.writer.lock().await;
            self.closed.store(true, Ordering::Release);
            Ok(())
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
