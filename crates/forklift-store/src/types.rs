use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Namespace for chunk entry ids; ids are `UUIDv5(namespace, tag \0 path \0 line_start)`.
const ENTRY_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x6f, 0x2c, 0x91, 0x4e, 0x3a, 0xd7, 0x5b, 0x08, 0x9e, 0x41, 0xc5, 0x12, 0x7d, 0xa0, 0x33, 0xf6,
]);

/// Deterministic entry id for a chunk starting at `line_start` of `file_path`
/// within the repository identified by `repository`.
#[must_use]
pub fn entry_id(repository: &str, file_path: &str, line_start: usize) -> String {
    let key = format!("{repository}\0{file_path}\0{line_start}");
    uuid::Uuid::new_v5(&ENTRY_NAMESPACE, key.as_bytes()).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPayload {
    pub repository: String,
    pub file_path: String,
    pub kind: String,
    pub name: String,
    pub line_start: usize,
    pub line_end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: EntryPayload,
    pub document: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub document: String,
    pub payload: EntryPayload,
}

/// Query results as parallel arrays, best match first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub ids: Vec<String>,
    pub scores: Vec<f32>,
    pub documents: Vec<String>,
    pub payloads: Vec<EntryPayload>,
}

impl SearchResults {
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate results row-wise.
    pub fn hits(&self) -> impl Iterator<Item = (&str, f32, &str, &EntryPayload)> {
        self.ids
            .iter()
            .zip(&self.scores)
            .zip(&self.documents)
            .zip(&self.payloads)
            .map(|(((id, score), doc), payload)| (id.as_str(), *score, doc.as_str(), payload))
    }
}

impl FromIterator<SearchHit> for SearchResults {
    fn from_iter<I: IntoIterator<Item = SearchHit>>(iter: I) -> Self {
        let mut out = Self::default();
        for hit in iter {
            out.ids.push(hit.id);
            out.scores.push(hit.score);
            out.documents.push(hit.document);
            out.payloads.push(hit.payload);
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub total_entries: usize,
    pub dimension: usize,
    pub repositories: BTreeSet<String>,
}

/// Validate `vector` against `dimension` and scale it to unit L2 norm.
///
/// # Errors
///
/// Returns [`StoreError::InvalidVector`] for a wrong length, a non-finite component,
/// or a zero norm.
#[allow(clippy::cast_possible_truncation)]
pub fn normalized(vector: &[f32], dimension: usize) -> Result<Vec<f32>> {
    if vector.len() != dimension {
        return Err(StoreError::InvalidVector(format!(
            "expected dimension {dimension}, got {}",
            vector.len()
        )));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(StoreError::InvalidVector(
            "vector contains non-finite values".into(),
        ));
    }
    let norm = vector
        .iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(StoreError::InvalidVector("vector has zero norm".into()));
    }
    Ok(vector
        .iter()
        .map(|x| (f64::from(*x) / norm) as f32)
        .collect())
}

/// Dot product of two equal-length vectors; cosine similarity for unit vectors.
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Collapse a batch so each id appears once, keeping the last occurrence's data
/// at the position of its first occurrence.
pub(crate) fn dedup_last_wins(entries: Vec<IndexEntry>) -> Vec<IndexEntry> {
    let mut positions = std::collections::HashMap::with_capacity(entries.len());
    let mut out: Vec<IndexEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(&pos) = positions.get(&entry.id) {
            out[pos] = entry;
        } else {
            positions.insert(entry.id.clone(), out.len());
            out.push(entry);
        }
    }
    out
}
