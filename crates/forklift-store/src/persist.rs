//! On-disk layout of the flat index.
//!
//! ```text
//! <root>/LOCK                 exclusive lock held by the writing process
//! <root>/CURRENT              name of the published generation
//! <root>/gen-000042/vectors.bin
//! <root>/gen-000042/metadata.json
//! <root>/gen-000042/documents.json
//! ```
//!
//! A generation is written and fsynced completely before `CURRENT` is atomically
//! replaced, so a crash leaves either the old or the new generation published.
//! Unpublished generation directories are orphans and are removed on open.
//! Every reader of the disk state and every writer holds the `LOCK` file
//! exclusively, so processes sharing one root never interleave generations.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::{PersistContext, Result, StoreError};
use crate::types::{EntryPayload, IndexEntry};

const LOCK_FILE: &str = "LOCK";
const CURRENT_FILE: &str = "CURRENT";
const CURRENT_TMP_FILE: &str = "CURRENT.tmp";
const GENERATION_PREFIX: &str = "gen-";
const VECTORS_FILE: &str = "vectors.bin";
const METADATA_FILE: &str = "metadata.json";
const DOCUMENTS_FILE: &str = "documents.json";

const MAGIC: &[u8; 4] = b"FKVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Serialize)]
struct MetadataRef<'a> {
    id: &'a str,
    #[serde(flatten)]
    payload: &'a EntryPayload,
}

#[derive(Deserialize)]
struct MetadataRecord {
    id: String,
    #[serde(flatten)]
    payload: EntryPayload,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    id: &'a str,
    document: &'a str,
}

#[derive(Deserialize)]
struct DocumentRecord {
    id: String,
    document: String,
}

/// Exclusive advisory lock on `<root>/LOCK`, released on drop.
pub(crate) struct RootLock {
    file: fs::File,
}

impl RootLock {
    /// Block until the lock on `root` is held, creating `root` if needed.
    pub(crate) fn acquire(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).at(root)?;
        let path = root.join(LOCK_FILE);
        let file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .at(&path)?;
        file.lock_exclusive().at(&path)?;
        Ok(Self { file })
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Generation named by `CURRENT`, if one is published.
pub(crate) fn published_generation(root: &Path) -> Option<u64> {
    fs::read_to_string(root.join(CURRENT_FILE))
        .ok()
        .and_then(|s| parse_generation(s.trim()))
}

pub(crate) struct Loaded {
    pub generation: u64,
    pub entries: Vec<IndexEntry>,
}

fn generation_dir_name(generation: u64) -> String {
    format!("{GENERATION_PREFIX}{generation:06}")
}

fn parse_generation(name: &str) -> Option<u64> {
    name.strip_prefix(GENERATION_PREFIX)?.parse().ok()
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).at(path)?;
    file.write_all(bytes).at(path)?;
    file.sync_all().at(path)
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<()> {
    fs::File::open(path).and_then(|d| d.sync_all()).at(path)
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn sync_dir(_path: &Path) -> Result<()> {
    Ok(())
}

fn encode_vectors(dimension: usize, entries: &[Arc<IndexEntry>]) -> Result<Vec<u8>> {
    let dim = u32::try_from(dimension)
        .map_err(|_| StoreError::Corrupt(format!("dimension {dimension} exceeds u32")))?;
    let mut buf = Vec::with_capacity(HEADER_LEN + entries.len() * dimension * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&dim.to_le_bytes());
    buf.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for entry in entries {
        for x in &entry.vector {
            buf.extend_from_slice(&x.to_le_bytes());
        }
    }
    Ok(buf)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(arr)
}

fn decode_vectors(bytes: &[u8], dimension: usize) -> Result<Vec<Vec<f32>>> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(StoreError::Corrupt("vectors.bin has no valid header".into()));
    }
    let version = read_u32(bytes, 4);
    if version != FORMAT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported vectors.bin version {version}"
        )));
    }
    let found = read_u32(bytes, 8) as usize;
    if found != dimension {
        return Err(StoreError::DimensionMismatch {
            expected: dimension,
            found,
        });
    }
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[12..20]);
    let count = usize::try_from(u64::from_le_bytes(count_bytes))
        .map_err(|_| StoreError::Corrupt("vector count overflows usize".into()))?;

    let body = &bytes[HEADER_LEN..];
    if body.len() != count * dimension * 4 {
        return Err(StoreError::Corrupt(format!(
            "vectors.bin holds {} bytes, expected {count} vectors of dimension {dimension}",
            body.len()
        )));
    }
    if dimension == 0 {
        return Ok(vec![Vec::new(); count]);
    }
    Ok(body
        .chunks_exact(dimension * 4)
        .map(|row| {
            row.chunks_exact(4)
                .map(|c| {
                    let mut arr = [0u8; 4];
                    arr.copy_from_slice(c);
                    f32::from_le_bytes(arr)
                })
                .collect()
        })
        .collect())
}

/// Write `entries` as generation `generation` and publish it.
pub(crate) fn write_generation(
    root: &Path,
    generation: u64,
    dimension: usize,
    entries: &[Arc<IndexEntry>],
) -> Result<()> {
    fs::create_dir_all(root).at(root)?;
    let name = generation_dir_name(generation);
    let dir = root.join(&name);
    if dir.exists() {
        fs::remove_dir_all(&dir).at(&dir)?;
    }
    fs::create_dir(&dir).at(&dir)?;

    write_synced(&dir.join(VECTORS_FILE), &encode_vectors(dimension, entries)?)?;

    let metadata: Vec<MetadataRef<'_>> = entries
        .iter()
        .map(|e| MetadataRef {
            id: &e.id,
            payload: &e.payload,
        })
        .collect();
    write_synced(&dir.join(METADATA_FILE), &serde_json::to_vec(&metadata)?)?;

    let documents: Vec<DocumentRef<'_>> = entries
        .iter()
        .map(|e| DocumentRef {
            id: &e.id,
            document: &e.document,
        })
        .collect();
    write_synced(&dir.join(DOCUMENTS_FILE), &serde_json::to_vec(&documents)?)?;
    sync_dir(&dir)?;

    let tmp = root.join(CURRENT_TMP_FILE);
    write_synced(&tmp, format!("{name}\n").as_bytes())?;
    let current = root.join(CURRENT_FILE);
    fs::rename(&tmp, &current).at(&current)?;
    sync_dir(root)?;

    remove_stale_generations(root, Some(generation));
    tracing::debug!(generation, entries = entries.len(), "flat index generation published");
    Ok(())
}

/// Load the published generation, if any, and drop unpublished leftovers.
pub(crate) fn load(root: &Path, dimension: usize) -> Result<Option<Loaded>> {
    let current = root.join(CURRENT_FILE);
    let name = match fs::read_to_string(&current) {
        Ok(s) => s.trim().to_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            remove_stale_generations(root, None);
            return Ok(None);
        }
        Err(e) => return Err(StoreError::Persist { path: current, source: e }),
    };
    let generation = parse_generation(&name)
        .ok_or_else(|| StoreError::Corrupt(format!("CURRENT names unknown generation {name:?}")))?;
    let dir = root.join(&name);

    let vectors_path = dir.join(VECTORS_FILE);
    let vectors = decode_vectors(&fs::read(&vectors_path).at(&vectors_path)?, dimension)?;
    let metadata_path = dir.join(METADATA_FILE);
    let metadata: Vec<MetadataRecord> =
        serde_json::from_slice(&fs::read(&metadata_path).at(&metadata_path)?)?;
    let documents_path = dir.join(DOCUMENTS_FILE);
    let documents: Vec<DocumentRecord> =
        serde_json::from_slice(&fs::read(&documents_path).at(&documents_path)?)?;

    if vectors.len() != metadata.len() || metadata.len() != documents.len() {
        return Err(StoreError::Corrupt(format!(
            "generation {name} holds {} vectors, {} metadata records, {} documents",
            vectors.len(),
            metadata.len(),
            documents.len()
        )));
    }

    let mut entries = Vec::with_capacity(vectors.len());
    for ((vector, meta), doc) in vectors.into_iter().zip(metadata).zip(documents) {
        if meta.id != doc.id {
            return Err(StoreError::Corrupt(format!(
                "metadata id {} does not match document id {}",
                meta.id, doc.id
            )));
        }
        entries.push(IndexEntry {
            id: meta.id,
            vector,
            payload: meta.payload,
            document: doc.document,
        });
    }

    remove_stale_generations(root, Some(generation));
    Ok(Some(Loaded {
        generation,
        entries,
    }))
}

/// Unpublish the current generation, then remove every generation directory
/// under `root`.
///
/// Once `CURRENT` is gone the index is empty on disk; directories that cannot
/// be removed afterwards are orphans and only logged.
pub(crate) fn remove_all(root: &Path) -> Result<()> {
    let current = root.join(CURRENT_FILE);
    match fs::remove_file(&current) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(StoreError::Persist { path: current, source: e }),
    }
    if root.exists() {
        sync_dir(root)?;
    }
    remove_stale_generations(root, None);
    Ok(())
}

fn generation_dirs(root: &Path) -> Vec<PathBuf> {
    let Ok(read) = fs::read_dir(root) else {
        return Vec::new();
    };
    read.filter_map(std::result::Result::ok)
        .filter(|e| {
            e.file_name()
                .to_str()
                .and_then(parse_generation)
                .is_some()
        })
        .map(|e| e.path())
        .collect()
}

fn remove_stale_generations(root: &Path, keep: Option<u64>) {
    let _ = fs::remove_file(root.join(CURRENT_TMP_FILE));
    for dir in generation_dirs(root) {
        let generation = dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_generation);
        if generation.is_some() && generation == keep {
            continue;
        }
        if let Err(e) = fs::remove_dir_all(&dir) {
            tracing::warn!(path = %dir.display(), "failed to remove stale generation: {e}");
        } else {
            tracing::debug!(path = %dir.display(), "removed stale generation");
        }
    }
}
