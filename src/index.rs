//! The knowledge index: embedded records plus nearest-neighbor search,
//! persisted as a pair of on-disk artifacts.
//!
//! The persisted form is two files in the store directory:
//!
//! | File | Contents |
//! |------|----------|
//! | `index.bin` | `count: u32 LE`, `dims: u32 LE`, then `count × dims` little-endian `f32` components |
//! | `records.json` | embedding model name, dimensionality, build timestamp, and the record payloads |
//!
//! A persisted index is valid only when **both** files exist and agree;
//! partial presence or a decode mismatch is treated as "not found" (the
//! orchestrator then rebuilds) rather than a crash. Building and persisting
//! are one logical operation: `build` never returns success with an
//! in-memory index that has no durable counterpart.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedding::{bytes_to_vec, cosine_similarity, vec_to_bytes, Embedder};
use crate::error::KbError;
use crate::models::{IndexInfo, IndexedRecord};

const VECTORS_FILE: &str = "index.bin";
const RECORDS_FILE: &str = "records.json";

/// The payload artifact: everything except the raw vectors.
#[derive(Serialize, Deserialize)]
struct PayloadManifest {
    model: String,
    dims: usize,
    built_at: i64,
    records: Vec<IndexedRecord>,
}

struct IndexEntry {
    vector: Vec<f32>,
    record: IndexedRecord,
}

/// Vector similarity index over [`IndexedRecord`]s.
///
/// Lifecycle: absent → built (from a batch of records) → persisted →
/// loaded → queried → deleted. Queries are read-only; rebuilds go through
/// `delete` + `build`.
pub struct KnowledgeIndex {
    store_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    embed_batch_size: usize,
    entries: Option<Vec<IndexEntry>>,
}

impl KnowledgeIndex {
    pub fn new(store_dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>, embed_batch_size: usize) -> Self {
        Self {
            store_dir: store_dir.into(),
            embedder,
            embed_batch_size,
            entries: None,
        }
    }

    fn vectors_path(&self) -> PathBuf {
        self.store_dir.join(VECTORS_FILE)
    }

    fn records_path(&self) -> PathBuf {
        self.store_dir.join(RECORDS_FILE)
    }

    /// Embed every record's composite text (batched), construct the index,
    /// and persist both artifacts before returning.
    ///
    /// Fails with [`KbError::EmptyCorpus`] when `records` is empty.
    pub async fn build(&mut self, records: Vec<IndexedRecord>) -> Result<(), KbError> {
        if records.is_empty() {
            return Err(KbError::EmptyCorpus);
        }

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(records.len());
        for batch in records.chunks(self.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            vectors.extend(self.embedder.embed(&texts).await?);
        }

        if vectors.len() != records.len() {
            return Err(KbError::Embedding(format!(
                "expected {} vectors, got {}",
                records.len(),
                vectors.len()
            )));
        }

        let entries: Vec<IndexEntry> = vectors
            .into_iter()
            .zip(records)
            .map(|(vector, record)| IndexEntry { vector, record })
            .collect();

        self.persist(&entries)?;
        info!(
            records = entries.len(),
            dir = %self.store_dir.display(),
            "knowledge index built and persisted"
        );
        self.entries = Some(entries);
        Ok(())
    }

    fn persist(&self, entries: &[IndexEntry]) -> Result<(), KbError> {
        std::fs::create_dir_all(&self.store_dir)?;

        let dims = self.embedder.dims();
        let mut vector_bytes = Vec::with_capacity(8 + entries.len() * dims * 4);
        vector_bytes.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        vector_bytes.extend_from_slice(&(dims as u32).to_le_bytes());
        for entry in entries {
            vector_bytes.extend_from_slice(&vec_to_bytes(&entry.vector));
        }
        std::fs::write(self.vectors_path(), vector_bytes)?;

        let manifest = PayloadManifest {
            model: self.embedder.model_name().to_string(),
            dims,
            built_at: chrono::Utc::now().timestamp(),
            records: entries.iter().map(|e| e.record.clone()).collect(),
        };
        std::fs::write(self.records_path(), serde_json::to_vec_pretty(&manifest)?)?;

        Ok(())
    }

    /// Load a previously persisted index.
    ///
    /// Returns `false` (not an error) when either artifact is missing or the
    /// pair does not decode consistently; the caller then builds fresh.
    pub fn load(&mut self) -> Result<bool, KbError> {
        let vectors_path = self.vectors_path();
        let records_path = self.records_path();

        if !vectors_path.exists() || !records_path.exists() {
            return Ok(false);
        }

        let manifest: PayloadManifest = match serde_json::from_slice(&std::fs::read(&records_path)?) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "record payload artifact is unreadable, treating store as absent");
                return Ok(false);
            }
        };

        let entries = match decode_vectors(&std::fs::read(&vectors_path)?, &manifest) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "vector artifact does not match payloads, treating store as absent");
                return Ok(false);
            }
        };

        info!(
            records = entries.len(),
            dir = %self.store_dir.display(),
            "knowledge index loaded"
        );
        self.entries = Some(entries);
        Ok(true)
    }

    /// Top-`k` records by descending cosine similarity to the query.
    ///
    /// Fails with [`KbError::NotInitialized`] before a successful `build`
    /// or `load`. Returns at most `k` `(record, score)` pairs.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<(IndexedRecord, f32)>, KbError> {
        let entries = self.entries.as_ref().ok_or(KbError::NotInitialized)?;

        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KbError::Embedding("empty embedding response".into()))?;

        let mut scored: Vec<(IndexedRecord, f32)> = entries
            .iter()
            .map(|entry| {
                (
                    entry.record.clone(),
                    cosine_similarity(&query_vec, &entry.vector),
                )
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// Remove both on-disk artifacts and clear the in-memory index.
    /// Idempotent: absent artifacts are not an error.
    pub fn delete(&mut self) -> Result<(), KbError> {
        remove_if_present(&self.vectors_path())?;
        remove_if_present(&self.records_path())?;
        self.entries = None;
        info!(dir = %self.store_dir.display(), "knowledge index deleted");
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.is_some()
    }

    pub fn info(&self) -> IndexInfo {
        IndexInfo {
            is_loaded: self.is_loaded(),
            record_count: self.entries.as_ref().map_or(0, Vec::len),
            store_dir: self.store_dir.display().to_string(),
        }
    }
}

fn remove_if_present(path: &Path) -> Result<(), KbError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Decode the vector artifact and pair it with the manifest's records.
/// Any disagreement (count, dims, byte length) fails; the caller downgrades
/// the failure to "store absent".
fn decode_vectors(bytes: &[u8], manifest: &PayloadManifest) -> Result<Vec<IndexEntry>, KbError> {
    if bytes.len() < 8 {
        return Err(KbError::InvalidIndex(
            "vector artifact shorter than its header".into(),
        ));
    }

    let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let dims = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

    if count != manifest.records.len() {
        return Err(KbError::InvalidIndex(format!(
            "vector count {} != record count {}",
            count,
            manifest.records.len()
        )));
    }
    if dims != manifest.dims {
        return Err(KbError::InvalidIndex(format!(
            "vector dims {} != manifest dims {}",
            dims, manifest.dims
        )));
    }
    // header values come from disk, so the length math must not overflow
    let expected_len = count
        .checked_mul(dims)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(8));
    if expected_len != Some(bytes.len()) {
        return Err(KbError::InvalidIndex(format!(
            "vector artifact has unexpected length {}",
            bytes.len()
        )));
    }

    let entries = manifest
        .records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let start = 8 + i * dims * 4;
            IndexEntry {
                vector: bytes_to_vec(&bytes[start..start + dims * 4]),
                record: record.clone(),
            }
        })
        .collect();

    Ok(entries)
}
