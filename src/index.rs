//! In-memory vector index over embedded chunks.
//!
//! A [`VectorIndex`] is an ordered list of `(Chunk, vector)` pairs searched by
//! brute-force cosine distance. It is built wholesale from a chunk sequence
//! ([`build`]), persisted as a single JSON file ([`VectorIndex::save`]), and
//! shared between request handlers through an [`IndexHandle`].
//!
//! There is no incremental update: a changed document directory means a new
//! index, swapped in whole.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::PipelineError;
use crate::models::{Chunk, ScoredChunk};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    pub model: String,
    pub dims: usize,
    /// SHA-256 over chunk source paths, offsets and texts, in index order.
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Assemble an index from chunks and their vectors.
    ///
    /// Fails when the counts differ or the vectors do not all share one
    /// dimensionality.
    pub fn from_parts(model: &str, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            bail!(
                "embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }
        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        if dims == 0 {
            bail!("embeddings must be non-empty vectors");
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            bail!(
                "embedding dimensionality mismatch: expected {}, got {}",
                dims,
                bad.len()
            );
        }

        let fingerprint = fingerprint(&chunks);
        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk { chunk, vector })
            .collect();

        Ok(Self {
            model: model.to_string(),
            dims,
            fingerprint,
            built_at: Utc::now(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Return up to `k` chunks ordered by ascending cosine distance.
    /// Ties keep index order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        if k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, 1.0 - cosine_similarity(query, &e.vector)))
            .collect();

        // Stable sort keeps index order among equal distances.
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, distance)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                distance,
            })
            .collect()
    }

    /// Persist to `path`, replacing any previous index.
    ///
    /// Writes to a sibling temp file and renames it into place so readers
    /// never observe a partially written index.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create index directory: {}", parent.display())
            })?;
        }

        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_vec(self)?;
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write index: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move index into place: {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read index: {}", path.display()))?;
        let index: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse index: {}", path.display()))?;
        Ok(index)
    }
}

fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.source_path.as_bytes());
        hasher.update(chunk.offset.to_le_bytes());
        hasher.update(chunk.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Embed every chunk and build an index.
///
/// Returns `None`, after logging why, when there are no chunks or the
/// embedding service fails. Callers then run without document context.
pub async fn build(
    chunks: Vec<Chunk>,
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Option<VectorIndex> {
    if chunks.is_empty() {
        tracing::warn!("No chunks to index; continuing without document search");
        return None;
    }

    let batch_size = batch_size.max(1);
    let mut vectors = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        match embedder.embed(&texts).await {
            Ok(batch_vectors) if batch_vectors.len() == batch.len() => {
                vectors.extend(batch_vectors);
            }
            Ok(batch_vectors) => {
                let err = PipelineError::Provider(format!(
                    "embedding service returned {} vectors for {} texts",
                    batch_vectors.len(),
                    batch.len()
                ));
                tracing::warn!("Index build aborted: {}", err);
                return None;
            }
            Err(e) => {
                let err = PipelineError::provider(e);
                tracing::warn!("Index build aborted: {}", err);
                return None;
            }
        }
        tracing::debug!("Embedded {}/{} chunks", vectors.len(), chunks.len());
    }

    match VectorIndex::from_parts(embedder.model_name(), chunks, vectors) {
        Ok(index) => {
            tracing::info!(
                "Built index of {} chunks ({} dims, model {})",
                index.len(),
                index.dims,
                index.model
            );
            Some(index)
        }
        Err(e) => {
            tracing::warn!("Index build aborted: {}", e);
            None
        }
    }
}

/// Process-wide handle to the current index.
///
/// Readers take a cheap `Arc` snapshot under the read lock; a rebuild swaps
/// in a fully built index under the write lock, so a query never sees a
/// half-built index.
#[derive(Clone, Default)]
pub struct IndexHandle {
    inner: Arc<RwLock<Option<Arc<VectorIndex>>>>,
}

impl IndexHandle {
    pub fn new(index: Option<VectorIndex>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index.map(Arc::new))),
        }
    }

    pub async fn snapshot(&self) -> Option<Arc<VectorIndex>> {
        self.inner.read().await.clone()
    }

    /// Replace the current index, returning the previous one.
    pub async fn swap(&self, index: Option<VectorIndex>) -> Option<Arc<VectorIndex>> {
        let mut guard = self.inner.write().await;
        std::mem::replace(&mut *guard, index.map(Arc::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn chunk(text: &str, offset: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_path: "doc.txt".to_string(),
            offset,
        }
    }

    /// Maps "x…" texts to the x axis and everything else to the y axis.
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.starts_with('x') {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_empty_chunks_yield_no_index() {
        assert!(build(Vec::new(), &AxisEmbedder, 8).await.is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_yields_no_index() {
        assert!(build(vec![chunk("x", 0)], &FailingEmbedder, 8).await.is_none());
    }

    #[tokio::test]
    async fn test_build_preserves_chunk_order_across_batches() {
        let chunks = vec![chunk("x1", 0), chunk("y1", 1), chunk("x2", 2)];
        let index = build(chunks.clone(), &AxisEmbedder, 2).await.unwrap();
        let stored: Vec<Chunk> = index.chunks().cloned().collect();
        assert_eq!(stored, chunks);
        assert_eq!(index.dims, 2);
        assert_eq!(index.model, "axis");
    }

    #[test]
    fn test_search_orders_by_ascending_distance() {
        let index = VectorIndex::from_parts(
            "m",
            vec![chunk("far", 0), chunk("near", 1), chunk("mid", 2)],
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
        )
        .unwrap();

        let results = index.search(&[1.0, 0.0], 3);
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "mid", "far"]);
        assert!(results[0].distance <= results[1].distance);
    }

    #[test]
    fn test_search_truncates_to_k() {
        let index = VectorIndex::from_parts(
            "m",
            vec![chunk("a", 0), chunk("b", 1)],
            vec![vec![1.0], vec![1.0]],
        )
        .unwrap();
        assert_eq!(index.search(&[1.0], 1).len(), 1);
        assert!(index.search(&[1.0], 0).is_empty());
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let err = VectorIndex::from_parts(
            "m",
            vec![chunk("a", 0), chunk("b", 1)],
            vec![vec![1.0, 0.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("dimensionality"));
    }

    #[test]
    fn test_save_overwrites_and_loads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data/index.json");

        let first = VectorIndex::from_parts("m", vec![chunk("a", 0)], vec![vec![1.0]]).unwrap();
        first.save(&path).unwrap();
        let second = VectorIndex::from_parts(
            "m",
            vec![chunk("b", 0), chunk("c", 1)],
            vec![vec![1.0], vec![0.5]],
        )
        .unwrap();
        second.save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.fingerprint, second.fingerprint);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_handle_swap() {
        let handle = IndexHandle::default();
        assert!(handle.snapshot().await.is_none());

        let index = VectorIndex::from_parts("m", vec![chunk("a", 0)], vec![vec![1.0]]).unwrap();
        let previous = handle.swap(Some(index)).await;

        assert!(previous.is_none());
        assert_eq!(handle.snapshot().await.unwrap().len(), 1);
    }
}
