//! Top-k chunk retrieval for a query.
//!
//! Document search is optional: with no index, or when the query cannot be
//! embedded, the retriever returns no context rather than failing the
//! request.

use std::sync::Arc;

use crate::embedding::{embed_query, Embedder};
use crate::error::PipelineError;
use crate::index::IndexHandle;
use crate::models::{Chunk, ScoredChunk};

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: IndexHandle,
    default_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: IndexHandle, default_k: usize) -> Self {
        Self {
            embedder,
            index,
            default_k,
        }
    }

    /// Query with the configured default `k`.
    pub async fn retrieve(&self, text: &str) -> Vec<Chunk> {
        self.query(text, self.default_k).await
    }

    /// Up to `k` chunks, most similar first.
    pub async fn query(&self, text: &str, k: usize) -> Vec<Chunk> {
        self.query_scored(text, k)
            .await
            .into_iter()
            .map(|scored| scored.chunk)
            .collect()
    }

    /// Like [`Retriever::query`], keeping each chunk's cosine distance.
    pub async fn query_scored(&self, text: &str, k: usize) -> Vec<ScoredChunk> {
        match self.search(text, k).await {
            Ok(results) => results,
            Err(PipelineError::IndexUnavailable) => {
                tracing::debug!("{}; answering without context", PipelineError::IndexUnavailable);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Error retrieving context: {}", e);
                Vec::new()
            }
        }
    }

    /// Scored top-k search that reports why nothing came back.
    ///
    /// Fails with [`PipelineError::IndexUnavailable`] when no index has been
    /// built and with [`PipelineError::Provider`] when the query cannot be
    /// embedded.
    pub async fn search(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, PipelineError> {
        let index = self
            .index
            .snapshot()
            .await
            .ok_or(PipelineError::IndexUnavailable)?;
        if k == 0 || text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let vector = embed_query(self.embedder.as_ref(), text)
            .await
            .map_err(PipelineError::provider)?;
        let results = index.search(&vector, k);
        for scored in &results {
            tracing::debug!(
                "retrieved {}@{} (distance {:.4})",
                scored.chunk.source_path,
                scored.chunk.offset,
                scored.distance
            );
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledEmbedder;
    use crate::index::VectorIndex;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_path: "doc.txt".to_string(),
            offset: 0,
        }
    }

    #[tokio::test]
    async fn test_absent_index_returns_empty() {
        let retriever = Retriever::new(Arc::new(DisabledEmbedder), IndexHandle::default(), 3);
        assert!(retriever.retrieve("anything at all").await.is_empty());
        assert!(matches!(
            retriever.search("anything at all", 3).await,
            Err(PipelineError::IndexUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_empty() {
        let index = VectorIndex::from_parts("m", vec![chunk("a")], vec![vec![1.0]]).unwrap();
        let retriever =
            Retriever::new(Arc::new(DisabledEmbedder), IndexHandle::new(Some(index)), 3);
        assert!(retriever.retrieve("query").await.is_empty());
        assert!(matches!(
            retriever.search("query", 3).await,
            Err(PipelineError::Provider(_))
        ));
        assert!(retriever.search("query", 0).await.unwrap().is_empty());
    }
}
