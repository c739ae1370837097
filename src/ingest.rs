//! Index build orchestration.
//!
//! Coordinates the full rebuild flow: loader → chunker → embedding → index →
//! disk. Every stage degrades instead of failing: unreadable files are
//! skipped, and an embedding failure leaves the process without an index.

use anyhow::Result;

use crate::chunk;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::index::{self, IndexHandle, VectorIndex};
use crate::loader;

/// Counts reported after a rebuild.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RebuildStats {
    pub documents: usize,
    pub chunks: usize,
    pub indexed: usize,
}

/// Load, split, embed and persist the configured document directory.
///
/// Returns `Ok((None, _))` when there is nothing to index or the embedding
/// service failed. Only an unusable document directory is an error.
pub async fn rebuild_index(
    config: &Config,
    embedder: &dyn Embedder,
) -> Result<(Option<VectorIndex>, RebuildStats)> {
    let units = loader::load_documents(&config.docs)?;
    let chunks = chunk::split(
        &units,
        config.chunking.chunk_size,
        config.chunking.overlap,
    );
    let mut stats = RebuildStats {
        documents: units.len(),
        chunks: chunks.len(),
        indexed: 0,
    };
    drop(units);

    if !config.embedding.is_enabled() {
        tracing::warn!("Embedding provider is disabled; skipping index build");
        return Ok((None, stats));
    }

    let built = index::build(chunks, embedder, config.embedding.batch_size).await;
    if let Some(ref index) = built {
        stats.indexed = index.len();
        match index.save(&config.index.path) {
            Ok(()) => tracing::info!("Saved index to {}", config.index.path.display()),
            Err(e) => tracing::warn!("Could not persist index: {:#}", e),
        }
    }
    Ok((built, stats))
}

/// The index saved by a previous rebuild, if it exists and was produced by
/// the same embedding model.
pub fn load_cached(config: &Config, embedder: &dyn Embedder) -> Option<VectorIndex> {
    let path = &config.index.path;
    if !path.exists() {
        return None;
    }
    match VectorIndex::load(path) {
        Ok(index) if index.model == embedder.model_name() => {
            tracing::info!(
                "Loaded cached index of {} chunks built {}",
                index.len(),
                index.built_at
            );
            Some(index)
        }
        Ok(index) => {
            tracing::warn!(
                "Cached index was built with model {} but {} is configured; ignoring it",
                index.model,
                embedder.model_name()
            );
            None
        }
        Err(e) => {
            tracing::warn!("Ignoring unreadable cached index: {:#}", e);
            None
        }
    }
}

/// Rebuild and swap the result into `handle`. The previous index stays in
/// place when the rebuild produces nothing.
pub async fn refresh(
    config: &Config,
    embedder: &dyn Embedder,
    handle: &IndexHandle,
) -> Result<RebuildStats> {
    let (built, stats) = rebuild_index(config, embedder).await?;
    if built.is_some() {
        handle.swap(built).await;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0])
                .collect())
        }
    }

    fn config_for(tmp: &TempDir) -> Config {
        let mut config = Config::minimal();
        config.docs.dir = tmp.path().join("docs");
        config.index.path = tmp.path().join("data/index.json");
        config.embedding.provider = "ollama".to_string();
        config
    }

    #[tokio::test]
    async fn test_rebuild_persists_and_reloads() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(&tmp);
        std::fs::create_dir_all(&config.docs.dir).unwrap();
        std::fs::write(config.docs.dir.join("a.txt"), "GPUs run many threads.").unwrap();

        let (built, stats) = rebuild_index(&config, &LengthEmbedder).await.unwrap();
        let built = built.unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.indexed, 1);
        assert!(config.index.path.exists());

        let cached = load_cached(&config, &LengthEmbedder).unwrap();
        assert_eq!(cached.fingerprint, built.fingerprint);
    }

    #[tokio::test]
    async fn test_missing_directory_yields_no_index() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(&tmp);
        let (built, stats) = rebuild_index(&config, &LengthEmbedder).await.unwrap();
        assert!(built.is_none());
        assert_eq!(stats, RebuildStats::default());
        assert!(config.docs.dir.exists());
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_index_on_empty_rebuild() {
        let tmp = TempDir::new().unwrap();
        let config = config_for(&tmp);
        let chunk = crate::models::Chunk {
            text: "old".to_string(),
            source_path: "old.txt".to_string(),
            offset: 0,
        };
        let previous = VectorIndex::from_parts("length", vec![chunk], vec![vec![3.0, 1.0]]).unwrap();
        let handle = IndexHandle::new(Some(previous));

        refresh(&config, &LengthEmbedder, &handle).await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap().len(), 1);
    }
}
