//! Semantic retrieval over the disease/symptom index.
//!
//! The index is loaded from disk on first use and kept in memory for every
//! later request. A missing or unreadable index is not cached, so the next
//! request tries again (for example after `medbot build-index`).

use crate::config::RagConfig;
use crate::embeddings::{DocumentProcessor, Embedder, VectorIndex};
use crate::types::AppResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index_path: PathBuf,
    batch_size: usize,
    cache: RwLock<Option<Arc<VectorIndex>>>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            embedder,
            index_path: index_path.into(),
            batch_size: 32,
            cache: RwLock::new(None),
        }
    }

    pub fn from_config(embedder: Arc<dyn Embedder>, config: &RagConfig) -> Self {
        Self::new(embedder, &config.index_path).with_batch_size(config.embedding_batch_size)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build the index from a CSV dataset, save it, and make it the cached index
    pub async fn build_index(&self, dataset_path: impl AsRef<Path>) -> AppResult<Arc<VectorIndex>> {
        info!(dataset = %dataset_path.as_ref().display(), "Loading dataset");
        let records = DocumentProcessor::load_records(dataset_path)?;
        let documents = DocumentProcessor::documents(&records);

        info!(documents = documents.len(), "Building vector index");
        let index = VectorIndex::build(documents, self.embedder.as_ref(), self.batch_size).await?;
        index.save(&self.index_path)?;

        let index = Arc::new(index);
        *self.cache.write().await = Some(index.clone());
        Ok(index)
    }

    /// Cached index, loading it from disk the first time
    pub async fn get_index(&self) -> Option<Arc<VectorIndex>> {
        if let Some(index) = self.cache.read().await.as_ref() {
            return Some(index.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(index) = cache.as_ref() {
            return Some(index.clone());
        }

        if !self.index_path.exists() {
            warn!(path = %self.index_path.display(), "Vector index not found, build it first");
            return None;
        }

        info!(path = %self.index_path.display(), "Loading vector index from disk (first time only)");
        match VectorIndex::load(&self.index_path) {
            Ok(index) => {
                info!(entries = index.len(), "Vector index loaded into memory");
                let index = Arc::new(index);
                *cache = Some(index.clone());
                Some(index)
            }
            Err(e) => {
                error!(error = %e, "Error loading vector index");
                None
            }
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.cache.read().await.is_some()
    }

    /// Texts of the `k` entries most similar to the query; empty without an index
    pub async fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<String>> {
        let Some(index) = self.get_index().await else {
            return Ok(Vec::new());
        };
        if k == 0 || index.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let results = index.search(&query_embedding, k)?;
        Ok(results.into_iter().map(|r| r.text).collect())
    }
}
