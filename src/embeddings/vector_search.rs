// In-memory vector index with cosine similarity search, persisted as JSON

use crate::embeddings::Embedder;
use crate::types::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    pub model: String,
    pub dimension: usize,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub text: String,
    pub score: f32,
}

impl VectorIndex {
    /// Assemble an index from documents and their vectors; all vectors must share one dimension
    pub fn from_parts(model: impl Into<String>, texts: Vec<String>, embeddings: Vec<Vec<f32>>) -> AppResult<Self> {
        if texts.len() != embeddings.len() {
            return Err(AppError::Retrieval(format!(
                "Got {} embeddings for {} documents",
                embeddings.len(),
                texts.len()
            )));
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(AppError::Retrieval(format!(
                "Inconsistent embedding dimension: expected {}, got {}",
                dimension,
                bad.len()
            )));
        }

        let entries = texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| IndexEntry { text, embedding })
            .collect();

        Ok(Self {
            model: model.into(),
            dimension,
            entries,
        })
    }

    /// Embed documents in batches and build the index
    pub async fn build(documents: Vec<String>, embedder: &dyn Embedder, batch_size: usize) -> AppResult<Self> {
        let batch_size = batch_size.max(1);
        let mut embeddings = Vec::with_capacity(documents.len());

        for (i, chunk) in documents.chunks(batch_size).enumerate() {
            let vectors = embedder.embed_batch(chunk).await?;
            embeddings.extend(vectors);
            info!(
                batch = i + 1,
                embedded = embeddings.len(),
                total = documents.len(),
                "Embedded index batch"
            );
        }

        Self::from_parts(embedder.model_name(), documents, embeddings)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        info!(path = %path.display(), entries = self.entries.len(), "Index saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let index: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        if let Some(bad) = index.entries.iter().find(|e| e.embedding.len() != index.dimension) {
            return Err(AppError::Retrieval(format!(
                "Corrupt index: entry dimension {} does not match {}",
                bad.embedding.len(),
                index.dimension
            )));
        }
        Ok(index)
    }

    /// Top-k entries by cosine similarity, best first; ties keep insertion order
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<SearchResult>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(AppError::Retrieval(format!(
                "Query embedding dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();

        // sort_by is stable, so equal scores stay in index order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult {
                text: self.entries[i].text.clone(),
                score,
            })
            .collect())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
