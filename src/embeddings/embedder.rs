//! Embedding clients for the retrieval index.
//!
//! Two local serving backends are supported: Hugging Face text-embeddings-inference
//! (`POST /embed`, batched) and Ollama (`POST /api/embeddings`, one text per call).

use crate::config::RagConfig;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const EMBED_TIMEOUT_SECS: u64 = 60;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Name of the embedding model, recorded in saved indexes
    fn model_name(&self) -> &str;

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Retrieval("Embedding service returned no vectors".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    Tei,
    Ollama,
}

impl EmbeddingProvider {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("ollama") {
            EmbeddingProvider::Ollama
        } else {
            EmbeddingProvider::Tei
        }
    }
}

#[derive(Clone)]
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    provider: EmbeddingProvider,
    model: String,
}

#[derive(Serialize)]
struct TeiEmbedRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(base_url: impl Into<String>, provider: EmbeddingProvider, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(EMBED_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider,
            model: model.into(),
        }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(
            config.embedding_url.clone(),
            EmbeddingProvider::parse(&config.embedding_provider),
            config.embedding_model.clone(),
        )
    }

    async fn tei_embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}/embed", self.base_url);
        let embeddings = self
            .client
            .post(&url)
            .json(&TeiEmbedRequest { inputs: texts, truncate: true })
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Vec<f32>>>()
            .await?;

        if embeddings.len() != texts.len() {
            return Err(AppError::Retrieval(format!(
                "Embedding service returned {} vectors for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }
        Ok(embeddings)
    }

    async fn ollama_embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbedRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<OllamaEmbedResponse>()
            .await?;

        Ok(response.embedding)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = texts.len(), provider = ?self.provider, "Embedding texts");

        match self.provider {
            EmbeddingProvider::Tei => self.tei_embed(texts).await,
            EmbeddingProvider::Ollama => {
                let mut results = Vec::with_capacity(texts.len());
                for text in texts {
                    results.push(self.ollama_embed(text).await?);
                }
                Ok(results)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!(EmbeddingProvider::parse("ollama"), EmbeddingProvider::Ollama);
        assert_eq!(EmbeddingProvider::parse(" Ollama "), EmbeddingProvider::Ollama);
        assert_eq!(EmbeddingProvider::parse("tei"), EmbeddingProvider::Tei);
        assert_eq!(EmbeddingProvider::parse("anything"), EmbeddingProvider::Tei);
    }

    #[tokio::test]
    async fn test_tei_batch_embedding() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embed")
            .with_status(200)
            .with_body("[[0.1, 0.2], [0.3, 0.4]]")
            .create_async()
            .await;

        let embedder = HttpEmbedder::new(server.url(), EmbeddingProvider::Tei, "minilm");
        let texts = vec!["fever".to_string(), "cough".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();

        mock.assert_async().await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3, 0.4]);
    }

    #[tokio::test]
    async fn test_tei_count_mismatch_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embed")
            .with_status(200)
            .with_body("[[0.1, 0.2]]")
            .create_async()
            .await;

        let embedder = HttpEmbedder::new(server.url(), EmbeddingProvider::Tei, "minilm");
        let texts = vec!["a".to_string(), "b".to_string()];
        assert!(embedder.embed_batch(&texts).await.is_err());
    }

    #[tokio::test]
    async fn test_ollama_single_embedding() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embeddings")
            .with_status(200)
            .with_body(r#"{"embedding": [1.0, 0.0, 0.5]}"#)
            .create_async()
            .await;

        let embedder = HttpEmbedder::new(server.url(), EmbeddingProvider::Ollama, "nomic-embed-text");
        let vector = embedder.embed("headache").await.unwrap();
        assert_eq!(vector, vec![1.0, 0.0, 0.5]);
        assert_eq!(embedder.model_name(), "nomic-embed-text");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let embedder = HttpEmbedder::new("http://127.0.0.1:9", EmbeddingProvider::Tei, "minilm");
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
