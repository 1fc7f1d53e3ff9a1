// Semantic lookup in the local disease/symptom/treatment index

use crate::embeddings::Retriever;
use crate::tools::{Tool, ToolKind};
use crate::types::AppResult;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub struct RagTool {
    retriever: Arc<Retriever>,
    top_k: usize,
}

impl RagTool {
    pub fn new(retriever: Arc<Retriever>, top_k: usize) -> Self {
        Self { retriever, top_k }
    }
}

#[async_trait]
impl Tool for RagTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Rag
    }

    async fn search(&self, query: &str) -> AppResult<Vec<String>> {
        info!(query = %query, k = self.top_k, "Searching medical knowledge base");
        let results = self.retriever.retrieve(query, self.top_k).await?;
        if results.is_empty() {
            warn!("No knowledge base entries matched");
        } else {
            info!(count = results.len(), "Knowledge base search completed");
        }
        Ok(results)
    }
}
