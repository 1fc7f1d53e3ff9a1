// PubMed literature tool

use crate::search::PubMedClient;
use crate::tools::{Tool, ToolKind};
use crate::types::AppResult;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct PubMedTool {
    client: Arc<PubMedClient>,
    abstract_max_chars: usize,
}

impl PubMedTool {
    pub fn new(client: Arc<PubMedClient>, abstract_max_chars: usize) -> Self {
        Self {
            client,
            abstract_max_chars,
        }
    }
}

#[async_trait]
impl Tool for PubMedTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Pubmed
    }

    async fn search(&self, query: &str) -> AppResult<Vec<String>> {
        // Failures are reported as a result line, not an error
        let articles = match self.client.search(query).await {
            Ok(articles) => articles,
            Err(e) => {
                error!(query = %query, error = %e, "PubMed search failed");
                return Ok(vec![format!("Error searching {}: {}", self.kind().label(), e)]);
            }
        };

        if articles.is_empty() {
            warn!(query = %query, "No PubMed papers found");
            return Ok(vec![format!("No PubMed papers found for '{}'.", query)]);
        }

        info!(count = articles.len(), "PubMed papers formatted");
        Ok(articles
            .iter()
            .map(|a| a.to_result_text(self.abstract_max_chars))
            .collect())
    }
}
