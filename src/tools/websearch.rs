// General web search tool for news and current guidance

use crate::search::{SearchError, SerpApiClient};
use crate::tools::{Tool, ToolKind};
use crate::types::AppResult;
use async_trait::async_trait;
use tracing::info;

pub struct WebSearchTool {
    client: Option<SerpApiClient>,
}

impl WebSearchTool {
    pub fn new(client: Option<SerpApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Websearch
    }

    async fn search(&self, query: &str) -> AppResult<Vec<String>> {
        let client = self.client.as_ref().ok_or(SearchError::NoApiKey)?;

        let results = match client.search_light(query).await {
            Ok(results) => results,
            Err(SearchError::NoResults) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(count = results.len(), "Web search completed");
        Ok(results.iter().map(|r| r.to_result_text()).collect())
    }
}
