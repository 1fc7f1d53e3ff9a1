// Scholarly research tool: Google Scholar first, reliable web sources as backup

use crate::search::{CombinedSearchResults, SearchError, SerpApiClient};
use crate::tools::{Tool, ToolKind};
use crate::types::AppResult;
use async_trait::async_trait;
use tracing::{info, warn};

pub struct ResearchTool {
    client: Option<SerpApiClient>,
}

impl ResearchTool {
    pub fn new(client: Option<SerpApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ResearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Research
    }

    async fn search(&self, query: &str) -> AppResult<Vec<String>> {
        let client = self.client.as_ref().ok_or(SearchError::NoApiKey)?;
        info!(query = %query, "Running research search");

        let combined = client.search_combined(query).await;
        let results = combined_results(&combined)?;

        info!(
            scholar = combined.scholar_results.len(),
            web = combined.light_results.len(),
            "Research search completed"
        );
        Ok(results)
    }
}

/// Scholar hits then web hits; an error only when no engine answered
fn combined_results(combined: &CombinedSearchResults) -> Result<Vec<String>, SearchError> {
    let any_success = combined.scholar_success || combined.light_success;
    if !any_success {
        if let Some(first_error) = combined.errors.first() {
            warn!(errors = ?combined.errors, "Research search failed");
            return Err(SearchError::RequestFailed(first_error.clone()));
        }
    }

    Ok(combined
        .scholar_results
        .iter()
        .map(|r| r.to_result_text())
        .chain(combined.light_results.iter().map(|r| r.to_result_text()))
        .collect())
}
