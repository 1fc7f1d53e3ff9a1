//! Retrieval and research tools.
//!
//! Each tool is an independent handler: it takes a state record, runs one
//! lookup for `state.query` and returns the state with `results` replaced by
//! the textual hits. The graph wires one node per tool, and the multi-executor
//! calls the same handlers with isolated per-tool states.

pub mod pubmed;
pub mod rag;
pub mod research;
pub mod websearch;

pub use pubmed::PubMedTool;
pub use rag::RagTool;
pub use research::ResearchTool;
pub use websearch::WebSearchTool;

use crate::agents::ChatState;
use crate::config::Config;
use crate::embeddings::Retriever;
use crate::search::{PubMedClient, SerpApiClient};
use crate::types::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Rag,
    Research,
    Pubmed,
    Websearch,
}

impl ToolKind {
    /// Fixed order used whenever several tools are listed
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Rag,
        ToolKind::Pubmed,
        ToolKind::Research,
        ToolKind::Websearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Rag => "rag",
            ToolKind::Research => "research",
            ToolKind::Pubmed => "pubmed",
            ToolKind::Websearch => "websearch",
        }
    }

    /// Human-readable name used in error lines
    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Rag => "the medical knowledge base",
            ToolKind::Research => "research sources",
            ToolKind::Pubmed => "PubMed",
            ToolKind::Websearch => "the web",
        }
    }

    /// Case-insensitive lookup; `None` for unknown names
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rag" => Some(ToolKind::Rag),
            "research" => Some(ToolKind::Research),
            "pubmed" => Some(ToolKind::Pubmed),
            "websearch" | "web_search" | "web" => Some(ToolKind::Websearch),
            _ => None,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Textual hits for one query
    async fn search(&self, query: &str) -> AppResult<Vec<String>>;

    /// State in, state out: `results` is replaced by this tool's hits
    async fn run(&self, state: ChatState) -> AppResult<ChatState> {
        let results = self.search(&state.query).await?;
        Ok(ChatState { results, ..state })
    }
}

/// Tool handlers by kind
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All four tools wired from configuration
    pub fn from_config(config: &Config, retriever: Arc<Retriever>) -> Self {
        let serpapi = SerpApiClient::from_config(&config.search);
        let pubmed = Arc::new(PubMedClient::new(&config.pubmed));

        Self::new()
            .with_tool(Arc::new(RagTool::new(retriever, config.rag.top_k)))
            .with_tool(Arc::new(ResearchTool::new(serpapi.clone())))
            .with_tool(Arc::new(PubMedTool::new(pubmed, config.pubmed.abstract_max_chars)))
            .with_tool(Arc::new(WebSearchTool::new(serpapi)))
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn Tool>> {
        self.tools.get(&kind).cloned()
    }

    /// Registered kinds in the fixed tool order
    pub fn kinds(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|k| self.tools.contains_key(k))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::AppError;
    use std::sync::Mutex;

    /// Scripted tool recording the queries it receives
    pub(crate) struct FakeTool {
        kind: ToolKind,
        outcome: Result<Vec<String>, String>,
        pub queries: Mutex<Vec<String>>,
    }

    impl FakeTool {
        pub(crate) fn ok(kind: ToolKind, results: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                kind,
                outcome: Ok(results.iter().map(|s| s.to_string()).collect()),
                queries: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn failing(kind: ToolKind, message: &str) -> Arc<Self> {
            Arc::new(Self {
                kind,
                outcome: Err(message.to_string()),
                queries: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn seen(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn kind(&self) -> ToolKind {
            self.kind
        }

        async fn search(&self, query: &str) -> AppResult<Vec<String>> {
            self.queries.lock().unwrap().push(query.to_string());
            self.outcome.clone().map_err(AppError::Internal)
        }
    }

    #[test]
    fn test_tool_kind_parsing() {
        assert_eq!(ToolKind::parse("PubMed"), Some(ToolKind::Pubmed));
        assert_eq!(ToolKind::parse(" rag "), Some(ToolKind::Rag));
        assert_eq!(ToolKind::parse("web_search"), Some(ToolKind::Websearch));
        assert_eq!(ToolKind::parse("calculator"), None);
        assert_eq!(ToolKind::Research.to_string(), "research");
    }

    #[tokio::test]
    async fn test_run_replaces_results_only() {
        let tool = FakeTool::ok(ToolKind::Rag, &["Disease: Flu"]);
        let mut state = ChatState::new("flu symptoms");
        state.results = vec!["stale".to_string()];
        state.final_answer = "kept".to_string();

        let out = tool.run(state).await.unwrap();
        assert_eq!(out.results, vec!["Disease: Flu".to_string()]);
        assert_eq!(out.query, "flu symptoms");
        assert_eq!(out.final_answer, "kept");
        assert_eq!(tool.seen(), vec!["flu symptoms".to_string()]);
    }

    #[test]
    fn test_registry_lookup_and_order() {
        let registry = ToolRegistry::new()
            .with_tool(FakeTool::ok(ToolKind::Websearch, &[]))
            .with_tool(FakeTool::ok(ToolKind::Rag, &[]));

        assert!(registry.get(ToolKind::Rag).is_some());
        assert!(registry.get(ToolKind::Pubmed).is_none());
        assert_eq!(registry.kinds(), vec![ToolKind::Rag, ToolKind::Websearch]);
    }
}
