//! Agent Pipeline
//!
//! The nodes that turn a user question into a guarded answer:
//!
//! - **Decider**: picks the tool route (single tool or multi)
//! - **Tool nodes / Multi-executor**: gather textual results
//! - **Aggregator**: synthesizes one answer with the LLM
//! - **Safety checker**: makes sure a medical disclaimer is present
//!
//! ## Pipeline Overview
//!
//! ```text
//! User Question
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Decider   │  → rag | research | pubmed | websearch | multi
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Tool node / │  → One tool, or several on isolated states
//! │ Multi-exec  │
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Aggregator  │  → Primary model, fallback model, raw results
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Safety    │  → Appends the disclaimer when missing
//! └─────────────┘
//!      │
//!      ▼
//!  Final Answer
//! ```

pub mod aggregator;
pub mod decider;
pub mod graph;
pub mod multi;
pub mod safety;
pub mod state;

pub use aggregator::Aggregator;
pub use decider::{heuristic_route, route_after_decider, Decider};
pub use graph::{build_graph, CompiledGraph, Node, NodeId, StateGraph, ToolNode};
pub use multi::MultiExecutor;
pub use safety::SafetyChecker;
pub use state::{ChatState, RouteMetadata, ToolChoice};

use crate::config::Config;
use crate::embeddings::{HttpEmbedder, Retriever};
use crate::llm::LLM;
use crate::tools::ToolRegistry;
use crate::types::AppResult;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// The compiled graph together with the retriever it searches
#[derive(Clone)]
pub struct MedicalPipeline {
    graph: CompiledGraph,
    retriever: Arc<Retriever>,
}

impl MedicalPipeline {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let embedder = Arc::new(HttpEmbedder::from_config(&config.rag));
        let retriever = Arc::new(Retriever::from_config(embedder, &config.rag));
        let registry = ToolRegistry::from_config(config, retriever.clone());
        let llm = LLM::from_config(&config.llm)?;

        Self::from_parts(registry, llm, config, retriever)
    }

    /// Assemble from already-built tools and LLM
    pub fn from_parts(
        registry: ToolRegistry,
        llm: Option<LLM>,
        config: &Config,
        retriever: Arc<Retriever>,
    ) -> AppResult<Self> {
        let decider = Decider::from_config(llm.clone(), &config.llm);
        let aggregator = Aggregator::from_config(llm, &config.llm);
        let graph = build_graph(decider, &registry, aggregator)?;
        Ok(Self { graph, retriever })
    }

    /// Run the whole graph for one question
    pub async fn answer(&self, query: &str) -> AppResult<ChatState> {
        let start = Instant::now();
        info!(query_len = query.len(), "Starting medical pipeline");

        let state = self.graph.invoke(ChatState::new(query)).await?;

        info!(
            tool = ?state.tool,
            results = state.results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline complete"
        );
        Ok(state)
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    #[cfg(test)]
    pub(crate) fn with_max_steps(self, max_steps: usize) -> Self {
        Self {
            graph: self.graph.with_max_steps(max_steps),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::aggregator::NO_RESULTS_ANSWER;
    use crate::agents::safety::DISCLAIMER;
    use crate::embeddings::retriever::tests::KeywordEmbedder;
    use crate::tools::tests::FakeTool;
    use crate::tools::ToolKind;

    fn pipeline(registry: ToolRegistry) -> MedicalPipeline {
        let dir = std::env::temp_dir().join("medbot-pipeline-tests-no-index");
        let retriever = Arc::new(Retriever::new(Arc::new(KeywordEmbedder::new()), dir.join("index.json")));
        MedicalPipeline::from_parts(registry, None, &Config::default(), retriever).unwrap()
    }

    fn registry(rag: &[&str], pubmed: &[&str]) -> ToolRegistry {
        ToolRegistry::new()
            .with_tool(FakeTool::ok(ToolKind::Rag, rag))
            .with_tool(FakeTool::ok(ToolKind::Pubmed, pubmed))
            .with_tool(FakeTool::failing(ToolKind::Research, "SerpAPI key not configured"))
            .with_tool(FakeTool::ok(ToolKind::Websearch, &[]))
    }

    #[tokio::test]
    async fn test_single_tool_route_end_to_end() {
        let pipeline = pipeline(registry(&["Disease: Asthma\nSymptoms: wheezing"], &[]));
        let state = pipeline.answer("what are the symptoms of asthma").await.unwrap();

        assert_eq!(state.tool, Some(ToolChoice::Rag));
        assert!(state.final_answer.contains("Disease: Asthma"));
        assert!(state.final_answer.ends_with(DISCLAIMER));
    }

    #[tokio::test]
    async fn test_multi_route_end_to_end() {
        let pipeline = pipeline(registry(&["Disease: Gout"], &["**Colchicine trial**"]));
        let state = pipeline.answer("studies on gout treatment").await.unwrap();

        assert_eq!(state.tool, Some(ToolChoice::Multi));
        assert_eq!(state.metadata.tools, vec!["rag", "pubmed"]);
        assert!(state.final_answer.contains("📋 RAG RESULTS"));
        assert!(state.final_answer.contains("📋 PUBMED RESULTS"));
    }

    #[tokio::test]
    async fn test_failing_single_tool_still_answers() {
        let pipeline = pipeline(registry(&[], &[]));
        let state = pipeline.answer("mechanism of metformin").await.unwrap();

        assert_eq!(state.tool, Some(ToolChoice::Research));
        assert_eq!(
            state.results,
            vec!["Error searching research sources: Internal error: SerpAPI key not configured".to_string()]
        );
        assert!(state.final_answer.ends_with(DISCLAIMER));
    }

    #[tokio::test]
    async fn test_llm_route_and_synthesis_over_http() {
        let mut server = mockito::Server::new_async().await;
        let completion = |content: &str| {
            serde_json::json!({
                "choices": [{ "message": { "content": content }, "finish_reason": "stop" }]
            })
            .to_string()
        };
        let router = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({ "temperature": 0.0 })))
            .with_status(200)
            .with_body(completion(r#"{"tool": "pubmed"}"#))
            .create_async()
            .await;
        let synth = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({ "model": "llama-3.1-70b-versatile" }),
            ))
            .with_status(200)
            .with_body(completion("### Brief Overview\nStatins work.\n### Medical Disclaimer\nInfo only."))
            .create_async()
            .await;

        let mut config = Config::default();
        config.llm.groq_api_key = "gsk-test".to_string();
        config.llm.api_base = Some(server.url());
        let llm = LLM::from_config(&config.llm).unwrap();

        let dir = std::env::temp_dir().join("medbot-pipeline-tests-no-index");
        let retriever = Arc::new(Retriever::new(Arc::new(KeywordEmbedder::new()), dir.join("index.json")));
        let pipeline = MedicalPipeline::from_parts(registry(&[], &["**Statin trial**"]), llm, &config, retriever).unwrap();

        let state = pipeline.answer("do statins prevent heart attacks").await.unwrap();
        router.assert_async().await;
        synth.assert_async().await;
        assert_eq!(state.tool, Some(ToolChoice::Pubmed));
        assert_eq!(state.final_answer, "### Brief Overview\nStatins work.\n### Medical Disclaimer\nInfo only.");
    }

    #[tokio::test]
    async fn test_empty_results_answer() {
        let pipeline = pipeline(registry(&[], &[]));
        let state = pipeline.answer("hello").await.unwrap();
        assert_eq!(state.final_answer, format!("{}{}", NO_RESULTS_ANSWER, DISCLAIMER));
    }
}
