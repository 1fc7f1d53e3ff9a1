//! Multi-executor Node
//!
//! Runs every tool the decider listed, one after another, each on its own
//! isolated state so no tool sees another's query or results. Failures and
//! unknown tool names are logged and skipped. PubMed reports its own failures
//! as a result line, so those still get a section.

use crate::agents::graph::{Node, NodeId};
use crate::agents::{ChatState, ToolChoice};
use crate::tools::{ToolKind, ToolRegistry};
use crate::types::AppResult;
use async_trait::async_trait;
use tracing::{error, info, warn};

pub struct MultiExecutor {
    registry: ToolRegistry,
}

impl MultiExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

pub fn section_header(kind: ToolKind) -> String {
    let rule = "=".repeat(60);
    format!("\n{rule}\n📋 {} RESULTS\n{rule}\n", kind.as_str().to_uppercase())
}

#[async_trait]
impl Node for MultiExecutor {
    fn id(&self) -> NodeId {
        NodeId::MultiExecutor
    }

    async fn run(&self, state: ChatState) -> AppResult<ChatState> {
        info!(tools = ?state.metadata.tools, "Multi-executor starting");
        let mut all_results = Vec::new();

        for name in &state.metadata.tools {
            let Some(kind) = ToolKind::parse(name) else {
                warn!(tool = %name, "Unknown tool, skipping");
                continue;
            };
            let Some(tool) = self.registry.get(kind) else {
                warn!(tool = %kind, "Tool not registered, skipping");
                continue;
            };

            let sub_query = state
                .metadata
                .queries
                .get(name)
                .or_else(|| state.metadata.queries.get(kind.as_str()))
                .cloned()
                .unwrap_or_else(|| state.query.clone());
            info!(tool = %kind, query = %sub_query, "Executing tool");

            match tool.run(ChatState::for_tool(sub_query, kind)).await {
                Ok(result) if result.results.is_empty() => {
                    warn!(tool = %kind, "No results");
                }
                Ok(result) => {
                    info!(tool = %kind, count = result.results.len(), "Got results");
                    all_results.push(section_header(kind));
                    all_results.extend(result.results);
                }
                Err(e) => {
                    error!(tool = %kind, error = %e, "Error executing tool");
                }
            }
        }

        info!(total = all_results.len(), "Multi-executor combined results");
        Ok(ChatState {
            results: all_results,
            tool: Some(ToolChoice::Multi),
            ..state
        })
    }
}
