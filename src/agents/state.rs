//! State record passed between graph nodes

use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Route picked by the decider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Rag,
    Research,
    Pubmed,
    Websearch,
    Multi,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Rag => "rag",
            ToolChoice::Research => "research",
            ToolChoice::Pubmed => "pubmed",
            ToolChoice::Websearch => "websearch",
            ToolChoice::Multi => "multi",
        }
    }

    /// The single tool behind this choice; `None` for multi
    pub fn tool_kind(&self) -> Option<ToolKind> {
        match self {
            ToolChoice::Rag => Some(ToolKind::Rag),
            ToolChoice::Research => Some(ToolKind::Research),
            ToolChoice::Pubmed => Some(ToolKind::Pubmed),
            ToolChoice::Websearch => Some(ToolKind::Websearch),
            ToolChoice::Multi => None,
        }
    }
}

impl From<ToolKind> for ToolChoice {
    fn from(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Rag => ToolChoice::Rag,
            ToolKind::Research => ToolChoice::Research,
            ToolKind::Pubmed => ToolChoice::Pubmed,
            ToolKind::Websearch => ToolChoice::Websearch,
        }
    }
}

impl fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decider output for the multi route: which tools to run and their sub-queries.
/// Names stay strings so unknown tools can be reported and skipped downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteMetadata {
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub queries: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatState {
    pub query: String,
    pub tool: Option<ToolChoice>,
    pub results: Vec<String>,
    pub metadata: RouteMetadata,
    pub final_answer: String,
}

impl ChatState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Fresh state for running one tool in isolation
    pub fn for_tool(query: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            query: query.into(),
            tool: Some(kind.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_choice_names() {
        assert_eq!(ToolChoice::Multi.to_string(), "multi");
        assert_eq!(ToolChoice::Pubmed.to_string(), "pubmed");
        assert_eq!(ToolChoice::from(ToolKind::Websearch), ToolChoice::Websearch);
        assert_eq!(ToolChoice::Rag.tool_kind(), Some(ToolKind::Rag));
        assert_eq!(ToolChoice::Multi.tool_kind(), None);
        assert_eq!(serde_json::to_string(&ToolChoice::Research).unwrap(), "\"research\"");
    }

    #[test]
    fn test_isolated_tool_state() {
        let state = ChatState::for_tool("statins", ToolKind::Pubmed);
        assert_eq!(state.query, "statins");
        assert_eq!(state.tool, Some(ToolChoice::Pubmed));
        assert!(state.results.is_empty());
        assert!(state.metadata.tools.is_empty());
        assert!(state.final_answer.is_empty());
    }
}
