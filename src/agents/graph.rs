//! Minimal state graph: nodes take a `ChatState` and return the updated one.
//!
//! Edges are either fixed or conditional (a routing function over the state).
//! `compile` checks the wiring once; `invoke` then walks it sequentially from
//! the entry point until `END`.

use crate::agents::{route_after_decider, Aggregator, ChatState, Decider, MultiExecutor, SafetyChecker};
use crate::tools::{Tool, ToolKind, ToolRegistry};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on node executions per invocation
pub const DEFAULT_MAX_STEPS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Decider,
    Rag,
    Research,
    Pubmed,
    Websearch,
    MultiExecutor,
    Aggregator,
    SafetyChecker,
    End,
}

impl NodeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::Decider => "decider",
            NodeId::Rag => "rag",
            NodeId::Research => "research",
            NodeId::Pubmed => "pubmed",
            NodeId::Websearch => "websearch",
            NodeId::MultiExecutor => "multi_executor",
            NodeId::Aggregator => "aggregator",
            NodeId::SafetyChecker => "safety_checker",
            NodeId::End => "__end__",
        }
    }
}

impl From<ToolKind> for NodeId {
    fn from(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Rag => NodeId::Rag,
            ToolKind::Research => NodeId::Research,
            ToolKind::Pubmed => NodeId::Pubmed,
            ToolKind::Websearch => NodeId::Websearch,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Node: Send + Sync {
    fn id(&self) -> NodeId;

    async fn run(&self, state: ChatState) -> AppResult<ChatState>;
}

/// Routing function for a conditional edge
pub type RouteFn = Arc<dyn Fn(&ChatState) -> NodeId + Send + Sync>;

#[derive(Clone)]
enum Edge {
    Direct(NodeId),
    Conditional { route: RouteFn, targets: Vec<NodeId> },
}

/// Graph node wrapping a single tool.
///
/// A tool failure does not abort the run: it becomes one result line so the
/// aggregator can still answer.
pub struct ToolNode {
    tool: Arc<dyn Tool>,
}

impl ToolNode {
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl Node for ToolNode {
    fn id(&self) -> NodeId {
        self.tool.kind().into()
    }

    async fn run(&self, state: ChatState) -> AppResult<ChatState> {
        let kind = self.tool.kind();
        match self.tool.run(state.clone()).await {
            Ok(state) => {
                info!(tool = %kind, results = state.results.len(), "Tool completed");
                Ok(state)
            }
            Err(e) => {
                warn!(tool = %kind, error = %e, "Tool failed");
                Ok(ChatState {
                    results: vec![format!("Error searching {}: {}", kind.label(), e)],
                    ..state
                })
            }
        }
    }
}

#[derive(Default)]
pub struct StateGraph {
    nodes: HashMap<NodeId, Arc<dyn Node>>,
    edges: HashMap<NodeId, Edge>,
    entry: Option<NodeId>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Arc<dyn Node>) -> &mut Self {
        self.nodes.insert(node.id(), node);
        self
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        self.edges.insert(from, Edge::Direct(to));
        self
    }

    /// `targets` lists every node the route may return
    pub fn add_conditional_edges(
        &mut self,
        from: NodeId,
        route: impl Fn(&ChatState) -> NodeId + Send + Sync + 'static,
        targets: &[NodeId],
    ) -> &mut Self {
        self.edges.insert(
            from,
            Edge::Conditional {
                route: Arc::new(route),
                targets: targets.to_vec(),
            },
        );
        self
    }

    pub fn set_entry_point(&mut self, node: NodeId) -> &mut Self {
        self.entry = Some(node);
        self
    }

    /// Validate the wiring and freeze the graph
    pub fn compile(self) -> AppResult<CompiledGraph> {
        let entry = self
            .entry
            .ok_or_else(|| AppError::Graph("No entry point set".to_string()))?;
        if !self.nodes.contains_key(&entry) {
            return Err(AppError::Graph(format!("Entry point '{}' is not a registered node", entry)));
        }

        for id in self.nodes.keys() {
            if !self.edges.contains_key(id) {
                return Err(AppError::Graph(format!("Node '{}' has no outgoing edge", id)));
            }
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(AppError::Graph(format!("Edge from unknown node '{}'", from)));
            }
            let targets = match edge {
                Edge::Direct(to) => std::slice::from_ref(to),
                Edge::Conditional { targets, .. } => targets.as_slice(),
            };
            if let Some(bad) = targets
                .iter()
                .find(|t| **t != NodeId::End && !self.nodes.contains_key(t))
            {
                return Err(AppError::Graph(format!(
                    "Edge '{}' -> '{}' targets an unknown node",
                    from, bad
                )));
            }
        }

        debug!(nodes = self.nodes.len(), entry = %entry, "Graph compiled");
        Ok(CompiledGraph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
            max_steps: DEFAULT_MAX_STEPS,
        })
    }
}

#[derive(Clone)]
pub struct CompiledGraph {
    nodes: HashMap<NodeId, Arc<dyn Node>>,
    edges: HashMap<NodeId, Edge>,
    entry: NodeId,
    max_steps: usize,
}

impl CompiledGraph {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Run from the entry point until `END`, returning the final state
    pub async fn invoke(&self, mut state: ChatState) -> AppResult<ChatState> {
        let mut current = self.entry;
        let mut steps = 0;

        while current != NodeId::End {
            if steps >= self.max_steps {
                return Err(AppError::Graph(format!(
                    "Step limit of {} reached at node '{}'",
                    self.max_steps, current
                )));
            }
            steps += 1;

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| AppError::Graph(format!("Unknown node '{}'", current)))?;
            debug!(node = %current, step = steps, "Running node");
            state = node.run(state).await?;

            current = match self.edges.get(&current) {
                Some(Edge::Direct(to)) => *to,
                Some(Edge::Conditional { route, targets }) => {
                    let next = route(&state);
                    if !targets.contains(&next) {
                        return Err(AppError::Graph(format!(
                            "Route from '{}' returned unmapped node '{}'",
                            current, next
                        )));
                    }
                    next
                }
                None => NodeId::End,
            };
        }

        Ok(state)
    }
}

/// Wire the medical pipeline:
/// decider -> {rag | research | pubmed | websearch | multi_executor} -> aggregator -> safety_checker -> END
pub fn build_graph(decider: Decider, registry: &ToolRegistry, aggregator: Aggregator) -> AppResult<CompiledGraph> {
    let mut graph = StateGraph::new();

    graph
        .add_node(Arc::new(decider))
        .add_node(Arc::new(MultiExecutor::new(registry.clone())))
        .add_node(Arc::new(aggregator))
        .add_node(Arc::new(SafetyChecker));
    for kind in registry.kinds() {
        if let Some(tool) = registry.get(kind) {
            graph.add_node(Arc::new(ToolNode::new(tool)));
        }
    }

    graph.set_entry_point(NodeId::Decider).add_conditional_edges(
        NodeId::Decider,
        route_after_decider,
        &[
            NodeId::Rag,
            NodeId::Research,
            NodeId::Pubmed,
            NodeId::Websearch,
            NodeId::MultiExecutor,
        ],
    );
    for kind in ToolKind::ALL {
        graph.add_edge(kind.into(), NodeId::Aggregator);
    }
    graph
        .add_edge(NodeId::MultiExecutor, NodeId::Aggregator)
        .add_edge(NodeId::Aggregator, NodeId::SafetyChecker)
        .add_edge(NodeId::SafetyChecker, NodeId::End);

    let compiled = graph.compile()?;
    info!("Graph compiled with multi-tool support");
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ToolChoice;
    use crate::tools::tests::FakeTool;

    struct Append(NodeId, &'static str);

    #[async_trait]
    impl Node for Append {
        fn id(&self) -> NodeId {
            self.0
        }

        async fn run(&self, mut state: ChatState) -> AppResult<ChatState> {
            state.results.push(self.1.to_string());
            Ok(state)
        }
    }

    #[test]
    fn test_compile_rejects_unknown_target() {
        let mut graph = StateGraph::new();
        graph
            .add_node(Arc::new(Append(NodeId::Decider, "d")))
            .set_entry_point(NodeId::Decider)
            .add_edge(NodeId::Decider, NodeId::Aggregator);
        let err = graph.compile().err().unwrap();
        assert!(err.to_string().contains("aggregator"));
    }

    #[test]
    fn test_compile_requires_entry_and_edges() {
        let mut graph = StateGraph::new();
        graph.add_node(Arc::new(Append(NodeId::Decider, "d")));
        assert!(graph.compile().is_err());

        let mut graph = StateGraph::new();
        graph
            .add_node(Arc::new(Append(NodeId::Decider, "d")))
            .set_entry_point(NodeId::Decider);
        let err = graph.compile().err().unwrap();
        assert!(err.to_string().contains("no outgoing edge"));
    }

    #[tokio::test]
    async fn test_invoke_follows_conditional_edge() {
        let mut graph = StateGraph::new();
        graph
            .add_node(Arc::new(Append(NodeId::Decider, "decider")))
            .add_node(Arc::new(Append(NodeId::Rag, "rag")))
            .add_node(Arc::new(Append(NodeId::Pubmed, "pubmed")))
            .set_entry_point(NodeId::Decider)
            .add_conditional_edges(
                NodeId::Decider,
                |s: &ChatState| if s.query.contains("paper") { NodeId::Pubmed } else { NodeId::Rag },
                &[NodeId::Rag, NodeId::Pubmed],
            )
            .add_edge(NodeId::Rag, NodeId::End)
            .add_edge(NodeId::Pubmed, NodeId::End);
        let graph = graph.compile().unwrap();

        let out = graph.invoke(ChatState::new("a paper on statins")).await.unwrap();
        assert_eq!(out.results, vec!["decider", "pubmed"]);
        let out = graph.invoke(ChatState::new("flu")).await.unwrap();
        assert_eq!(out.results, vec!["decider", "rag"]);
    }

    #[tokio::test]
    async fn test_invoke_rejects_unmapped_route() {
        let mut graph = StateGraph::new();
        graph
            .add_node(Arc::new(Append(NodeId::Decider, "decider")))
            .add_node(Arc::new(Append(NodeId::Rag, "rag")))
            .set_entry_point(NodeId::Decider)
            .add_conditional_edges(NodeId::Decider, |_: &ChatState| NodeId::Websearch, &[NodeId::Rag])
            .add_edge(NodeId::Rag, NodeId::End);
        let graph = graph.compile().unwrap();
        assert!(graph.invoke(ChatState::new("q")).await.is_err());
    }

    #[tokio::test]
    async fn test_step_limit_stops_cycles() {
        let mut graph = StateGraph::new();
        graph
            .add_node(Arc::new(Append(NodeId::Rag, "rag")))
            .add_node(Arc::new(Append(NodeId::Pubmed, "pubmed")))
            .set_entry_point(NodeId::Rag)
            .add_edge(NodeId::Rag, NodeId::Pubmed)
            .add_edge(NodeId::Pubmed, NodeId::Rag);
        let graph = graph.compile().unwrap().with_max_steps(5);

        let err = graph.invoke(ChatState::new("loop")).await.unwrap_err();
        assert!(matches!(err, AppError::Graph(_)));
    }

    #[tokio::test]
    async fn test_tool_node_turns_errors_into_results() {
        let node = ToolNode::new(FakeTool::failing(ToolKind::Pubmed, "timeout"));
        assert_eq!(node.id(), NodeId::Pubmed);

        let mut state = ChatState::new("statins");
        state.tool = Some(ToolChoice::Pubmed);
        let out = node.run(state).await.unwrap();
        assert_eq!(out.results, vec!["Error searching PubMed: Internal error: timeout".to_string()]);
        assert_eq!(out.tool, Some(ToolChoice::Pubmed));
    }

    #[test]
    fn test_build_graph_requires_every_tool() {
        let registry = ToolRegistry::new()
            .with_tool(FakeTool::ok(ToolKind::Rag, &[]))
            .with_tool(FakeTool::ok(ToolKind::Pubmed, &[]));
        let result = build_graph(Decider::new(None, "router"), &registry, Aggregator::new(None, "a", "b"));
        assert!(result.is_err());
    }
}
