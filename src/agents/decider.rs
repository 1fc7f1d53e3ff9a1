//! Decider Node
//!
//! Chooses the tool route for a query. The router LLM is asked for a small
//! JSON decision; whenever that is unavailable or unusable, a keyword
//! heuristic takes over so a route is always produced.

use crate::agents::graph::{Node, NodeId};
use crate::agents::{ChatState, RouteMetadata, ToolChoice};
use crate::config::LLMConfig;
use crate::llm::LLM;
use crate::tools::ToolKind;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, warn};

const ROUTER_SYSTEM_PROMPT: &str = r#"You route medical questions to search tools.

Tools:
- rag: local knowledge base of diseases, symptoms and treatments. Use for basic "what are the symptoms of X" or "how is X treated" questions.
- pubmed: PubMed biomedical literature. Use when the user asks for studies, trials, papers or clinical evidence.
- research: scholarly search (Google Scholar). Use for mechanisms, reviews, meta-analyses and in-depth research questions.
- websearch: general web search. Use for news, recent events, outbreaks and the latest guidelines.
- multi: several of the above when the question clearly needs more than one source.

Reply with JSON only, no prose:
{"tool": "<rag|pubmed|research|websearch|multi>", "tools": ["<tool>", ...], "queries": {"<tool>": "<sub-query>"}}

"tools" and "queries" are only needed for "multi"; each sub-query should be a focused search string for that tool."#;

#[derive(Debug, Deserialize)]
struct RouterDecision {
    tool: String,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    queries: HashMap<String, String>,
}

pub struct Decider {
    llm: Option<LLM>,
    model: String,
}

impl Decider {
    pub fn new(llm: Option<LLM>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    pub fn from_config(llm: Option<LLM>, config: &LLMConfig) -> Self {
        Self::new(llm, config.router_model.clone())
    }

    /// Route for a query: the LLM decision when usable, the heuristic otherwise
    pub async fn decide(&self, query: &str) -> (ToolChoice, RouteMetadata) {
        if let Some(llm) = &self.llm {
            match self.ask_router(llm, query).await {
                Ok(decision) => {
                    if let Some(route) = resolve_decision(decision) {
                        return route;
                    }
                    warn!("Router decision named no usable tool, using keyword heuristic");
                }
                Err(e) => warn!(error = %e, "Router LLM failed, using keyword heuristic"),
            }
        }
        heuristic_route(query)
    }

    async fn ask_router(&self, llm: &LLM, query: &str) -> AppResult<RouterDecision> {
        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::user(format!("Question: {}", query))],
            max_tokens: Some(256),
            temperature: Some(0.0),
            system_instruction: Some(ROUTER_SYSTEM_PROMPT.to_string()),
        };

        let response = llm.create_chat_completion(&request).await?;
        parse_decision(&response.content)
    }
}

#[async_trait]
impl Node for Decider {
    fn id(&self) -> NodeId {
        NodeId::Decider
    }

    async fn run(&self, state: ChatState) -> AppResult<ChatState> {
        let (tool, metadata) = self.decide(&state.query).await;
        info!(tool = %tool, sub_tools = ?metadata.tools, "Decider selected route");
        Ok(ChatState {
            tool: Some(tool),
            metadata,
            ..state
        })
    }
}

/// Conditional edge out of the decider
pub fn route_after_decider(state: &ChatState) -> NodeId {
    match state.tool {
        Some(ToolChoice::Multi) => NodeId::MultiExecutor,
        Some(choice) => choice.tool_kind().map(NodeId::from).unwrap_or(NodeId::Rag),
        None => NodeId::Rag,
    }
}

/// Remove a surrounding markdown code fence, if any
fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_decision(reply: &str) -> AppResult<RouterDecision> {
    let body = strip_code_fences(reply);
    serde_json::from_str(body).or_else(|e| {
        // tolerate prose around the object
        match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end])
                .map_err(|_| AppError::LLMApi(format!("Unparseable router reply: {}", e))),
            _ => Err(AppError::LLMApi(format!("Unparseable router reply: {}", e))),
        }
    })
}

/// Validate a router decision; `None` means fall back to the heuristic
fn resolve_decision(decision: RouterDecision) -> Option<(ToolChoice, RouteMetadata)> {
    if !decision.tool.trim().eq_ignore_ascii_case("multi") {
        let kind = ToolKind::parse(&decision.tool)?;
        return Some((kind.into(), RouteMetadata::default()));
    }

    let mut kinds: Vec<ToolKind> = Vec::new();
    for name in &decision.tools {
        match ToolKind::parse(name) {
            Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
            Some(_) => {}
            None => warn!(tool = %name, "Router named an unknown tool"),
        }
    }

    match kinds.as_slice() {
        [] => None,
        [single] => Some(((*single).into(), RouteMetadata::default())),
        _ => {
            let queries = decision
                .queries
                .iter()
                .filter_map(|(name, query)| {
                    let kind = ToolKind::parse(name)?;
                    let query = query.trim();
                    (kinds.contains(&kind) && !query.is_empty())
                        .then(|| (kind.as_str().to_string(), query.to_string()))
                })
                .collect();
            Some((
                ToolChoice::Multi,
                RouteMetadata {
                    tools: kinds.iter().map(|k| k.as_str().to_string()).collect(),
                    queries,
                },
            ))
        }
    }
}

const WEBSEARCH_KEYWORDS: &[&str] = &["news", "latest", "recent", "current", "today", "this year", "outbreak", "update"];
const PUBMED_KEYWORDS: &[&str] = &["pubmed", "study", "studies", "trial", "paper", "clinical evidence"];
const RESEARCH_KEYWORDS: &[&str] = &["research", "mechanism", "meta-analysis", "review", "scholar"];
const RAG_KEYWORDS: &[&str] = &["symptom", "treat", "disease", "cure", "cause"];
// Prefix matching would catch "significant" and "signal"
const RAG_WHOLE_WORDS: &[&str] = &["sign", "signs"];

fn matches_any(text: &str, words: &[&str], keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| {
        if kw.contains(' ') || kw.contains('-') {
            text.contains(kw)
        } else {
            words.iter().any(|w| w.starts_with(kw))
        }
    })
}

/// Keyword routing used without a usable LLM decision
pub fn heuristic_route(query: &str) -> (ToolChoice, RouteMetadata) {
    let text = query.to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let matched: Vec<ToolKind> = ToolKind::ALL
        .into_iter()
        .filter(|kind| {
            let keywords = match kind {
                ToolKind::Rag => RAG_KEYWORDS,
                ToolKind::Pubmed => PUBMED_KEYWORDS,
                ToolKind::Research => RESEARCH_KEYWORDS,
                ToolKind::Websearch => WEBSEARCH_KEYWORDS,
            };
            matches_any(&text, &words, keywords)
                || (*kind == ToolKind::Rag && words.iter().any(|w| RAG_WHOLE_WORDS.contains(w)))
        })
        .collect();

    match matched.as_slice() {
        [] => (ToolChoice::Rag, RouteMetadata::default()),
        [single] => ((*single).into(), RouteMetadata::default()),
        _ => (
            ToolChoice::Multi,
            RouteMetadata {
                tools: matched.iter().map(|k| k.as_str().to_string()).collect(),
                queries: HashMap::new(),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMAdapter;
    use crate::types::{LLMResponse, TokenUsage};
    use std::sync::{Arc, Mutex};

    struct ScriptedLLM {
        reply: AppResult<String>,
        requests: Mutex<Vec<LLMRequest>>,
    }

    #[async_trait]
    impl LLMAdapter for ScriptedLLM {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(content) => Ok(LLMResponse {
                    content: content.clone(),
                    finish_reason: "stop".to_string(),
                    usage: TokenUsage::default(),
                }),
                Err(e) => Err(AppError::LLMApi(e.to_string())),
            }
        }
    }

    fn decider(reply: AppResult<String>) -> (Decider, Arc<ScriptedLLM>) {
        let adapter = Arc::new(ScriptedLLM {
            reply,
            requests: Mutex::new(Vec::new()),
        });
        let llm = LLM::from_adapter(adapter.clone(), "scripted");
        (Decider::new(Some(llm), "llama-3.1-8b-instant"), adapter)
    }

    #[tokio::test]
    async fn test_llm_single_tool() {
        let (decider, adapter) = decider(Ok(r#"{"tool": "pubmed"}"#.to_string()));
        let (tool, metadata) = decider.decide("trials on metformin").await;
        assert_eq!(tool, ToolChoice::Pubmed);
        assert!(metadata.tools.is_empty());

        let requests = adapter.requests.lock().unwrap();
        assert_eq!(requests[0].model, "llama-3.1-8b-instant");
        assert_eq!(requests[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_llm_multi_in_code_fence() {
        let reply = "```json\n{\"tool\": \"multi\", \"tools\": [\"pubmed\", \"websearch\", \"pubmed\"], \
                     \"queries\": {\"pubmed\": \"semaglutide trials\", \"websearch\": \"semaglutide news\"}}\n```";
        let (decider, _) = decider(Ok(reply.to_string()));
        let (tool, metadata) = decider.decide("semaglutide evidence and news").await;

        assert_eq!(tool, ToolChoice::Multi);
        assert_eq!(metadata.tools, vec!["pubmed", "websearch"]);
        assert_eq!(metadata.queries.get("pubmed").map(String::as_str), Some("semaglutide trials"));
        assert_eq!(metadata.queries.get("websearch").map(String::as_str), Some("semaglutide news"));
    }

    #[tokio::test]
    async fn test_multi_with_one_valid_tool_collapses() {
        let reply = r#"{"tool": "multi", "tools": ["research", "calculator"]}"#;
        let (decider, _) = decider(Ok(reply.to_string()));
        let (tool, metadata) = decider.decide("mechanism of statins").await;
        assert_eq!(tool, ToolChoice::Research);
        assert!(metadata.tools.is_empty());
    }

    #[tokio::test]
    async fn test_unusable_decisions_fall_back_to_heuristic() {
        for reply in [
            Ok(r#"{"tool": "multi", "tools": ["calculator"]}"#.to_string()),
            Ok(r#"{"tool": "horoscope"}"#.to_string()),
            Ok("I think pubmed is best".to_string()),
            Err(AppError::LLMApi("rate limited".to_string())),
        ] {
            let (decider, _) = decider(reply);
            let (tool, _) = decider.decide("latest news on measles").await;
            assert_eq!(tool, ToolChoice::Websearch);
        }
    }

    #[tokio::test]
    async fn test_without_llm_uses_heuristic() {
        let decider = Decider::new(None, "router");
        let out = decider.run(ChatState::new("what are the symptoms of asthma")).await.unwrap();
        assert_eq!(out.tool, Some(ToolChoice::Rag));
        assert_eq!(route_after_decider(&out), NodeId::Rag);
    }

    #[test]
    fn test_heuristic_routes() {
        assert_eq!(heuristic_route("hello there").0, ToolChoice::Rag);
        assert_eq!(heuristic_route("Find a PubMed paper on aspirin").0, ToolChoice::Pubmed);
        assert_eq!(heuristic_route("meta-analysis of vitamin D").0, ToolChoice::Research);

        let (tool, metadata) = heuristic_route("latest studies on the symptoms of long covid");
        assert_eq!(tool, ToolChoice::Multi);
        assert_eq!(metadata.tools, vec!["rag", "pubmed", "websearch"]);
        assert!(metadata.queries.is_empty());
    }

    #[test]
    fn test_sign_matches_whole_words_only() {
        let (tool, _) = heuristic_route("latest news on the significant measles outbreak");
        assert_eq!(tool, ToolChoice::Websearch);
        assert_eq!(heuristic_route("early warning signs of sepsis").0, ToolChoice::Rag);
        assert_eq!(heuristic_route("is a rash a sign of measles").0, ToolChoice::Rag);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }

    #[test]
    fn test_parse_decision_with_surrounding_prose() {
        let decision = parse_decision("Sure! {\"tool\": \"rag\"} Hope that helps.").unwrap();
        assert_eq!(decision.tool, "rag");
        assert!(parse_decision("no json here").is_err());
    }

    #[test]
    fn test_route_after_decider() {
        let mut state = ChatState::new("q");
        state.tool = Some(ToolChoice::Multi);
        assert_eq!(route_after_decider(&state), NodeId::MultiExecutor);
        state.tool = Some(ToolChoice::Websearch);
        assert_eq!(route_after_decider(&state), NodeId::Websearch);
    }
}
