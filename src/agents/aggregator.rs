//! Aggregator Node
//!
//! Merges the tool results into one answer with the synthesizer LLM. The
//! primary model is tried first, then the fallback model; if both fail the
//! raw results are returned so the user still gets something.

use crate::agents::graph::{Node, NodeId};
use crate::agents::ChatState;
use crate::config::LLMConfig;
use crate::llm::LLM;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};
use async_trait::async_trait;
use tracing::{error, info, warn};

pub const NO_RESULTS_ANSWER: &str = "I couldn't find specific medical information for your query. \
     Please consult a healthcare professional for advice.";

pub const RAW_RESULTS_PREFIX: &str = "Error synthesizing response. Here are the raw results:\n\n";

pub struct Aggregator {
    llm: Option<LLM>,
    primary_model: String,
    fallback_model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Aggregator {
    pub fn new(llm: Option<LLM>, primary_model: impl Into<String>, fallback_model: impl Into<String>) -> Self {
        Self {
            llm,
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
            temperature: 0.3,
            max_tokens: 2048,
        }
    }

    pub fn from_config(llm: Option<LLM>, config: &LLMConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            ..Self::new(llm, config.primary_model.clone(), config.fallback_model.clone())
        }
    }

    /// Final answer for a query and its tool results
    pub async fn synthesize(&self, query: &str, results: &[String]) -> String {
        if results.is_empty() {
            warn!("No tool results to synthesize");
            return NO_RESULTS_ANSWER.to_string();
        }

        let context = results.join("\n\n");
        let Some(llm) = &self.llm else {
            warn!("No LLM API key configured, returning raw results");
            return format!("{}{}", RAW_RESULTS_PREFIX, context);
        };

        let prompt = create_synthesis_prompt(query, &context);

        info!(model = %self.primary_model, results = results.len(), "Synthesizing answer");
        match self.complete(llm, &self.primary_model, &prompt).await {
            Ok(answer) => return answer,
            Err(e) => warn!(model = %self.primary_model, error = %e, "Primary model failed, switching to fallback"),
        }

        match self.complete(llm, &self.fallback_model, &prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(model = %self.fallback_model, error = %e, "Fallback model failed");
                format!("{}{}", RAW_RESULTS_PREFIX, context)
            }
        }
    }

    async fn complete(&self, llm: &LLM, model: &str, prompt: &str) -> AppResult<String> {
        let request = LLMRequest {
            model: model.to_string(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            system_instruction: None,
        };

        let response = llm.create_chat_completion(&request).await?;
        if response.content.trim().is_empty() {
            return Err(AppError::LLMApi(format!("{} returned an empty answer", model)));
        }
        info!(model = %model, chars = response.content.len(), "Generated synthesized response");
        Ok(response.content)
    }
}

#[async_trait]
impl Node for Aggregator {
    fn id(&self) -> NodeId {
        NodeId::Aggregator
    }

    async fn run(&self, state: ChatState) -> AppResult<ChatState> {
        let final_answer = self.synthesize(&state.query, &state.results).await;
        Ok(ChatState { final_answer, ..state })
    }
}

fn create_synthesis_prompt(query: &str, context: &str) -> String {
    format!(
        r#"Role: You are the final medical response synthesizer.

Input: raw outputs from several sources (knowledge base, research, literature, news) for the user's question: "{query}"

Raw Outputs:
{context}

Task: Merge, deduplicate and refine all inputs into one coherent, authoritative answer for a medical chatbot.

Output Rules (STRICT):
- Produce a single, well-structured answer, not one section per source
- Use professional medical headings and concise bullet points
- Remove UI labels, timestamps, headlines and repeated disclaimers
- Resolve overlaps and contradictions using clinical best practice
- Summarize research into actionable clinical insights, not paper descriptions
- Use neutral, evidence-based language
- No raw URLs, no source or tool names, no meta commentary
- One short medical disclaimer at the end only

Required Structure:
### Brief Overview
[Concise summary of the condition or topic]

### Key Clinical Features
[Bullet points of symptoms, signs or characteristics]

### Diagnosis & Monitoring
[How it is identified and tracked]

### Treatment & Management
[Standard of care, therapies and lifestyle factors]

### Recent Evidence & Guideline Updates
[Concise summary of research and news findings]

### Practical Patient Guidance
[Actionable advice for the patient]

### Medical Disclaimer
(One line only: This AI assistant is for informational purposes only and does not constitute medical advice. Always consult a qualified healthcare professional.)

Tone: calm, expert, human-readable, non-alarmist.
Audience: general public with basic health literacy."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMAdapter;
    use crate::types::{LLMResponse, TokenUsage};
    use std::sync::{Arc, Mutex};

    /// Fails for the listed models, answers for the rest
    struct ModelFailures {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<(String, Option<f32>)>>,
    }

    #[async_trait]
    impl LLMAdapter for ModelFailures {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((request.model.clone(), request.temperature));
            if self.failing.iter().any(|m| *m == request.model) {
                return Err(AppError::LLMApi("model decommissioned".to_string()));
            }
            Ok(LLMResponse {
                content: format!("answer from {}", request.model),
                finish_reason: "stop".to_string(),
                usage: TokenUsage::default(),
            })
        }
    }

    fn aggregator(failing: Vec<&'static str>) -> (Aggregator, Arc<ModelFailures>) {
        let adapter = Arc::new(ModelFailures {
            failing,
            calls: Mutex::new(Vec::new()),
        });
        let llm = LLM::from_adapter(adapter.clone(), "scripted");
        (Aggregator::new(Some(llm), "big", "small"), adapter)
    }

    fn results() -> Vec<String> {
        vec!["Disease: Flu".to_string(), "**Paper**".to_string()]
    }

    #[tokio::test]
    async fn test_empty_results_skip_llm() {
        let (aggregator, adapter) = aggregator(vec![]);
        let answer = aggregator.synthesize("flu", &[]).await;
        assert_eq!(answer, NO_RESULTS_ANSWER);
        assert!(adapter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_primary_model_answers() {
        let (aggregator, adapter) = aggregator(vec![]);
        assert_eq!(aggregator.synthesize("flu", &results()).await, "answer from big");
        assert_eq!(*adapter.calls.lock().unwrap(), vec![("big".to_string(), Some(0.3))]);
    }

    #[tokio::test]
    async fn test_fallback_model_after_primary_failure() {
        let (aggregator, adapter) = aggregator(vec!["big"]);
        assert_eq!(aggregator.synthesize("flu", &results()).await, "answer from small");
        let models: Vec<String> = adapter.calls.lock().unwrap().iter().map(|c| c.0.clone()).collect();
        assert_eq!(models, vec!["big", "small"]);
    }

    #[tokio::test]
    async fn test_raw_results_when_both_fail() {
        let (aggregator, _) = aggregator(vec!["big", "small"]);
        let out = aggregator
            .run(ChatState {
                results: results(),
                ..ChatState::new("flu")
            })
            .await
            .unwrap();
        assert_eq!(
            out.final_answer,
            "Error synthesizing response. Here are the raw results:\n\nDisease: Flu\n\n**Paper**"
        );
        assert_eq!(out.results, results());
    }

    #[test]
    fn test_without_llm_returns_raw_results() {
        let aggregator = Aggregator::new(None, "big", "small");
        let answer = tokio_test::block_on(aggregator.synthesize("flu", &results()));
        assert!(answer.starts_with(RAW_RESULTS_PREFIX));
    }

    #[test]
    fn test_prompt_lists_required_sections() {
        let prompt = create_synthesis_prompt("what is gout", "Disease: Gout");
        for heading in [
            "### Brief Overview",
            "### Key Clinical Features",
            "### Diagnosis & Monitoring",
            "### Treatment & Management",
            "### Recent Evidence & Guideline Updates",
            "### Practical Patient Guidance",
            "### Medical Disclaimer",
        ] {
            assert!(prompt.contains(heading), "missing {}", heading);
        }
        assert!(prompt.contains("\"what is gout\""));
        assert!(prompt.contains("Disease: Gout"));
    }
}
