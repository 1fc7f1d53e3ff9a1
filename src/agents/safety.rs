// Final guard: every answer leaves with a medical disclaimer

use crate::agents::graph::{Node, NodeId};
use crate::agents::ChatState;
use crate::types::AppResult;
use async_trait::async_trait;
use tracing::debug;

pub const DISCLAIMER_MARKER: &str = "Medical Disclaimer";

pub const DISCLAIMER: &str = "\n---\n**⚠️ Medical Disclaimer:** This AI assistant is for informational purposes only \
     and does not constitute medical advice. Always consult a qualified healthcare professional for diagnosis and treatment.\n";

pub struct SafetyChecker;

impl SafetyChecker {
    pub fn apply(answer: &str) -> String {
        if answer.contains(DISCLAIMER_MARKER) {
            answer.to_string()
        } else {
            format!("{}{}", answer, DISCLAIMER)
        }
    }
}

#[async_trait]
impl Node for SafetyChecker {
    fn id(&self) -> NodeId {
        NodeId::SafetyChecker
    }

    async fn run(&self, state: ChatState) -> AppResult<ChatState> {
        let final_answer = Self::apply(&state.final_answer);
        debug!(appended = final_answer.len() != state.final_answer.len(), "Safety check done");
        Ok(ChatState { final_answer, ..state })
    }
}
