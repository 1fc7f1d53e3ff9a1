use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::LLMConfig;
use crate::types::{AppResult, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for an LLM provider
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    pub api_base: Option<String>,
}

#[derive(Clone)]
pub struct LLM {
    adapter: Arc<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let kind: LLMProvider = provider.name.parse()?;
        let adapter: Arc<dyn LLMAdapter> = match (kind, provider.api_base.as_deref()) {
            (LLMProvider::Groq, None) => {
                Arc::new(crate::llm::groq::GroqAdapter::new(&provider.api_key))
            }
            (LLMProvider::Groq, Some(base)) => Arc::new(
                crate::llm::groq::GroqAdapter::with_api_base(&provider.api_key, base),
            ),
            (LLMProvider::OpenAI, None) => {
                Arc::new(crate::llm::openai::OpenAIAdapter::new(&provider.api_key))
            }
            (LLMProvider::OpenAI, Some(base)) => Arc::new(
                crate::llm::openai::OpenAIAdapter::new_with_api_base(&provider.api_key, base),
            ),
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
        })
    }

    /// Build the configured provider, or `None` when no API key is set
    pub fn from_config(config: &LLMConfig) -> AppResult<Option<Self>> {
        let Some(api_key) = config.active_api_key() else {
            debug!(provider = %config.provider, "No LLM API key configured");
            return Ok(None);
        };

        Self::new(LLMProviderConfig {
            name: config.provider.clone(),
            api_key,
            api_base: config.api_base.clone(),
        })
        .map(Some)
    }

    /// Wrap an existing adapter (used to plug in alternative backends)
    pub fn from_adapter(adapter: Arc<dyn LLMAdapter>, provider_name: impl Into<String>) -> Self {
        Self {
            adapter,
            provider_name: provider_name.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}
