use async_trait::async_trait;
use crate::config::LLMConfig;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Connection settings for one chat-completion provider.
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
}

impl From<&LLMConfig> for LLMProviderConfig {
    fn from(config: &LLMConfig) -> Self {
        Self {
            name: config.provider.clone(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let adapter: Box<dyn LLMAdapter> = match provider.name.as_str() {
            // Any endpoint speaking the OpenAI chat-completions dialect
            "openai" | "openrouter" | "groq" | "ollama" => Box::new(
                crate::llm::openai::OpenAIAdapter::new(&provider.base_url, &provider.api_key),
            ),
            other => {
                return Err(AppError::LLMApi(format!("Unsupported provider: {}", other)));
            }
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
        })
    }

    /// Wraps an existing adapter.
    pub fn with_adapter(name: impl Into<String>, adapter: Box<dyn LLMAdapter>) -> Self {
        Self {
            adapter,
            provider_name: name.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}
