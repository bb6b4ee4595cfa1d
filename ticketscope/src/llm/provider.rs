use async_trait::async_trait;

use crate::config::{LlmConfig, ProviderKind};
use crate::error::Result;
use crate::llm::api::OpenRouterClient;
use crate::llm::ollama::OllamaClient;

/// Anything that turns a prompt into raw model text.
///
/// `provider_id` and `model_id` feed the cache key, so two generators that would
/// answer differently must report different ids.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
    fn provider_id(&self) -> &str;
    fn model_id(&self) -> &str;
}

#[derive(Clone)]
pub enum LlmBackend {
    Ollama(OllamaClient),
    OpenRouter(OpenRouterClient),
}

#[derive(Clone)]
pub struct LlmProvider {
    kind: ProviderKind,
    backend: LlmBackend,
}

impl LlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let backend = match config.provider {
            ProviderKind::Ollama => LlmBackend::Ollama(OllamaClient::new(config)?),
            ProviderKind::OpenRouter => LlmBackend::OpenRouter(OpenRouterClient::new(config)?),
        };

        Ok(Self {
            kind: config.provider,
            backend,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        match &self.backend {
            LlmBackend::Ollama(client) => client.list_models().await,
            LlmBackend::OpenRouter(client) => client.list_models().await,
        }
    }
}

#[async_trait]
impl TextGenerator for LlmProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match &self.backend {
            LlmBackend::Ollama(client) => client.complete(prompt).await,
            LlmBackend::OpenRouter(client) => client.complete(prompt).await,
        }
    }

    fn provider_id(&self) -> &str {
        self.kind.as_str()
    }

    fn model_id(&self) -> &str {
        match &self.backend {
            LlmBackend::Ollama(client) => client.model(),
            LlmBackend::OpenRouter(client) => client.model(),
        }
    }
}
