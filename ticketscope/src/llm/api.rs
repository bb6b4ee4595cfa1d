use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use serde::Deserialize;

use crate::{
    config::LlmConfig,
    error::{Result, TicketError},
    llm::prompts::SYSTEM_PROMPT,
};

/// Chat-completions client for OpenAI-compatible cloud providers (OpenRouter).
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelListEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelListEntry {
    id: String,
}

impl OpenRouterClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                TicketError::LlmUnavailable(format!(
                    "API key required for provider {}",
                    config.provider
                ))
            })?;
        let base_url = config.base_url().trim_end_matches('/').to_string();

        let openai_config = OpenAIConfig::new()
            .with_api_base(base_url.clone())
            .with_api_key(api_key.clone());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                TicketError::Config(format!("Failed to create LLM HTTP client: {error}"))
            })?;

        let client = Client::with_config(openai_config)
            .with_http_client(http.clone())
            .with_backoff(single_attempt());

        Ok(Self {
            client,
            http,
            base_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = self.build_request(prompt)?;

        match self.client.chat().create(request).await {
            Ok(response) => Self::extract_content(response),
            Err(error) => {
                if let Some(auth_error) = Self::auth_error(&error) {
                    return Err(auth_error);
                }
                Err(Self::map_openai_error(error))
            }
        }
    }

    /// Model ids advertised by the provider's `/models` endpoint.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| TicketError::Provider(format!("Model listing failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TicketError::Provider(format!(
                "Model listing returned status {status}"
            )));
        }

        let list: ModelList = response.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    fn build_request(&self, prompt: &str) -> Result<CreateChatCompletionRequest> {
        if prompt.trim().is_empty() {
            return Err(TicketError::Provider("Prompt cannot be empty".to_string()));
        }

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|error| {
                    TicketError::Provider(format!("Invalid system prompt: {error}"))
                })?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|error| TicketError::Provider(format!("Invalid user prompt: {error}")))?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|error| {
                TicketError::Provider(format!("Invalid LLM completion request: {error}"))
            })
    }

    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TicketError::Provider("LLM response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if message.trim().is_empty() {
            return Err(TicketError::Provider(
                "LLM response contained empty content".to_string(),
            ));
        }

        Ok(message)
    }

    fn auth_error(error: &OpenAIError) -> Option<TicketError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::UNAUTHORIZED)
                    || reqwest_error.status() == Some(reqwest::StatusCode::FORBIDDEN) =>
            {
                Some(TicketError::Provider(format!(
                    "LLM authentication failed: {reqwest_error}"
                )))
            }
            OpenAIError::ApiError(api_error) if Self::is_auth_api_error(api_error) => Some(
                TicketError::Provider(format!("LLM authentication failed: {api_error}")),
            ),
            _ => None,
        }
    }

    fn is_auth_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("unauthorized")
            || message.contains("invalid api key")
            || message.contains("no auth credentials")
            || code.contains("invalid_api_key")
            || code == "401"
    }

    fn map_openai_error(error: OpenAIError) -> TicketError {
        match error {
            OpenAIError::Reqwest(reqwest_error) => {
                TicketError::Provider(format!("LLM request failed: {reqwest_error}"))
            }
            OpenAIError::ApiError(api_error) => {
                TicketError::Provider(format!("LLM API error: {api_error}"))
            }
            OpenAIError::JSONDeserialize(err) => {
                TicketError::Provider(format!("Failed to decode LLM response: {err}"))
            }
            other => TicketError::Provider(other.to_string()),
        }
    }
}

/// async-openai retries 429 and 5xx internally. One HTTP request per call, so every
/// retry goes through the generator's attempt budget and delay.
fn single_attempt() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoff {
        max_elapsed_time: Some(Duration::ZERO),
        ..Default::default()
    }
}
