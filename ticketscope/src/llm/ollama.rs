use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{Result, TicketError};
use crate::llm::prompts::SYSTEM_PROMPT;

/// Client for a local Ollama server using its native generate endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    num_ctx: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    format: &'static str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                TicketError::Config(format!("Failed to create Ollama HTTP client: {error}"))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            num_ctx: config.num_ctx,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system: SYSTEM_PROMPT,
            format: "json",
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_ctx: self.num_ctx,
            },
        };

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| TicketError::Provider(format!("Ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TicketError::Provider(format!(
                "Ollama returned status {status}: {}",
                text.trim()
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TicketError::Provider(format!("Malformed Ollama response: {e}")))?;

        if generated.response.trim().is_empty() {
            return Err(TicketError::Provider(
                "Ollama returned an empty response".to_string(),
            ));
        }

        tracing::debug!(
            model = %self.model,
            response_len = generated.response.len(),
            "Ollama response received"
        );
        Ok(generated.response)
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| TicketError::Provider(format!("Ollama is not reachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TicketError::Provider(format!(
                "Ollama model listing returned status {status}"
            )));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            model: "qwen2.5:7b",
            prompt: "p",
            system: SYSTEM_PROMPT,
            format: "json",
            stream: false,
            options: GenerateOptions {
                temperature: 0.5,
                num_ctx: 4096,
            },
        };
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["format"], "json");
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["num_ctx"], 4096);
        assert_eq!(value["options"]["temperature"], 0.5);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let mut config = LlmConfig::for_provider(ProviderKind::Ollama);
        config.base_url = Some("http://ollama:11434/".to_string());
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://ollama:11434");
        assert_eq!(client.model(), "qwen2.5:7b");
    }
}
