use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TicketError;

fn parse_env_or<T: FromStr>(var: &str, default: T) -> T
where
    T::Err: fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: FromStr>(var: &str) -> Option<T>
where
    T::Err: fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

/// Parse `CATEGORY_PRODUCT_MAP`.
/// Format: comma-separated `category:product` pairs, e.g. `FTTH:Broadband,IPTV:TV`
fn parse_category_overrides() -> HashMap<String, String> {
    match env::var("CATEGORY_PRODUCT_MAP") {
        Ok(val) if !val.is_empty() => val
            .split(',')
            .filter_map(|pair| {
                let mut parts = pair.splitn(2, ':');
                let category = parts.next()?.trim();
                let product = parts.next()?.trim();
                if category.is_empty() || product.is_empty() {
                    tracing::warn!(
                        "Invalid category mapping '{}' in CATEGORY_PRODUCT_MAP, skipping",
                        pair
                    );
                    None
                } else {
                    Some((category.to_uppercase(), product.to_string()))
                }
            })
            .collect(),
        _ => HashMap::new(),
    }
}

fn parse_list(var: &str) -> Vec<String> {
    env::var(var)
        .map(|value| {
            value
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub busy_timeout_ms: u64,
    pub journal_mode: String,
}

/// Supported LLM providers. Converted from configuration once, at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Locally hosted Ollama server
    Ollama,
    /// OpenRouter cloud API
    OpenRouter,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenRouter => "openrouter",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => "qwen2.5:7b",
            Self::OpenRouter => "qwen/qwen2.5-vl-72b-instruct:free",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openrouter" => Ok(Self::OpenRouter),
            _ => Err(format!(
                "Unknown LLM provider: {s} (expected one of: {})",
                KNOWN_LLM_PROVIDERS.join(", ")
            )),
        }
    }
}

/// Known LLM providers, in the order they are offered to users.
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["ollama", "openrouter"];

/// LLM configuration for the summary provider
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    // Per-attempt timeout in seconds
    pub timeout_secs: u64,
    // Total attempts per group, including the first one
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub temperature: f32,
    pub num_ctx: u32,
}

impl LlmConfig {
    /// Defaults for a provider, with no environment lookups.
    pub fn for_provider(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 60,
            max_attempts: 3,
            retry_delay_ms: 2000,
            temperature: 0.1,
            num_ctx: 4096,
        }
    }

    /// Point this configuration at another provider. Model and base URL go back to the
    /// new provider's defaults; credentials and retry/timeout tuning are kept.
    pub fn switch_provider(&mut self, provider: ProviderKind) {
        if provider == self.provider {
            return;
        }
        self.provider = provider;
        self.model = provider.default_model().to_string();
        self.base_url = None;
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// What a cache write does when an entry already exists under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWritePolicy {
    /// Regeneration wins: the newer summary replaces the stored one.
    #[default]
    Overwrite,
    /// The first stored summary is kept and later writes are ignored.
    KeepExisting,
}

impl FromStr for CacheWritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" | "replace" => Ok(Self::Overwrite),
            "keep" | "keep_existing" | "skip" => Ok(Self::KeepExisting),
            _ => Err(format!("Unknown cache write policy: {s}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub write_policy: CacheWritePolicy,
    /// Entries kept in the in-process LRU layer; 0 disables the layer.
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            write_policy: CacheWritePolicy::Overwrite,
            memory_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessingConfig {
    pub excluded_categories: Vec<String>,
    pub category_overrides: HashMap<String, String>,
    pub concurrency: usize,
}

/// An unset or blank `LLM_PROVIDER` means Ollama; anything else must name a provider.
fn provider_from_env() -> crate::error::Result<ProviderKind> {
    match env::var("LLM_PROVIDER") {
        Ok(value) if !value.trim().is_empty() => value
            .parse()
            .map_err(|e| TicketError::Config(format!("LLM_PROVIDER: {e}"))),
        _ => Ok(ProviderKind::Ollama),
    }
}

impl Config {
    pub fn from_env() -> crate::error::Result<Self> {
        let provider = provider_from_env()?;

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "file:ticket_summaries.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                busy_timeout_ms: parse_env_or("DATABASE_BUSY_TIMEOUT_MS", 5000),
                journal_mode: env::var("DATABASE_JOURNAL_MODE")
                    .unwrap_or_else(|_| "WAL".to_string()),
            },
            llm: LlmConfig {
                provider,
                model: env::var("LLM_MODEL")
                    .unwrap_or_else(|_| provider.default_model().to_string()),
                api_key: env::var("LLM_API_KEY")
                    .or_else(|_| env::var("OPENROUTER_API_KEY"))
                    .ok()
                    .filter(|key| !key.trim().is_empty()),
                base_url: env::var("LLM_BASE_URL").ok(),
                timeout_secs: parse_env_or("LLM_TIMEOUT", 60),
                max_attempts: parse_env_or("LLM_MAX_ATTEMPTS", 3).max(1),
                retry_delay_ms: parse_env_or("LLM_RETRY_DELAY_MS", 2000),
                temperature: parse_env_or("LLM_TEMPERATURE", 0.1),
                num_ctx: parse_env_or("OLLAMA_NUM_CTX", 4096),
            },
            cache: CacheConfig {
                enabled: parse_env_or("CACHE_ENABLED", true),
                write_policy: parse_env_opt("CACHE_WRITE_POLICY").unwrap_or_default(),
                memory_capacity: parse_env_or("CACHE_MEMORY_CAPACITY", 256),
            },
            processing: ProcessingConfig {
                excluded_categories: parse_list("EXCLUDED_CATEGORIES"),
                category_overrides: parse_category_overrides(),
                concurrency: parse_env_or("PIPELINE_CONCURRENCY", 1).max(1),
            },
        })
    }
}
