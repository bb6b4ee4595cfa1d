use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::{CacheConfig, CacheWritePolicy, LlmConfig};
use crate::db::SummaryStore;
use crate::error::{Result, TicketError};
use crate::hashing::content_hash;
use crate::llm::prompts::ticket_summary_prompt;
use crate::llm::TextGenerator;
use crate::models::{CacheEntry, CacheKey, ContentHash, Summary, SummarySource, TicketGroup};
use crate::summary::parser::parse_summary;

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Total attempts per group, including the first.
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub retry_delay: Duration,
    pub write_policy: CacheWritePolicy,
}

impl GeneratorOptions {
    pub fn from_config(llm: &LlmConfig, cache: &CacheConfig) -> Self {
        Self {
            max_attempts: llm.max_attempts.max(1),
            attempt_timeout: llm.attempt_timeout(),
            retry_delay: llm.retry_delay(),
            write_policy: cache.write_policy,
        }
    }
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(2),
            write_policy: CacheWritePolicy::Overwrite,
        }
    }
}

/// Result of one `generate`/`regenerate` call.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSummary {
    pub summary: Summary,
    pub content_hash: ContentHash,
    pub source: SummarySource,
    /// Provider attempts made; 0 for a cache hit.
    pub attempts: u32,
    /// Cache faults that were tolerated while producing this summary.
    pub cache_warnings: Vec<String>,
}

pub struct SummaryGenerator {
    generator: Arc<dyn TextGenerator>,
    store: Option<Arc<dyn SummaryStore>>,
    options: GeneratorOptions,
}

impl SummaryGenerator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Option<Arc<dyn SummaryStore>>,
        options: GeneratorOptions,
    ) -> Self {
        Self {
            generator,
            store,
            options,
        }
    }

    pub fn provider_id(&self) -> &str {
        self.generator.provider_id()
    }

    pub fn model_id(&self) -> &str {
        self.generator.model_id()
    }

    pub fn cache_key(&self, group: &TicketGroup) -> CacheKey {
        CacheKey::new(
            content_hash(group),
            self.generator.provider_id(),
            self.generator.model_id(),
        )
    }

    /// Return the cached summary for this group and provider/model, or generate and
    /// cache a new one.
    pub async fn generate(
        &self,
        group: &TicketGroup,
        cancel: &CancellationToken,
    ) -> Result<GeneratedSummary> {
        let mut warnings = Vec::new();
        let mut generated = self.generate_collecting(group, false, cancel, &mut warnings).await?;
        generated.cache_warnings = warnings;
        Ok(generated)
    }

    /// Generate a fresh summary regardless of the cache and overwrite the stored entry.
    pub async fn regenerate(
        &self,
        group: &TicketGroup,
        cancel: &CancellationToken,
    ) -> Result<GeneratedSummary> {
        let mut warnings = Vec::new();
        let mut generated = self.generate_collecting(group, true, cancel, &mut warnings).await?;
        generated.cache_warnings = warnings;
        Ok(generated)
    }

    /// Shared path of `generate` and `regenerate`. Tolerated cache faults are pushed
    /// into `warnings` as they happen, so they survive a failed generation; the
    /// returned summary leaves its own `cache_warnings` empty.
    pub(crate) async fn generate_collecting(
        &self,
        group: &TicketGroup,
        regenerate: bool,
        cancel: &CancellationToken,
        warnings: &mut Vec<String>,
    ) -> Result<GeneratedSummary> {
        let key = self.cache_key(group);

        if regenerate {
            return self
                .generate_and_store(group, key, CacheWritePolicy::Overwrite, warnings, cancel)
                .await;
        }

        if let Some(store) = &self.store {
            match store.get(&key).await {
                Ok(Some(entry)) => {
                    tracing::debug!(
                        customer = %group.key.customer_number,
                        product = %group.key.product,
                        content_hash = %key.content_hash.short(),
                        "Summary cache hit"
                    );
                    return Ok(GeneratedSummary {
                        summary: entry.summary,
                        content_hash: key.content_hash,
                        source: SummarySource::Cache,
                        attempts: 0,
                        cache_warnings: Vec::new(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        customer = %group.key.customer_number,
                        product = %group.key.product,
                        error = %e,
                        "Summary cache lookup failed, generating instead"
                    );
                    warnings.push(format!("cache lookup failed: {e}"));
                }
            }
        }

        self.generate_and_store(group, key, self.options.write_policy, warnings, cancel)
            .await
    }

    async fn generate_and_store(
        &self,
        group: &TicketGroup,
        key: CacheKey,
        policy: CacheWritePolicy,
        warnings: &mut Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<GeneratedSummary> {
        let (summary, attempts) = self.generate_with_retry(group, &key, cancel).await?;

        if let Some(store) = &self.store {
            let entry = CacheEntry {
                content_hash: key.content_hash.clone(),
                provider: key.provider.clone(),
                model: key.model.clone(),
                customer_number: group.key.customer_number.clone(),
                product: group.key.product.clone(),
                summary: summary.clone(),
                created_at: Utc::now(),
            };
            if let Err(e) = store.put(&entry, policy).await {
                tracing::warn!(
                    customer = %group.key.customer_number,
                    product = %group.key.product,
                    content_hash = %key.content_hash.short(),
                    error = %e,
                    "Failed to cache generated summary"
                );
                warnings.push(format!("cache write failed: {e}"));
            }
        }

        Ok(GeneratedSummary {
            summary,
            content_hash: key.content_hash,
            source: SummarySource::Generated,
            attempts,
            cache_warnings: Vec::new(),
        })
    }

    async fn generate_with_retry(
        &self,
        group: &TicketGroup,
        key: &CacheKey,
        cancel: &CancellationToken,
    ) -> Result<(Summary, u32)> {
        let prompt = ticket_summary_prompt(group);
        let max_attempts = self.options.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 && !self.options.retry_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(TicketError::Cancelled),
                    _ = tokio::time::sleep(self.options.retry_delay) => {}
                }
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TicketError::Cancelled),
                outcome = tokio::time::timeout(self.options.attempt_timeout, self.attempt(&prompt)) => outcome,
            };

            let error = match outcome {
                Ok(Ok(summary)) => {
                    tracing::info!(
                        customer = %group.key.customer_number,
                        product = %group.key.product,
                        content_hash = %key.content_hash.short(),
                        attempt,
                        sections = summary.len(),
                        "Summary generated"
                    );
                    return Ok((summary, attempt));
                }
                Ok(Err(e)) if e.is_retryable() => e,
                Ok(Err(e)) => return Err(e),
                Err(_) => TicketError::Provider(format!(
                    "attempt timed out after {}s",
                    self.options.attempt_timeout.as_secs_f64()
                )),
            };

            tracing::warn!(
                customer = %group.key.customer_number,
                product = %group.key.product,
                attempt,
                max_attempts,
                error = %error,
                "Summary attempt failed"
            );
            last_error = error.to_string();
        }

        Err(TicketError::Generation {
            attempts: max_attempts,
            last_error,
        })
    }

    async fn attempt(&self, prompt: &str) -> Result<Summary> {
        let raw = self.generator.generate(prompt).await?;
        parse_summary(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupKey, Ticket};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct HangingGenerator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TextGenerator for HangingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
            unreachable!()
        }
        fn provider_id(&self) -> &str {
            "stub"
        }
        fn model_id(&self) -> &str {
            "hang"
        }
    }

    struct UnavailableGenerator;

    #[async_trait]
    impl TextGenerator for UnavailableGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(TicketError::LlmUnavailable("no key".to_string()))
        }
        fn provider_id(&self) -> &str {
            "stub"
        }
        fn model_id(&self) -> &str {
            "none"
        }
    }

    fn group() -> TicketGroup {
        TicketGroup::new(
            GroupKey::new("C1", "TV"),
            vec![Ticket {
                ticket_id: Some("T1".to_string()),
                customer_number: "C1".to_string(),
                service_category: "KAD".to_string(),
                product: "TV".to_string(),
                order_type: "Fault".to_string(),
                accepted_at: NaiveDate::from_ymd_opt(2024, 1, 5)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
                completed_at: None,
                description: "No picture".to_string(),
                extra: BTreeMap::new(),
            }],
        )
    }

    fn fast_options(max_attempts: u32) -> GeneratorOptions {
        GeneratorOptions {
            max_attempts,
            attempt_timeout: Duration::from_millis(30),
            retry_delay: Duration::ZERO,
            write_policy: CacheWritePolicy::Overwrite,
        }
    }

    #[tokio::test]
    async fn test_timeouts_count_as_attempts() {
        let stub = Arc::new(HangingGenerator {
            calls: AtomicU32::new(0),
        });
        let generator = SummaryGenerator::new(stub.clone(), None, fast_options(2));

        let result = generator
            .generate(&group(), &CancellationToken::new())
            .await;

        match result {
            Err(TicketError::Generation { attempts, last_error }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("expected generation error, got {other:?}"),
        }
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_call() {
        let stub = Arc::new(HangingGenerator {
            calls: AtomicU32::new(0),
        });
        let mut options = fast_options(3);
        options.attempt_timeout = Duration::from_secs(30);
        let generator = SummaryGenerator::new(stub, None, options);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = generator.generate(&group(), &cancel).await;
        assert!(matches!(result, Err(TicketError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_during_retry_delay() {
        let stub = Arc::new(HangingGenerator {
            calls: AtomicU32::new(0),
        });
        let mut options = fast_options(3);
        options.retry_delay = Duration::from_secs(30);
        let generator = SummaryGenerator::new(stub.clone(), None, options);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = generator.generate(&group(), &cancel).await;
        assert!(matches!(result, Err(TicketError::Cancelled)));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returned_immediately() {
        let generator =
            SummaryGenerator::new(Arc::new(UnavailableGenerator), None, fast_options(3));

        let result = generator
            .generate(&group(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TicketError::LlmUnavailable(_))));
    }

    #[test]
    fn test_options_from_config_clamp_attempts() {
        let mut llm = LlmConfig::for_provider(crate::config::ProviderKind::Ollama);
        llm.max_attempts = 0;
        let options = GeneratorOptions::from_config(&llm, &CacheConfig::default());
        assert_eq!(options.max_attempts, 1);
        assert_eq!(options.retry_delay, Duration::from_millis(2000));
    }
}
