#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ticketscope::config::{CacheWritePolicy, DatabaseConfig};
use ticketscope::db::{Database, LibSqlBackend, SummaryStore};
use ticketscope::error::{Result, TicketError};
use ticketscope::llm::TextGenerator;
use ticketscope::models::{CacheEntry, CacheKey};
use ticketscope::processing::{CategoryMap, TicketPreprocessor};
use ticketscope::summary::GeneratorOptions;

/// Three router tickets for customer C100 plus noise the preprocessor must drop.
pub const ROUTER_EXPORT: &str = "\
TICKET_ID,CUSTOMER_NUMBER,SERVICE_CATEGORY,ORDER_TYPE,ACCEPTANCE_TIME,COMPLETION_TIME,DESCRIPTION
T-102,C100,RTR,REPAIR,2024-01-05 10:30:00,2024-01-05 12:00:00,Router replaced
T-100,C100,RTR,FAULT,2024-01-02 08:15:00,2024-01-02 17:00:00,Router offline
T-101,C100,RTR,FAULT,2024-01-03 09:00:00,,Router keeps rebooting
T-900,C200,XYZ,FAULT,2024-01-04 09:00:00,,Unknown category
";

pub const TWO_PHASE_TEXT: &str = "Initial Issue: 2024-01-02 router went offline and kept rebooting\n\
Resolution: 2024-01-05 technician replaced the router";

pub const FIVE_PHASE_JSON: &str = r#"{
  "Initial Issue": {"timeframe": "2024-01-02", "ticket_numbers": ["T-100"], "narrative": "Router offline"},
  "Follow-ups": {"timeframe": "2024-01-03", "ticket_numbers": ["T-101"], "narrative": "Reboots continued"},
  "Developments": {"timeframe": "N/A", "ticket_numbers": [], "narrative": "Escalated to field service"},
  "Later Incidents": {"timeframe": "N/A", "ticket_numbers": [], "narrative": "None"},
  "Recent Events": {"timeframe": "2024-01-05", "ticket_numbers": ["T-102"], "narrative": "Router replaced"}
}"#;

pub fn router_preprocessor() -> TicketPreprocessor {
    let overrides = HashMap::from([("RTR".to_string(), "Router".to_string())]);
    TicketPreprocessor::with_categories(CategoryMap::new(&overrides, &[]))
}

pub fn fast_options() -> GeneratorOptions {
    GeneratorOptions {
        max_attempts: 3,
        attempt_timeout: Duration::from_secs(5),
        retry_delay: Duration::ZERO,
        write_policy: CacheWritePolicy::Overwrite,
    }
}

pub async fn file_store(path: &Path) -> Arc<dyn SummaryStore> {
    let config = DatabaseConfig {
        url: format!("file:{}", path.display()),
        auth_token: None,
        busy_timeout_ms: 5000,
        journal_mode: "WAL".to_string(),
    };
    let db = Database::new(&config)
        .await
        .expect("database should open");
    Arc::new(LibSqlBackend::new(db))
}

/// Scripted text generator that counts calls.
///
/// Queued results are returned first; afterwards every call returns `fallback`
/// (or a provider error when there is none).
pub struct StubGenerator {
    provider: String,
    model: String,
    queue: Mutex<VecDeque<Result<String>>>,
    fallback: Option<String>,
    calls: AtomicU32,
}

impl StubGenerator {
    pub fn new(provider: &str, model: &str, fallback: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            queue: Mutex::new(VecDeque::new()),
            fallback: Some(fallback.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_failing(provider: &str, model: &str) -> Self {
        Self {
            fallback: None,
            ..Self::new(provider, model, "")
        }
    }

    pub fn then(self, result: Result<String>) -> Self {
        self.queue.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.queue.lock().unwrap().pop_front() {
            return result;
        }
        match &self.fallback {
            Some(text) => Ok(text.clone()),
            None => Err(TicketError::Provider("connection refused".to_string())),
        }
    }

    fn provider_id(&self) -> &str {
        &self.provider
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Store whose every operation fails, as if the database file were unreadable.
pub struct BrokenStore;

#[async_trait]
impl SummaryStore for BrokenStore {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>> {
        Err(TicketError::Storage("database disk image is malformed".to_string()))
    }
    async fn put(&self, _entry: &CacheEntry, _policy: CacheWritePolicy) -> Result<()> {
        Err(TicketError::Storage("attempt to write a readonly database".to_string()))
    }
    async fn count(&self) -> Result<u64> {
        Err(TicketError::Storage("unavailable".to_string()))
    }
    async fn clear(&self) -> Result<u64> {
        Err(TicketError::Storage("unavailable".to_string()))
    }
}
