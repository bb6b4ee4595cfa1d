use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex-encoded SHA-256 digest of a ticket group's contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines and terminal output.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One phase of a generated summary, e.g. "Initial Issue".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySection {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ticket_numbers: Vec<String>,
    pub narrative: String,
}

impl SummarySection {
    pub fn new(label: impl Into<String>, narrative: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            timeframe: None,
            ticket_numbers: Vec::new(),
            narrative: narrative.into(),
        }
    }
}

/// Phase-labeled summary of a ticket group, in the order the model produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub sections: Vec<SummarySection>,
}

impl Summary {
    pub fn new(sections: Vec<SummarySection>) -> Self {
        Self { sections }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Human-readable rendering used as the raw summary text in reports.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&section.label);
            out.push_str(":\n");
            if let Some(timeframe) = &section.timeframe {
                out.push_str(&format!("  Timeframe: {timeframe}\n"));
            }
            if !section.ticket_numbers.is_empty() {
                out.push_str(&format!(
                    "  Ticket Numbers: {}\n",
                    section.ticket_numbers.join(", ")
                ));
            }
            out.push_str(&format!("  {}\n", section.narrative));
        }
        out
    }
}

/// Cache lookup key. Provider and model are part of it so that switching either
/// never returns a summary produced elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub content_hash: ContentHash,
    pub provider: String,
    pub model: String,
}

impl CacheKey {
    pub fn new(
        content_hash: ContentHash,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            content_hash,
            provider: provider.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: ContentHash,
    pub provider: String,
    pub model: String,
    pub customer_number: String,
    pub product: String,
    pub summary: Summary,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(
            self.content_hash.clone(),
            self.provider.clone(),
            self.model.clone(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Cache,
    Generated,
}

impl fmt::Display for SummarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Generated => write!(f, "generated"),
        }
    }
}
