use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::hashing::content_hash;
use crate::models::{ContentHash, Summary, SummarySource, TicketGroup, TimelineEvent};
use crate::summary::{GeneratedSummary, SummaryGenerator};
use crate::timeline::{group_title, timeline, TimelineDocument};

/// Plotted for undated events when a group has no acceptance dates at all.
pub const DEFAULT_TIMELINE_DATE: (i32, u32, u32) = (2024, 1, 1);

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub customer_number: String,
    pub product: String,
    pub ticket_count: usize,
    pub content_hash: ContentHash,
    pub outcome: GroupOutcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cache_warnings: Vec<String>,
}

impl GroupReport {
    pub fn is_ready(&self) -> bool {
        matches!(self.outcome, GroupOutcome::Ready { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupOutcome {
    Ready {
        source: SummarySource,
        attempts: u32,
        summary: Summary,
        summary_text: String,
        events: Vec<TimelineEvent>,
        document: TimelineDocument,
    },
    Failed {
        error: String,
    },
}

/// Runs groups through cache check, generation and timeline formatting.
///
/// A failing group yields a `Failed` report and never stops the others. Reports come
/// back in input order whatever the concurrency.
pub struct SummaryPipeline {
    generator: Arc<SummaryGenerator>,
    concurrency: usize,
    regenerate: bool,
}

impl SummaryPipeline {
    pub fn new(generator: Arc<SummaryGenerator>, concurrency: usize) -> Self {
        Self {
            generator,
            concurrency: concurrency.max(1),
            regenerate: false,
        }
    }

    /// Skip cache reads and overwrite stored summaries.
    pub fn with_regenerate(mut self, regenerate: bool) -> Self {
        self.regenerate = regenerate;
        self
    }

    pub async fn run<'a, I>(&self, groups: I, cancel: &CancellationToken) -> Vec<GroupReport>
    where
        I: IntoIterator<Item = &'a TicketGroup>,
    {
        let reports: Vec<GroupReport> = stream::iter(groups)
            .map(|group| self.run_group(group, cancel))
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed = reports.iter().filter(|r| !r.is_ready()).count();
        tracing::info!(
            groups = reports.len(),
            failed,
            "Summary pipeline finished"
        );
        reports
    }

    pub async fn run_group(&self, group: &TicketGroup, cancel: &CancellationToken) -> GroupReport {
        let mut cache_warnings = Vec::new();
        let result = self
            .generator
            .generate_collecting(group, self.regenerate, cancel, &mut cache_warnings)
            .await;

        match result {
            Ok(generated) => ready_report(group, generated, cache_warnings),
            Err(e) => {
                tracing::error!(
                    customer = %group.key.customer_number,
                    product = %group.key.product,
                    error = %e,
                    "Summary generation failed"
                );
                GroupReport {
                    customer_number: group.key.customer_number.clone(),
                    product: group.key.product.clone(),
                    ticket_count: group.len(),
                    content_hash: content_hash(group),
                    outcome: GroupOutcome::Failed {
                        error: e.to_string(),
                    },
                    cache_warnings,
                }
            }
        }
    }
}

fn ready_report(
    group: &TicketGroup,
    generated: GeneratedSummary,
    cache_warnings: Vec<String>,
) -> GroupReport {
    let GeneratedSummary {
        summary,
        content_hash,
        source,
        attempts,
        ..
    } = generated;

    let events: Vec<TimelineEvent> = timeline(&summary).collect();
    let document =
        TimelineDocument::build(group_title(&group.key), events.clone(), fallback_date(group));

    GroupReport {
        customer_number: group.key.customer_number.clone(),
        product: group.key.product.clone(),
        ticket_count: group.len(),
        content_hash,
        outcome: GroupOutcome::Ready {
            source,
            attempts,
            summary_text: summary.to_text(),
            summary,
            events,
            document,
        },
        cache_warnings,
    }
}

fn fallback_date(group: &TicketGroup) -> NaiveDate {
    let (year, month, day) = DEFAULT_TIMELINE_DATE;
    group
        .first_accepted_at()
        .map(|ts| ts.date())
        .or_else(|| NaiveDate::from_ymd_opt(year, month, day))
        .unwrap_or(NaiveDate::MIN)
}
