use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{GroupKey, TimelineEvent};

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));

const TITLE_TEXT: &str = "Chronological view of customer issues and resolutions";

/// TimelineJS-shaped display document: a title slide plus one slide per event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineDocument {
    pub title: TimelineSlide,
    pub events: Vec<TimelineSlide>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSlide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<TimelineDate>,
    pub text: SlideText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl From<NaiveDate> for TimelineDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideText {
    pub headline: String,
    pub text: String,
}

impl TimelineDocument {
    /// Render events for display. Undated events are plotted at the date they are
    /// anchored after, or at `fallback_date` when no earlier event carried a date.
    pub fn build<I>(title: impl Into<String>, events: I, fallback_date: NaiveDate) -> Self
    where
        I: IntoIterator<Item = TimelineEvent>,
    {
        let events = events
            .into_iter()
            .map(|event| {
                let date = event.position.anchor().unwrap_or(fallback_date);
                TimelineSlide {
                    start_date: Some(date.into()),
                    text: SlideText {
                        headline: escape_html(&event.label),
                        text: event_html(&event),
                    },
                }
            })
            .collect();

        Self {
            title: TimelineSlide {
                start_date: None,
                text: SlideText {
                    headline: escape_html(&title.into()),
                    text: TITLE_TEXT.to_string(),
                },
            },
            events,
        }
    }
}

/// Title used for a group's timeline.
pub fn group_title(key: &GroupKey) -> String {
    format!("Customer {} - {} Timeline", key.customer_number, key.product)
}

fn event_html(event: &TimelineEvent) -> String {
    let timeframe = event.timeframe.as_deref().unwrap_or("N/A");
    format!(
        "<b>Timeframe</b>: {}<hr><b>Ticket Numbers</b>: {}<hr><b>Narrative</b>: {}",
        escape_html(timeframe),
        escape_html(&event.ticket_numbers.join(", ")),
        format_text(&event.text)
    )
}

// Escape first, then turn Markdown bold and newlines into markup.
fn format_text(text: &str) -> String {
    let escaped = escape_html(text.trim());
    BOLD.replace_all(&escaped, "<b>$1</b>")
        .replace("\r\n", "\n")
        .replace('\n', "<br>")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimelinePosition;
    use pretty_assertions::assert_eq;

    fn event(position: TimelinePosition, label: &str, text: &str) -> TimelineEvent {
        TimelineEvent {
            position,
            label: label.to_string(),
            text: text.to_string(),
            timeframe: None,
            ticket_numbers: Vec::new(),
        }
    }

    #[test]
    fn test_document_shape() {
        let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut dated = event(TimelinePosition::Dated { date: jan2 }, "Initial Issue", "Down");
        dated.timeframe = Some("2024-01-02".to_string());
        dated.ticket_numbers = vec!["T1".to_string(), "T2".to_string()];

        let doc = TimelineDocument::build(
            "Customer C1 - TV Timeline",
            vec![dated],
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        );
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["title"]["text"]["headline"], "Customer C1 - TV Timeline");
        assert!(value["title"].get("start_date").is_none());
        assert_eq!(value["events"][0]["start_date"]["year"], 2024);
        assert_eq!(value["events"][0]["start_date"]["month"], 1);
        assert_eq!(value["events"][0]["start_date"]["day"], 2);
        assert_eq!(
            value["events"][0]["text"]["text"],
            "<b>Timeframe</b>: 2024-01-02<hr><b>Ticket Numbers</b>: T1, T2<hr><b>Narrative</b>: Down"
        );
    }

    #[test]
    fn test_undated_events_use_anchor_then_fallback() {
        let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let fallback = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap();
        let doc = TimelineDocument::build(
            "t",
            vec![
                event(
                    TimelinePosition::Undated {
                        after: None,
                        ordinal: 1,
                    },
                    "a",
                    "",
                ),
                event(
                    TimelinePosition::Undated {
                        after: Some(jan2),
                        ordinal: 1,
                    },
                    "b",
                    "",
                ),
            ],
            fallback,
        );

        assert_eq!(doc.events[0].start_date, Some(fallback.into()));
        assert_eq!(doc.events[1].start_date, Some(jan2.into()));
    }

    #[test]
    fn test_narrative_markup() {
        assert_eq!(
            format_text("**Note** <script>\nline two"),
            "<b>Note</b> &lt;script&gt;<br>line two"
        );
    }

    #[test]
    fn test_group_title() {
        assert_eq!(
            group_title(&GroupKey::new("C100", "Router")),
            "Customer C100 - Router Timeline"
        );
    }
}
