//! Tolerant parsing of model output into a [`Summary`].
//!
//! Models wrap JSON in Markdown fences, prepend chatter, nest it one level deep, or
//! ignore the format entirely. Accepted shapes, in order of preference:
//!
//! 1. a JSON object keyed by phase label (values are section objects or plain strings),
//!    optionally wrapped as `{"summary": {...}}` or `{"sections": [...]}`;
//! 2. the same JSON embedded in surrounding text (outermost `{...}` span);
//! 3. plain text where a phase label followed by `:` starts each section. Known phases
//!    are canonicalized ("Follow ups" becomes "Follow-ups"); other short capitalized
//!    headings such as "Resolution:" are kept as written.
//!
//! Whatever the shape, at least one section must be a summary phase or one of
//! [`OUTCOME_HEADINGS`]. Replies like `Error: rate limit exceeded` or
//! `{"error": "model is overloaded"}` are rejected, never cached.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Result, TicketError};
use crate::llm::prompts::SUMMARY_PHASES;
use crate::models::{Summary, SummarySection};

/// Headings models use for the closing phase, accepted alongside the summary phases.
pub const OUTCOME_HEADINGS: [&str; 6] = [
    "Resolution",
    "Root Cause",
    "Current Status",
    "Outcome",
    "Next Steps",
    "Workaround",
];

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$").expect("valid fence regex"));

static PHASE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?(?:[*\-•]\s+)?(?:\d+[.)]\s*)?(?:\*\*|__)?\s*(initial issues?|follow[\s-]?ups?|developments?|later incidents?|recent events?)\s*(?:\*\*|__)?\s*:\s*(?:\*\*|__)?\s*(.*)$",
    )
    .expect("valid phase regex")
});

static FIELD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[*\-•]\s*)?(?:\*\*|__)?\s*(time\s?frame|ticket[\s_]numbers?|tickets|narrative)\s*(?:\*\*|__)?\s*:\s*(?:\*\*|__)?\s*(.*)$",
    )
    .expect("valid field regex")
});

static HEADING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:#{1,6}\s*)?(?:[*\-•]\s+)?(?:\d+[.)]\s*)?(?:\*\*|__)?\s*([A-Z][A-Za-z&/'-]*(?:[ \t]+[A-Za-z&/'-]+){0,3})\s*(?:\*\*|__)?\s*:\s*(?:\*\*|__)?\s*(.*)$",
    )
    .expect("valid heading regex")
});

/// Parse raw model output. Fails with [`TicketError::Parse`] when no non-empty section
/// can be recovered.
pub fn parse_summary(raw: &str) -> Result<Summary> {
    let cleaned = strip_fences(raw);

    let sections = match parse_json(&cleaned) {
        Some(value) => sections_from_value(value),
        None => Vec::new(),
    };
    let sections = if sections.is_empty() {
        sections_from_text(&cleaned)
    } else {
        sections
    };

    if sections.is_empty() {
        return Err(TicketError::Parse(format!(
            "Response contained no summary sections: {}",
            preview(raw)
        )));
    }
    if sections.iter().all(|s| s.narrative.trim().is_empty()) {
        return Err(TicketError::Parse(
            "Every summary section has an empty narrative".to_string(),
        ));
    }
    if !sections.iter().any(|s| is_summary_label(&s.label)) {
        return Err(TicketError::Parse(format!(
            "Response has no recognizable summary section: {}",
            preview(raw)
        )));
    }

    Ok(Summary::new(sections))
}

fn strip_fences(raw: &str) -> String {
    FENCE.replace_all(raw, "").trim().to_string()
}

fn parse_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn sections_from_value(value: Value) -> Vec<SummarySection> {
    match value {
        Value::Object(map) => sections_from_object(map),
        Value::Array(items) => sections_from_list(items),
        Value::String(text) => sections_from_text(&text),
        _ => Vec::new(),
    }
}

fn sections_from_object(mut map: Map<String, Value>) -> Vec<SummarySection> {
    if let Some(key) = find_key(&map, "sections") {
        if map.get(&key).is_some_and(Value::is_array) {
            if let Some(Value::Array(items)) = map.remove(&key) {
                return sections_from_list(items);
            }
        }
    }

    if map.len() == 1 {
        if let Some(key) = find_key(&map, "summary") {
            if let Some(inner) = map.remove(&key) {
                return sections_from_value(inner);
            }
        }
    }

    map.into_iter()
        .map(|(label, value)| section_from_value(label.trim().to_string(), value))
        .collect()
}

fn sections_from_list(items: Vec<Value>) -> Vec<SummarySection> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Value::Object(mut fields) => {
                let label = ["label", "phase", "section", "title", "name"]
                    .iter()
                    .find_map(|name| {
                        find_key(&fields, name).and_then(|key| match fields.remove(&key) {
                            Some(Value::String(label)) => Some(label),
                            _ => None,
                        })
                    })
                    .unwrap_or_else(|| default_label(index));
                Some(section_from_value(label, Value::Object(fields)))
            }
            Value::String(text) => Some(SummarySection::new(default_label(index), text)),
            _ => None,
        })
        .collect()
}

fn section_from_value(label: String, value: Value) -> SummarySection {
    let mut section = SummarySection::new(label, "");

    match value {
        Value::Object(fields) => {
            let mut leftover = Vec::new();
            for (key, value) in fields {
                match normalize_key(&key).as_str() {
                    "timeframe" | "time_frame" | "period" | "date_range" => {
                        section.timeframe = value_text(&value).filter(|t| !t.is_empty());
                    }
                    "ticket_numbers" | "ticket_number" | "tickets" | "ticket_ids" => {
                        section.ticket_numbers = ticket_numbers(&value);
                    }
                    "narrative" | "summary" | "description" | "text" => {
                        section.narrative = value_text(&value).unwrap_or_default();
                    }
                    _ => leftover.extend(value_text(&value)),
                }
            }
            if section.narrative.is_empty() && !leftover.is_empty() {
                section.narrative = leftover.join(" ");
            }
        }
        other => section.narrative = value_text(&other).unwrap_or_default(),
    }

    section
}

fn sections_from_text(text: &str) -> Vec<SummarySection> {
    let mut sections: Vec<SummarySection> = Vec::new();

    for line in text.lines() {
        if let Some(caps) = PHASE_LINE.captures(line) {
            sections.push(SummarySection::new(
                canonical_phase(&caps[1]),
                strip_bold(&caps[2]),
            ));
            continue;
        }

        if let Some(caps) = FIELD_LINE.captures(line) {
            let Some(current) = sections.last_mut() else {
                continue;
            };
            let value = strip_bold(&caps[2]);
            match normalize_key(&caps[1]).as_str() {
                "timeframe" | "time_frame" => {
                    current.timeframe = Some(value).filter(|v| !v.is_empty());
                }
                "narrative" => append_line(&mut current.narrative, &value),
                _ => current.ticket_numbers = split_ticket_numbers(&value),
            }
            continue;
        }

        if let Some(caps) = HEADING_LINE.captures(line) {
            sections.push(SummarySection::new(caps[1].trim(), strip_bold(&caps[2])));
            continue;
        }

        let trimmed = line.trim();
        if let Some(current) = sections.last_mut() {
            append_line(&mut current.narrative, trimmed);
        }
    }

    // Headings that never received any content are chatter ("Here is the summary:").
    sections.retain(|s| {
        !s.narrative.is_empty() || s.timeframe.is_some() || !s.ticket_numbers.is_empty()
    });
    sections
}

fn strip_bold(text: &str) -> String {
    text.trim().trim_end_matches("**").trim().to_string()
}

fn append_line(narrative: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    if !narrative.is_empty() {
        narrative.push(' ');
    }
    narrative.push_str(line);
}

fn canonical_phase(matched: &str) -> String {
    let wanted = squash(matched);
    SUMMARY_PHASES
        .iter()
        .find(|phase| squash(phase) == wanted)
        .map(|phase| phase.to_string())
        .unwrap_or_else(|| matched.trim().to_string())
}

fn is_summary_label(label: &str) -> bool {
    let wanted = squash(label);
    SUMMARY_PHASES
        .iter()
        .chain(OUTCOME_HEADINGS.iter())
        .any(|known| squash(known) == wanted)
}

// Lowercase alphanumerics without a plural "s", so "Follow ups" matches "Follow-ups".
fn squash(label: &str) -> String {
    let squashed: String = label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    squashed.trim_end_matches('s').to_string()
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

fn find_key(map: &Map<String, Value>, wanted: &str) -> Option<String> {
    map.keys()
        .find(|key| key.trim().eq_ignore_ascii_case(wanted))
        .cloned()
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_text).collect();
            Some(parts.join(" "))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

fn ticket_numbers(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => split_ticket_numbers(s),
        Value::Number(n) => vec![n.to_string()],
        _ => Vec::new(),
    }
}

fn split_ticket_numbers(text: &str) -> Vec<String> {
    text.split([',', ';'])
        .map(|part| {
            part.trim()
                .trim_matches(|c| matches!(c, '[' | ']' | '"' | '\''))
                .trim()
                .to_string()
        })
        .filter(|part| !part.is_empty() && !part.eq_ignore_ascii_case("n/a"))
        .collect()
}

fn default_label(index: usize) -> String {
    SUMMARY_PHASES
        .get(index)
        .map(|phase| phase.to_string())
        .unwrap_or_else(|| format!("Section {}", index + 1))
}

fn preview(raw: &str) -> String {
    let head: String = raw.chars().take(80).collect();
    if raw.chars().count() > 80 {
        format!("{head}...")
    } else {
        head
    }
}
