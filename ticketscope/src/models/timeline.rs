use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Where an event sits on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelinePosition {
    /// An explicit date found in the section text.
    Dated { date: NaiveDate },
    /// No date found; placed after `after` (the last dated event, if any).
    Undated {
        after: Option<NaiveDate>,
        ordinal: usize,
    },
}

impl TimelinePosition {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Dated { date } => Some(*date),
            Self::Undated { .. } => None,
        }
    }

    /// Date to plot at: the explicit date, else the anchor.
    pub fn anchor(&self) -> Option<NaiveDate> {
        match self {
            Self::Dated { date } => Some(*date),
            Self::Undated { after, .. } => *after,
        }
    }
}

/// One summary section placed on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub position: TimelinePosition,
    pub label: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ticket_numbers: Vec<String>,
}
