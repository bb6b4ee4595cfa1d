use chrono::NaiveDate;

use crate::models::{Summary, SummarySection, TimelineEvent, TimelinePosition};
use crate::timeline::dates::extract_date;

/// Lazily place the sections of `summary` on a timeline, in section order.
///
/// The iterator borrows the summary and holds no other state, so cloning it (or calling
/// `timeline` again) replays the identical sequence.
pub fn timeline(summary: &Summary) -> TimelineEvents<'_> {
    TimelineEvents {
        sections: summary.sections.iter(),
        last_date: None,
        undated_run: 0,
    }
}

#[derive(Debug, Clone)]
pub struct TimelineEvents<'a> {
    sections: std::slice::Iter<'a, SummarySection>,
    last_date: Option<NaiveDate>,
    // Undated events since the last dated one
    undated_run: usize,
}

impl Iterator for TimelineEvents<'_> {
    type Item = TimelineEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let section = self.sections.next()?;

        let found = section
            .timeframe
            .as_deref()
            .and_then(extract_date)
            .or_else(|| extract_date(&section.narrative));

        let position = match found {
            Some(date) => {
                self.last_date = Some(date);
                self.undated_run = 0;
                TimelinePosition::Dated { date }
            }
            None => {
                self.undated_run += 1;
                TimelinePosition::Undated {
                    after: self.last_date,
                    ordinal: self.undated_run,
                }
            }
        };

        Some(TimelineEvent {
            position,
            label: section.label.clone(),
            text: section.narrative.clone(),
            timeframe: section.timeframe.clone(),
            ticket_numbers: section.ticket_numbers.clone(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.sections.size_hint()
    }
}

impl ExactSizeIterator for TimelineEvents<'_> {}
