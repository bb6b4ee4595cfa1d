//! Prompt templates for ticket summaries
//!
//! Templates use basic `format!()` interpolation. The ticket block is rendered from the
//! group deterministically, so the same group always produces the same prompt.

use crate::hashing::canonical_row;
use crate::models::{Ticket, TicketGroup, TicketRecord};

/// Phases a summary is asked to cover, in chronological order.
pub const SUMMARY_PHASES: [&str; 5] = [
    "Initial Issue",
    "Follow-ups",
    "Developments",
    "Later Incidents",
    "Recent Events",
];

/// System instruction sent alongside every summary prompt.
pub const SYSTEM_PROMPT: &str =
    "You are a technical support analyst. Always respond with valid JSON.";

/// Generate a prompt asking for a phase-by-phase summary of one ticket group
///
/// Tickets are listed by acceptance time, ties broken by their canonical encoding, as
/// JSON records with every field of the upload (missing values rendered as `N/A`).
///
/// # Example
/// ```
/// use ticketscope::llm::prompts::{ticket_summary_prompt, SUMMARY_PHASES};
/// use ticketscope::models::{GroupKey, TicketGroup};
///
/// let group = TicketGroup::new(GroupKey::new("C100", "Router"), Vec::new());
/// let prompt = ticket_summary_prompt(&group);
/// assert!(prompt.contains(SUMMARY_PHASES[0]));
/// ```
pub fn ticket_summary_prompt(group: &TicketGroup) -> String {
    let tickets = ticket_records(&group.tickets);
    let customer = &group.key.customer_number;
    let product = &group.key.product;

    format!(
        r#"Analyze these ticket records for customer {customer} and the {product} service category:
{tickets}

Create a chronological summary with these sections, focusing on the customer's experience:

1. Initial Issue:
    - Timeframe: Identify the period when the initial issues began.
    - Ticket Numbers: List the relevant ticket numbers.
    - Narrative: Describe the customer's initial problems, the customer's feedback, and any immediate actions taken.

2. Follow-ups:
    - Timeframe: Document the period of follow-up activities.
    - Ticket Numbers: List the related ticket numbers.
    - Narrative: Detail further customer interactions and the responses from the support team.

3. Developments:
    - Timeframe: Specify the period during which significant developments occurred.
    - Ticket Numbers: List the relevant ticket numbers.
    - Narrative: Explain new issues, progress on existing problems, and changes in the customer's experience.

4. Later Incidents:
    - Timeframe: Note the timeframe for later incidents.
    - Ticket Numbers: List the related ticket numbers.
    - Narrative: Describe recurring or new problems and how they were handled.

5. Recent Events:
    - Timeframe: Highlight the most recent period.
    - Ticket Numbers: List the relevant ticket numbers.
    - Narrative: Summarize current issues, recent resolutions, and the customer's latest feedback.

Use YYYY-MM-DD dates in every timeframe.

Format as JSON:
{{
    "Initial Issue": {{
        "timeframe": "date range",
        "ticket_numbers": ["list of relevant tickets"],
        "narrative": "detailed description"
    }},
    "Follow-ups": {{ same structure }},
    "Developments": {{ same structure }},
    "Later Incidents": {{ same structure }},
    "Recent Events": {{ same structure }}
}}

Guidelines:
- Focus on this specific customer's experience with this service category
- Maintain chronological order
- Include relevant ticket numbers
- Use clear, professional language
- Highlight patterns or recurring issues"#
    )
}

fn ticket_records(tickets: &[Ticket]) -> String {
    let mut ordered: Vec<(&Ticket, String)> =
        tickets.iter().map(|t| (t, canonical_row(t))).collect();
    ordered.sort_by(|(a, a_row), (b, b_row)| {
        a.accepted_at
            .cmp(&b.accepted_at)
            .then_with(|| a_row.cmp(b_row))
    });

    let records: Vec<TicketRecord<'_>> =
        ordered.into_iter().map(|(t, _)| t.record()).collect();

    serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string())
}
