//! Content addressing for ticket groups.
//!
//! Every ticket is rendered as a JSON object with a fixed key order; the rendered rows are
//! sorted, length-prefixed, and fed into SHA-256. Row order in the upload therefore
//! does not matter, while any field change does.

use sha2::{Digest, Sha256};

use crate::models::{ContentHash, Ticket, TicketGroup};

/// Stable single-line encoding of one ticket.
pub fn canonical_row(ticket: &Ticket) -> String {
    serde_json::to_string(&ticket.record()).unwrap_or_default()
}

pub fn content_hash(group: &TicketGroup) -> ContentHash {
    hash_tickets(&group.tickets)
}

pub fn hash_tickets(tickets: &[Ticket]) -> ContentHash {
    let mut rows: Vec<String> = tickets.iter().map(canonical_row).collect();
    rows.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update((rows.len() as u64).to_be_bytes());
    for row in &rows {
        hasher.update((row.len() as u64).to_be_bytes());
        hasher.update(row.as_bytes());
    }

    ContentHash::from_hex(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
