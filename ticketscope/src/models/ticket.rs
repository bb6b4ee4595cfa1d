use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp layout used whenever a ticket time is rendered as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single support record as ingested from the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: Option<String>,
    pub customer_number: String,
    pub service_category: String,
    pub product: String,
    pub order_type: String,
    pub accepted_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub description: String,
    /// Remaining input columns, keyed by their original header.
    pub extra: BTreeMap<String, String>,
}

impl Ticket {
    pub fn record(&self) -> TicketRecord<'_> {
        TicketRecord {
            acceptance_time: format_timestamp(&self.accepted_at),
            completion_time: self
                .completed_at
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_else(|| "N/A".to_string()),
            customer_number: &self.customer_number,
            description: &self.description,
            order_type: &self.order_type,
            service_category: &self.service_category,
            ticket_id: self.ticket_id.as_deref().unwrap_or_default(),
            extra: (!self.extra.is_empty()).then_some(&self.extra),
            product: &self.product,
        }
    }
}

/// Serialized view of a ticket, used for hashing and for prompt records.
///
/// Fields are declared in key order so the JSON encoding is stable. Input-only columns
/// sit under `extra`, so a column named like a fixed field (`product`, `DESCRIPTION`)
/// never replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketRecord<'a> {
    #[serde(rename = "ACCEPTANCE_TIME")]
    pub acceptance_time: String,
    #[serde(rename = "COMPLETION_TIME")]
    pub completion_time: String,
    #[serde(rename = "CUSTOMER_NUMBER")]
    pub customer_number: &'a str,
    #[serde(rename = "DESCRIPTION")]
    pub description: &'a str,
    #[serde(rename = "ORDER_TYPE")]
    pub order_type: &'a str,
    #[serde(rename = "SERVICE_CATEGORY")]
    pub service_category: &'a str,
    #[serde(rename = "TICKET_ID")]
    pub ticket_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<&'a BTreeMap<String, String>>,
    pub product: &'a str,
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub customer_number: String,
    pub product: String,
}

impl GroupKey {
    pub fn new(customer_number: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            customer_number: customer_number.into(),
            product: product.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Customer {} - {}", self.customer_number, self.product)
    }
}

/// All tickets for one (customer, product) pair, ordered by acceptance time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketGroup {
    pub key: GroupKey,
    pub tickets: Vec<Ticket>,
}

impl TicketGroup {
    pub fn new(key: GroupKey, tickets: Vec<Ticket>) -> Self {
        Self { key, tickets }
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn first_accepted_at(&self) -> Option<NaiveDateTime> {
        self.tickets.iter().map(|t| t.accepted_at).min()
    }
}

/// One row of the data overview table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub customer_number: String,
    pub product: String,
    pub ticket_count: usize,
}

/// Read-only selector over grouped data. Empty lists select everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFilter {
    pub customers: Vec<String>,
    pub products: Vec<String>,
}

impl GroupFilter {
    pub fn matches(&self, key: &GroupKey) -> bool {
        (self.customers.is_empty() || self.customers.contains(&key.customer_number))
            && (self.products.is_empty() || self.products.contains(&key.product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ticket() -> Ticket {
        Ticket {
            ticket_id: Some("T-1".to_string()),
            customer_number: "C100".to_string(),
            service_category: "NET".to_string(),
            product: "Broadband".to_string(),
            order_type: "FAULT".to_string(),
            accepted_at: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            completed_at: None,
            description: "No sync".to_string(),
            extra: BTreeMap::from([("REGION".to_string(), "North".to_string())]),
        }
    }

    #[test]
    fn record_keeps_extra_columns_apart_and_renders_missing_completion() {
        let ticket = ticket();
        let record = serde_json::to_value(ticket.record()).unwrap();
        assert_eq!(record["extra"]["REGION"], "North");
        assert_eq!(record["ACCEPTANCE_TIME"], "2024-01-02 09:30:00");
        assert_eq!(record["COMPLETION_TIME"], "N/A");
        assert_eq!(record["product"], "Broadband");
    }

    #[test]
    fn extra_column_named_like_a_fixed_field_does_not_shadow_it() {
        let mut ticket = ticket();
        ticket.extra.insert("product".to_string(), "Legacy DSL".to_string());
        ticket
            .extra
            .insert("DESCRIPTION".to_string(), "copied column".to_string());

        let record = serde_json::to_value(ticket.record()).unwrap();
        assert_eq!(record["product"], "Broadband");
        assert_eq!(record["DESCRIPTION"], "No sync");
        assert_eq!(record["extra"]["product"], "Legacy DSL");
    }

    #[test]
    fn record_without_extra_columns_omits_the_key() {
        let mut ticket = ticket();
        ticket.extra.clear();
        let record = serde_json::to_value(ticket.record()).unwrap();
        assert!(record.get("extra").is_none());
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = GroupFilter::default();
        assert!(filter.matches(&GroupKey::new("C1", "TV")));
    }

    #[test]
    fn filter_requires_both_selectors_to_match() {
        let filter = GroupFilter {
            customers: vec!["C1".to_string()],
            products: vec!["TV".to_string()],
        };
        assert!(filter.matches(&GroupKey::new("C1", "TV")));
        assert!(!filter.matches(&GroupKey::new("C1", "Voice")));
        assert!(!filter.matches(&GroupKey::new("C2", "TV")));
    }

    #[test]
    fn group_key_display() {
        assert_eq!(
            GroupKey::new("C100", "Router").to_string(),
            "Customer C100 - Router"
        );
    }
}
