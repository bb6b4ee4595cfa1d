use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::ProcessingConfig;
use crate::error::{Result, TicketError};
use crate::models::{GroupCount, GroupFilter, GroupKey, Ticket, TicketGroup};

use super::categories::CategoryMap;
use super::reader::{read_table, RawTable};

pub const REQUIRED_COLUMNS: &[&str] = &[
    "CUSTOMER_NUMBER",
    "SERVICE_CATEGORY",
    "ORDER_TYPE",
    "ACCEPTANCE_TIME",
    "DESCRIPTION",
];

const TICKET_ID_COLUMNS: &[&str] = &["TICKET_ID", "TICKET_NUMBER"];
const COMPLETION_COLUMN: &str = "COMPLETION_TIME";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

/// Turns a raw ticket export into (customer, product) groups.
#[derive(Debug, Clone, Default)]
pub struct TicketPreprocessor {
    categories: CategoryMap,
}

struct Columns {
    customer: usize,
    category: usize,
    order_type: usize,
    accepted: usize,
    description: usize,
    ticket_id: Option<usize>,
    completed: Option<usize>,
}

impl TicketPreprocessor {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            categories: CategoryMap::new(
                &config.category_overrides,
                &config.excluded_categories,
            ),
        }
    }

    pub fn with_categories(categories: CategoryMap) -> Self {
        Self { categories }
    }

    /// Parse, filter, map, and group an uploaded file.
    pub fn process(&self, bytes: &[u8]) -> Result<Vec<TicketGroup>> {
        let table = read_table(bytes)?;
        let tickets = self.tickets_from_table(&table)?;
        let groups = group_tickets(tickets);

        tracing::info!(
            rows = table.records.len(),
            groups = groups.len(),
            "Preprocessed ticket data"
        );

        Ok(groups)
    }

    fn tickets_from_table(&self, table: &RawTable) -> Result<Vec<Ticket>> {
        let columns = resolve_columns(table)?;
        let mut dropped = 0usize;
        let mut tickets = Vec::with_capacity(table.records.len());

        for (index, record) in table.records.iter().enumerate() {
            let row = index + 2;
            let field = |i: usize| record.get(i).map(String::as_str).unwrap_or("");

            let category = field(columns.category);
            let Some(product) = self.categories.product_for(category) else {
                dropped += 1;
                continue;
            };

            let customer = field(columns.customer);
            if customer.is_empty() {
                return Err(TicketError::DataFormat(format!(
                    "Row {row}: CUSTOMER_NUMBER is empty"
                )));
            }

            let accepted_at = parse_timestamp(field(columns.accepted)).ok_or_else(|| {
                TicketError::DataFormat(format!(
                    "Row {row}: invalid ACCEPTANCE_TIME '{}'",
                    field(columns.accepted)
                ))
            })?;

            let completed_at = match columns.completed.map(field) {
                Some(raw) if !raw.is_empty() && !raw.eq_ignore_ascii_case("N/A") => {
                    Some(parse_timestamp(raw).ok_or_else(|| {
                        TicketError::DataFormat(format!(
                            "Row {row}: invalid COMPLETION_TIME '{raw}'"
                        ))
                    })?)
                }
                _ => None,
            };

            let known = [
                Some(columns.customer),
                Some(columns.category),
                Some(columns.order_type),
                Some(columns.accepted),
                Some(columns.description),
                columns.ticket_id,
                columns.completed,
            ];
            let extra: BTreeMap<String, String> = table
                .headers
                .iter()
                .enumerate()
                .filter(|(i, header)| !known.contains(&Some(*i)) && !header.is_empty())
                .map(|(i, header)| (header.clone(), field(i).to_string()))
                .collect();

            tickets.push(Ticket {
                ticket_id: columns
                    .ticket_id
                    .map(field)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string),
                customer_number: customer.to_string(),
                service_category: category.trim().to_uppercase(),
                product: product.to_string(),
                order_type: field(columns.order_type).to_string(),
                accepted_at,
                completed_at,
                description: field(columns.description).to_string(),
                extra,
            });
        }

        if dropped > 0 {
            tracing::debug!(dropped, "Dropped rows with unused service categories");
        }

        Ok(tickets)
    }
}

fn resolve_columns(table: &RawTable) -> Result<Columns> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| table.column(name).is_none())
        .collect();

    if !missing.is_empty() {
        return Err(TicketError::DataFormat(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    let required = |name: &str| {
        table
            .column(name)
            .ok_or_else(|| TicketError::DataFormat(format!("Missing required column: {name}")))
    };

    Ok(Columns {
        customer: required("CUSTOMER_NUMBER")?,
        category: required("SERVICE_CATEGORY")?,
        order_type: required("ORDER_TYPE")?,
        accepted: required("ACCEPTANCE_TIME")?,
        description: required("DESCRIPTION")?,
        ticket_id: TICKET_ID_COLUMNS.iter().find_map(|name| table.column(name)),
        completed: table.column(COMPLETION_COLUMN),
    })
}

/// Parse the timestamp layouts seen in ticket exports. Date-only values map to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Sort by acceptance time and group by (customer, product) in first-occurrence order.
pub fn group_tickets(mut tickets: Vec<Ticket>) -> Vec<TicketGroup> {
    // Stable sort keeps file order for equal timestamps.
    tickets.sort_by_key(|t| t.accepted_at);

    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<TicketGroup> = Vec::new();

    for ticket in tickets {
        let key = GroupKey::new(ticket.customer_number.clone(), ticket.product.clone());
        match index.get(&key) {
            Some(&position) => groups[position].tickets.push(ticket),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(TicketGroup::new(key, vec![ticket]));
            }
        }
    }

    groups
}

/// Ticket counts per group for the data overview.
pub fn group_counts(groups: &[TicketGroup]) -> Vec<GroupCount> {
    groups
        .iter()
        .map(|group| GroupCount {
            customer_number: group.key.customer_number.clone(),
            product: group.key.product.clone(),
            ticket_count: group.len(),
        })
        .collect()
}

pub fn filter_groups<'a>(
    groups: &'a [TicketGroup],
    filter: &'a GroupFilter,
) -> impl Iterator<Item = &'a TicketGroup> + 'a {
    groups.iter().filter(move |group| filter.matches(&group.key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
TICKET_ID,CUSTOMER_NUMBER,SERVICE_CATEGORY,ORDER_TYPE,ACCEPTANCE_TIME,COMPLETION_TIME,DESCRIPTION,REGION
T3,C1,NET,FAULT,2024-01-03 10:00:00,,Slow again,North
T1,C1,KAI,FAULT,2024-01-01 08:00:00,2024-01-01 12:00:00,No sync,North
T2,C2,KAV,ORDER,2024-01-02 09:00:00,,New line,South
T4,C1,MISC,FAULT,2024-01-04 09:00:00,,Ignored,North
";

    #[test]
    fn test_groups_by_customer_and_product() {
        let groups = TicketPreprocessor::default()
            .process(SAMPLE.as_bytes())
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, GroupKey::new("C1", "Broadband"));
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].key, GroupKey::new("C2", "Voice"));
    }

    #[test]
    fn test_tickets_sorted_by_acceptance_time() {
        let groups = TicketPreprocessor::default()
            .process(SAMPLE.as_bytes())
            .unwrap();
        let ids: Vec<_> = groups[0]
            .tickets
            .iter()
            .map(|t| t.ticket_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["T1", "T3"]);
    }

    #[test]
    fn test_extra_columns_are_retained() {
        let groups = TicketPreprocessor::default()
            .process(SAMPLE.as_bytes())
            .unwrap();
        let ticket = &groups[0].tickets[0];
        assert_eq!(ticket.extra.get("REGION").map(String::as_str), Some("North"));
        assert!(!ticket.extra.contains_key("TICKET_ID"));
        assert!(ticket.completed_at.is_some());
    }

    #[test]
    fn test_missing_columns_is_data_format_error() {
        let err = TicketPreprocessor::default()
            .process(b"CUSTOMER_NUMBER,SERVICE_CATEGORY\nC1,NET\n")
            .unwrap_err();
        match err {
            TicketError::DataFormat(message) => {
                assert!(message.contains("ORDER_TYPE"));
                assert!(message.contains("ACCEPTANCE_TIME"));
                assert!(message.contains("DESCRIPTION"));
            }
            other => panic!("expected DataFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_timestamp_names_row() {
        let data = "CUSTOMER_NUMBER,SERVICE_CATEGORY,ORDER_TYPE,ACCEPTANCE_TIME,DESCRIPTION\n\
                    C1,NET,FAULT,yesterday,Broken\n";
        let err = TicketPreprocessor::default()
            .process(data.as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("Row 2"));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-01-02 03:04:05").is_some());
        assert!(parse_timestamp("2024-01-02T03:04:05").is_some());
        assert!(parse_timestamp("2024-01-02").is_some());
        assert!(parse_timestamp("02.01.2024 03:04").is_some());
        assert!(parse_timestamp("2024-01-02T03:04:05Z").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn test_group_counts() {
        let groups = TicketPreprocessor::default()
            .process(SAMPLE.as_bytes())
            .unwrap();
        let counts = group_counts(&groups);
        assert_eq!(counts[0].ticket_count, 2);
        assert_eq!(counts[1].ticket_count, 1);
    }

    #[test]
    fn test_filter_groups() {
        let groups = TicketPreprocessor::default()
            .process(SAMPLE.as_bytes())
            .unwrap();
        let filter = GroupFilter {
            customers: vec![],
            products: vec!["Voice".to_string()],
        };
        let selected: Vec<_> = filter_groups(&groups, &filter).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].key.customer_number, "C2");
    }
}
