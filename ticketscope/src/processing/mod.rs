mod categories;
mod preprocessor;
mod reader;

pub use categories::{CategoryMap, CATEGORY_PRODUCTS};
pub use preprocessor::{
    filter_groups, group_counts, group_tickets, parse_timestamp, TicketPreprocessor,
    REQUIRED_COLUMNS,
};
pub use reader::{read_table, RawTable};
