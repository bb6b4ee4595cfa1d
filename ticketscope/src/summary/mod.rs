mod generator;
mod parser;

pub use generator::{GeneratedSummary, GeneratorOptions, SummaryGenerator};
pub use parser::parse_summary;
