//! Summarize customer support tickets per customer and product with an LLM, cache the
//! summaries by content hash, and lay them out on a timeline.

pub mod config;
pub mod db;
pub mod error;
pub mod hashing;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod summary;
pub mod timeline;

pub use error::{Result, TicketError};
