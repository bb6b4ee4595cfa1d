use thiserror::Error;

#[derive(Error, Debug)]
pub enum TicketError {
    #[error("Data format error: {0}")]
    DataFormat(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Generation failed after {attempts} attempt(s): {last_error}")]
    Generation { attempts: u32, last_error: String },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TicketError {
    /// Failures that count against the retry budget of a single generation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TicketError::Provider(_) | TicketError::Parse(_) | TicketError::Http(_)
        )
    }
}

impl From<libsql::Error> for TicketError {
    fn from(error: libsql::Error) -> Self {
        TicketError::Storage(error.to_string())
    }
}

impl From<csv::Error> for TicketError {
    fn from(error: csv::Error) -> Self {
        TicketError::DataFormat(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TicketError>;
