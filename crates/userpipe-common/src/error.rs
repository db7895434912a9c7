//! Error types for userpipe

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type shared by the fetch, transform and load stages
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Failed to decode upstream payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Upstream payload has no `results` array")]
    MissingResults,

    #[error("Raw record {index} is malformed: {source}")]
    MalformedRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid timestamp in `{field}`: {value:?} ({source})")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether the error came from the destination database.
    ///
    /// The load stage absorbs these; everything else propagates.
    pub fn is_database(&self) -> bool {
        matches!(self, PipelineError::Database(_))
    }
}
