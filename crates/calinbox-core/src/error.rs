//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Errors raised while setting up ingestion.
///
/// Per-message failures never surface here; they become an
/// [`Outcome`](crate::Outcome) and an SMTP reply instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The recipient pattern is not a valid regular expression.
    #[error("Invalid recipient pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The task store URL is unusable.
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
