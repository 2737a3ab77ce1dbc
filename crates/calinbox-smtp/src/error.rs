//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Command syntax error.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// MAIL or RCPT parameter this server does not implement.
    #[error("Unsupported parameter: {0}")]
    UnsupportedParameter(String),

    /// Connection closed in the middle of a message.
    #[error("Connection closed during DATA")]
    UnexpectedEof,

    /// Client sent nothing within the idle timeout.
    #[error("Timed out waiting for client")]
    Timeout,
}

impl Error {
    /// Creates a syntax error.
    #[must_use]
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::syntax("missing argument").to_string(),
            "Syntax error: missing argument"
        );
    }
}
