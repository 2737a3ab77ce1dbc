//! Error types for calendar parsing.

/// Result type alias for calendar parsing.
pub type Result<T> = std::result::Result<T, Error>;

/// Calendar parsing errors.
///
/// A document without any event is not an error; see [`crate::parse`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The component structure could not be parsed.
    #[error("Malformed calendar document: {0}")]
    Malformed(String),

    /// A date or date-time property holds an invalid value.
    #[error("Invalid {property} value: {value:?}")]
    InvalidTime {
        /// Property name (e.g. `DTSTART`).
        property: String,
        /// Raw property value.
        value: String,
    },
}
