//! SMTP extension types.

use std::fmt;

/// SMTP service extensions advertised in the EHLO reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// 8BITMIME - 8-bit MIME transport (RFC 6152)
    EightBitMime,
    /// PIPELINING - Command pipelining (RFC 2920)
    Pipelining,
    /// SIZE - Maximum message size in bytes (RFC 1870)
    Size(usize),
    /// SMTPUTF8 - UTF-8 email addresses (RFC 6531)
    SmtpUtf8,
}

impl Extension {
    /// Returns the EHLO keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::EightBitMime => "8BITMIME",
            Self::Pipelining => "PIPELINING",
            Self::Size(_) => "SIZE",
            Self::SmtpUtf8 => "SMTPUTF8",
        }
    }

    /// Returns the extensions advertised for the given message size limit.
    #[must_use]
    pub const fn advertised(max_message_size: usize) -> [Self; 4] {
        [
            Self::EightBitMime,
            Self::Pipelining,
            Self::Size(max_message_size),
            Self::SmtpUtf8,
        ]
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size(size) => write!(f, "SIZE {size}"),
            other => f.write_str(other.keyword()),
        }
    }
}
