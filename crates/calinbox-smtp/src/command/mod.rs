//! SMTP commands received from clients.

use crate::error::Result;
use crate::parser;
use crate::types::Address;

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address, `None` for the null reverse path `<>`
        from: Option<Address>,
        /// BODY parameter (7BIT, 8BITMIME)
        body: Option<String>,
        /// SIZE parameter
        size: Option<usize>,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// VRFY - Verify address
    Vrfy {
        /// Address to verify
        address: String,
    },
    /// HELP - Ask for help
    Help,
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
    /// A verb this server does not know
    Unknown {
        /// The verb as sent
        verb: String,
    },
}

impl Command {
    /// Parses one command line, without its CRLF terminator.
    ///
    /// Verbs are case-insensitive. Unknown verbs parse successfully to
    /// [`Command::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns an error if a known verb has missing or malformed arguments.
    pub fn parse(line: &[u8]) -> Result<Self> {
        parser::parse_command(line)
    }

    /// Returns the command verb.
    #[must_use]
    pub fn verb(&self) -> &str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Vrfy { .. } => "VRFY",
            Self::Help => "HELP",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
            Self::Unknown { verb } => verb,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_verb() {
        assert_eq!(Command::parse(b"ehlo client").unwrap().verb(), "EHLO");
        assert_eq!(Command::parse(b"DATA").unwrap().verb(), "DATA");
        assert_eq!(Command::parse(b"XYZZY now").unwrap().verb(), "XYZZY");
    }

    #[test]
    fn test_parse_delegates_to_parser() {
        assert_eq!(
            Command::parse(b"RCPT TO:<invites@tasks.example>").unwrap(),
            Command::RcptTo {
                to: Address::new("invites@tasks.example").unwrap(),
            }
        );
    }
}
