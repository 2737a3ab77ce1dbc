//! SMTP envelope.

use super::Address;

/// Sender, recipients and raw content of one message transaction.
///
/// Built up by `MAIL`, `RCPT` and `DATA`, then handed to the
/// [`MessageHandler`](crate::MessageHandler) and dropped once it has replied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Reverse path; `None` for the null sender `<>` used by bounces.
    pub sender: Option<Address>,
    /// Forward paths in the order they were accepted.
    pub recipients: Vec<Address>,
    /// Message content with dot-stuffing removed.
    pub data: Vec<u8>,
}

impl Envelope {
    /// Creates an envelope.
    #[must_use]
    pub const fn new(sender: Option<Address>, recipients: Vec<Address>, data: Vec<u8>) -> Self {
        Self {
            sender,
            recipients,
            data,
        }
    }

    /// Returns an iterator over the recipient addresses as strings.
    pub fn recipient_strs(&self) -> impl Iterator<Item = &str> {
        self.recipients.iter().map(Address::as_str)
    }

    /// Returns the sender as a string, empty for the null sender.
    #[must_use]
    pub fn sender_str(&self) -> &str {
        self.sender.as_ref().map_or("", Address::as_str)
    }
}
