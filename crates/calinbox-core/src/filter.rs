//! Recipient filtering.

use crate::error::Result;
use calinbox_smtp::Envelope;
use regex::{Regex, RegexBuilder};

/// Decides whether a message is addressed to the ingestion mailbox.
///
/// The pattern must match a whole recipient address, ignoring case. Without
/// a pattern every message is accepted.
#[derive(Debug, Clone)]
pub struct RecipientFilter {
    pattern: Option<Regex>,
}

impl RecipientFilter {
    /// Compiles the acceptance pattern. `None` or a blank pattern accepts all.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regular expression.
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        let pattern = match pattern.filter(|p| !p.trim().is_empty()) {
            Some(p) => Some(
                RegexBuilder::new(&format!("^(?:{p})$"))
                    .case_insensitive(true)
                    .build()?,
            ),
            None => None,
        };
        Ok(Self { pattern })
    }

    /// Returns true if any envelope recipient matches.
    #[must_use]
    pub fn allows(&self, envelope: &Envelope) -> bool {
        self.pattern
            .as_ref()
            .is_none_or(|pattern| envelope.recipient_strs().any(|rcpt| pattern.is_match(rcpt)))
    }
}
