//! Per-message ingestion pipeline.
//!
//! ```text
//! envelope ─▶ RecipientFilter ─▶ find_calendar_part ─▶ calinbox_ical::parse ─▶ Forward
//!               │ rejected          │ none                 │ none / error        │ error
//!               ▼                   ▼                      ▼                     ▼
//!              550                 250                    250                   451
//! ```

use crate::attachment::find_calendar_part;
use crate::filter::RecipientFilter;
use crate::forward::{Forward, ForwardError};
use calinbox_mime::Message;
use calinbox_smtp::{Envelope, MessageHandler, Reply, ReplyCode};
use std::fmt;

/// How a message was disposed of.
#[derive(Debug)]
pub enum Outcome {
    /// No recipient matched the acceptance pattern.
    Rejected,
    /// The message carries no calendar part.
    NoAttachment,
    /// The calendar document has no event.
    NoEvent,
    /// The calendar document could not be parsed.
    Unparseable(calinbox_ical::Error),
    /// The event reached the task store.
    Forwarded {
        /// UID of the forwarded event.
        uid: String,
    },
    /// The task store call failed.
    ForwardFailed(ForwardError),
}

impl Outcome {
    /// Returns the SMTP reply to the end of `DATA`.
    ///
    /// Only a failed forward asks the sender to retry; a document that cannot
    /// be parsed is accepted and dropped.
    #[must_use]
    pub fn reply(&self) -> Reply {
        match self {
            Self::Rejected => {
                Reply::single(ReplyCode::MAILBOX_UNAVAILABLE, "recipient not allowed")
            }
            Self::NoAttachment => Reply::ok("no calendar attachment"),
            Self::NoEvent => Reply::ok("no event found"),
            Self::Unparseable(_) => Reply::ok("calendar attachment could not be parsed"),
            Self::Forwarded { .. } => Reply::ok("message accepted for delivery"),
            Self::ForwardFailed(_) => Reply::single(ReplyCode::LOCAL_ERROR, "failed to ingest"),
        }
    }

    /// Short label for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::NoAttachment => "no_attachment",
            Self::NoEvent => "no_event",
            Self::Unparseable(_) => "unparseable",
            Self::Forwarded { .. } => "forwarded",
            Self::ForwardFailed(_) => "forward_failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns inbound mail into task store events.
#[derive(Debug)]
pub struct Ingest<F> {
    filter: RecipientFilter,
    forwarder: F,
}

impl<F: Forward> Ingest<F> {
    /// Creates the pipeline.
    pub const fn new(filter: RecipientFilter, forwarder: F) -> Self {
        Self { filter, forwarder }
    }

    /// Returns the forwarder.
    pub const fn forwarder(&self) -> &F {
        &self.forwarder
    }

    /// Processes one message.
    ///
    /// The filter runs before any parsing, so mail for other recipients is
    /// never parsed nor forwarded.
    pub async fn process(&self, envelope: &Envelope) -> Outcome {
        if !self.filter.allows(envelope) {
            return Outcome::Rejected;
        }

        let message = Message::parse(&envelope.data);
        let Some(calendar) = find_calendar_part(&message) else {
            return Outcome::NoAttachment;
        };

        let event = match calinbox_ical::parse(&calendar) {
            Ok(Some(event)) => event,
            Ok(None) => return Outcome::NoEvent,
            Err(e) => return Outcome::Unparseable(e),
        };

        match self.forwarder.forward(&event).await {
            Ok(()) => Outcome::Forwarded { uid: event.uid },
            Err(e) => Outcome::ForwardFailed(e),
        }
    }
}

impl<F: Forward> MessageHandler for Ingest<F> {
    async fn handle(&self, envelope: Envelope) -> Reply {
        let outcome = self.process(&envelope).await;
        let sender = envelope.sender_str();
        let recipients = envelope.recipient_strs().collect::<Vec<_>>().join(", ");

        match &outcome {
            Outcome::Unparseable(e) => {
                tracing::warn!(sender, %recipients, error = %e, "calendar attachment could not be parsed");
            }
            Outcome::ForwardFailed(e) => {
                tracing::warn!(sender, %recipients, error = %e, "failed to forward event");
            }
            Outcome::Forwarded { uid } => {
                tracing::info!(sender, %recipients, %uid, "calendar event ingested");
            }
            Outcome::Rejected | Outcome::NoAttachment | Outcome::NoEvent => {
                tracing::info!(sender, %recipients, outcome = %outcome, "message not ingested");
            }
        }

        outcome.reply()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use calinbox_ical::NormalizedEvent;
    use calinbox_smtp::Address;
    use std::sync::Mutex;

    /// Records forwarded events; fails with the configured error instead.
    #[derive(Default)]
    struct MockForwarder {
        events: Mutex<Vec<NormalizedEvent>>,
        fail_with: Option<u16>,
    }

    impl MockForwarder {
        fn failing(status: u16) -> Self {
            Self {
                fail_with: Some(status),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.events.lock().unwrap().len()
        }
    }

    impl Forward for MockForwarder {
        async fn forward(&self, event: &NormalizedEvent) -> std::result::Result<(), ForwardError> {
            self.events.lock().unwrap().push(event.clone());
            match self.fail_with {
                Some(status) => Err(ForwardError::Status(status)),
                None => Ok(()),
            }
        }
    }

    fn ingest(pattern: Option<&str>, forwarder: MockForwarder) -> Ingest<MockForwarder> {
        Ingest::new(RecipientFilter::new(pattern).unwrap(), forwarder)
    }

    fn envelope(recipients: &[&str], data: &str) -> Envelope {
        Envelope::new(
            Some(Address::new("organizer@example.com").unwrap()),
            recipients.iter().map(|r| Address::new(*r).unwrap()).collect(),
            data.as_bytes().to_vec(),
        )
    }

    fn invite(calendar: &str) -> String {
        format!(
            concat!(
                "Subject: Invitation\r\n",
                "Content-Type: multipart/mixed; boundary=\"b\"\r\n",
                "\r\n",
                "--b\r\n",
                "Content-Type: text/plain\r\n",
                "\r\n",
                "Please join.\r\n",
                "--b\r\n",
                "Content-Type: text/calendar; method=REQUEST\r\n",
                "\r\n",
                "{}",
                "\r\n--b--\r\n",
            ),
            calendar
        )
    }

    const CALENDAR: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:u1\r\nDTSTART:20240115T090000\r\nEND:VEVENT\r\nEND:VCALENDAR";

    #[tokio::test]
    async fn test_forwards_first_event() {
        let pipeline = ingest(Some("invites@.*"), MockForwarder::default());
        let outcome = pipeline
            .process(&envelope(&["invites@tasks.example"], &invite(CALENDAR)))
            .await;

        assert!(matches!(&outcome, Outcome::Forwarded { uid } if uid == "u1"));
        assert_eq!(outcome.reply().to_string(), "250 message accepted for delivery");

        let events = pipeline.forwarder().events.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Calendar event");
        assert!(events[0].attendees.is_none());
    }

    #[tokio::test]
    async fn test_rejected_recipient_is_never_parsed() {
        let pipeline = ingest(Some("invites@.*"), MockForwarder::default());
        let outcome = pipeline
            .process(&envelope(&["someone@tasks.example"], &invite(CALENDAR)))
            .await;

        assert!(matches!(outcome, Outcome::Rejected));
        assert_eq!(outcome.reply().to_string(), "550 recipient not allowed");
        assert_eq!(pipeline.forwarder().calls(), 0);
    }

    #[tokio::test]
    async fn test_message_without_calendar() {
        let pipeline = ingest(None, MockForwarder::default());
        let outcome = pipeline
            .process(&envelope(&["a@example.com"], "Subject: hi\r\n\r\nhello\r\n"))
            .await;

        assert!(matches!(outcome, Outcome::NoAttachment));
        assert_eq!(outcome.reply().to_string(), "250 no calendar attachment");
        assert_eq!(pipeline.forwarder().calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_calendar_part_is_no_attachment() {
        let pipeline = ingest(None, MockForwarder::default());
        let outcome = pipeline
            .process(&envelope(
                &["a@example.com"],
                "Subject: hi\r\nContent-Type: text/calendar\r\n\r\n",
            ))
            .await;

        assert!(matches!(outcome, Outcome::NoAttachment));
        assert_eq!(outcome.reply().to_string(), "250 no calendar attachment");
        assert_eq!(pipeline.forwarder().calls(), 0);
    }

    #[tokio::test]
    async fn test_lowercase_calendar_is_forwarded() {
        let calendar = "begin:vcalendar\r\nbegin:vevent\r\nuid:u2\r\nend:vevent\r\nend:vcalendar";
        let pipeline = ingest(None, MockForwarder::default());
        let outcome = pipeline
            .process(&envelope(&["a@example.com"], &invite(calendar)))
            .await;

        assert!(matches!(&outcome, Outcome::Forwarded { uid } if uid == "u2"));
        assert_eq!(pipeline.forwarder().calls(), 1);
    }

    #[tokio::test]
    async fn test_calendar_without_event() {
        let calendar = "BEGIN:VCALENDAR\r\nBEGIN:VTIMEZONE\r\nTZID:Europe/Paris\r\nEND:VTIMEZONE\r\nEND:VCALENDAR";
        let pipeline = ingest(None, MockForwarder::default());
        let outcome = pipeline
            .process(&envelope(&["a@example.com"], &invite(calendar)))
            .await;

        assert!(matches!(outcome, Outcome::NoEvent));
        assert_eq!(outcome.reply().to_string(), "250 no event found");
    }

    #[tokio::test]
    async fn test_unparseable_calendar_is_accepted() {
        let calendar = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:u1\r\nDTSTART:tomorrow\r\nEND:VEVENT\r\nEND:VCALENDAR";
        let pipeline = ingest(None, MockForwarder::default());
        let outcome = pipeline
            .process(&envelope(&["a@example.com"], &invite(calendar)))
            .await;

        assert!(matches!(outcome, Outcome::Unparseable(_)));
        assert!(outcome.reply().is_success());
        assert_eq!(pipeline.forwarder().calls(), 0);
    }

    #[tokio::test]
    async fn test_forward_failure_is_transient() {
        for recipients in [&["a@example.com"][..], &["a@example.com", "b@example.com"][..]] {
            let pipeline = ingest(None, MockForwarder::failing(503));
            let reply = pipeline
                .handle(envelope(recipients, &invite(CALENDAR)))
                .await;

            assert_eq!(reply.to_string(), "451 failed to ingest");
            assert!(reply.is_transient_error());
        }
    }

    #[tokio::test]
    async fn test_handle_returns_outcome_reply() {
        let pipeline = ingest(Some("invites@tasks\\.example"), MockForwarder::default());
        let reply = pipeline
            .handle(envelope(&["INVITES@tasks.example"], &invite(CALENDAR)))
            .await;
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(pipeline.forwarder().calls(), 1);
    }
}
