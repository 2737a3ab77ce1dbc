//! Calendar attachment lookup.

use calinbox_mime::{Body, Message, Part};

/// MIME type of an iCalendar document.
pub const CALENDAR_MIME_TYPE: &str = "text/calendar";

/// File extension of an iCalendar document.
pub const CALENDAR_EXTENSION: &str = ".ics";

/// Returns the decoded payload of the first calendar part of `message`.
///
/// Parts are visited depth-first in serialized order, so a single-part
/// message is checked as a whole. A part qualifies when it is declared
/// `text/calendar` or its filename ends in `.ics`, ignoring case. If the
/// transfer encoding cannot be undone the raw payload is returned. An empty
/// payload counts as no attachment.
#[must_use]
pub fn find_calendar_part(message: &Message) -> Option<Vec<u8>> {
    let part = message
        .walk()
        .filter(|part| part.is_leaf())
        .find(|part| is_calendar(part))?;

    let payload = match part.decode_body() {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!(?e, encoding = ?part.transfer_encoding(), "could not decode calendar part, using raw payload");
            match &part.body {
                Body::Leaf(raw) => Some(raw.clone()),
                Body::Multipart(_) | Body::Message(_) => None,
            }
        }
    };
    payload.filter(|payload| !payload.is_empty())
}

fn is_calendar(part: &Part) -> bool {
    if part.content_type().mime_type() == CALENDAR_MIME_TYPE {
        return true;
    }
    part.filename()
        .is_some_and(|name| name.to_lowercase().ends_with(CALENDAR_EXTENSION))
}
