//! MIME message structure and handling.
//!
//! A message is a tree of [`Part`]s. Every node is explicitly tagged as a
//! leaf carrying a payload, a multipart container, or an encapsulated
//! `message/rfc822` container, so traversal never has to re-inspect headers
//! to decide whether to descend.

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Nesting depth beyond which containers are kept as opaque leaves.
const MAX_DEPTH: usize = 32;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Body of a MIME part.
#[derive(Debug, Clone)]
pub enum Body {
    /// Payload bytes, still transfer-encoded.
    Leaf(Vec<u8>),
    /// Children of a `multipart/*` container, in serialized order.
    Multipart(Vec<Part>),
    /// An encapsulated `message/rfc822`.
    Message(Box<Part>),
}

/// MIME message part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body.
    pub body: Body,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Body) -> Self {
        Self { headers, body }
    }

    /// Parses a part (header section, blank line, body) from raw bytes.
    fn parse(raw: &[u8], depth: usize) -> Self {
        let (header_bytes, body_bytes) = split_header_body(raw);
        let headers = Headers::parse(header_bytes);
        let content_type = content_type_of(&headers);

        let body = if depth >= MAX_DEPTH {
            Body::Leaf(body_bytes.to_vec())
        } else if content_type.is_multipart() {
            match content_type.boundary() {
                Some(boundary) => Body::Multipart(
                    split_multipart(body_bytes, boundary)
                        .into_iter()
                        .map(|child| Self::parse(child, depth + 1))
                        .collect(),
                ),
                None => Body::Leaf(body_bytes.to_vec()),
            }
        } else if content_type.is_message() && is_identity_encoding(&headers) {
            Body::Message(Box::new(Self::parse(body_bytes, depth + 1)))
        } else {
            Body::Leaf(body_bytes.to_vec())
        };

        Self { headers, body }
    }

    /// Gets the content type, defaulting to `text/plain` when the header is
    /// missing or unparseable.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        content_type_of(&self.headers)
    }

    /// Gets the content disposition, if declared.
    #[must_use]
    pub fn content_disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// Gets the attachment filename.
    ///
    /// Uses the Content-Disposition `filename` parameter, falling back to the
    /// Content-Type `name` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.content_disposition()
            .and_then(|cd| cd.filename())
            .or_else(|| self.content_type().name())
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns true if this part carries its own payload.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self.body, Body::Leaf(_))
    }

    /// Returns the direct children of a container part.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.body {
            Body::Leaf(_) => &[],
            Body::Multipart(parts) => parts,
            Body::Message(inner) => std::slice::from_ref(inner.as_ref()),
        }
    }

    /// Decodes the payload according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the part is a container or Base64 decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        let raw = match &self.body {
            Body::Leaf(raw) => raw,
            Body::Multipart(_) => return Err(Error::NotLeaf("multipart")),
            Body::Message(_) => return Err(Error::NotLeaf("message")),
        };

        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(raw),
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(raw)),
            _ => Ok(raw.clone()),
        }
    }

    /// Gets the decoded payload as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        String::from_utf8(decoded).map_err(Into::into)
    }
}

/// MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Top-level part (headers of the message itself).
    pub root: Part,
}

impl Message {
    /// Parses a raw RFC 5322 message.
    ///
    /// Parsing never fails: malformed structure degrades to leaf parts, the
    /// way mail user agents render broken mail instead of refusing it.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            root: Part::parse(raw, 0),
        }
    }

    /// Gets the message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Checks if the top-level part is a multipart container.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.root.body, Body::Multipart(_))
    }

    /// Gets the Subject header, RFC 2047 decoded.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.root.headers.get_decoded("subject")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.root.headers.get("message-id")
    }

    /// Walks every part depth-first in serialized order, starting with the
    /// root and including containers.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![&self.root],
        }
    }
}

/// Depth-first pre-order iterator over the parts of a [`Message`].
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a Part>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.children().iter().rev());
        Some(part)
    }
}

fn content_type_of(headers: &Headers) -> ContentType {
    headers
        .get("content-type")
        .and_then(ContentType::parse)
        .unwrap_or_else(ContentType::text_plain)
}

/// Encapsulated messages are only parsed when not transfer-encoded.
fn is_identity_encoding(headers: &Headers) -> bool {
    matches!(
        headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse),
        TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary
    )
}

/// Iterates lines as `(start, end_of_content, end_including_terminator)`.
fn lines(data: &[u8]) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= data.len() {
            return None;
        }
        let start = pos;
        let (content_end, next) = data[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or((data.len(), data.len()), |i| (start + i, start + i + 1));
        let content_end = if content_end > start && data[content_end - 1] == b'\r' {
            content_end - 1
        } else {
            content_end
        };
        pos = next;
        Some((start, content_end, next))
    })
}

/// Splits raw part bytes at the first empty line.
fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    for (start, content_end, next) in lines(raw) {
        if start == content_end {
            return (&raw[..start], &raw[next..]);
        }
        // A first line that is not a header means the part has no headers.
        if start == 0 && !looks_like_header(&raw[start..content_end]) {
            return (&[], raw);
        }
    }
    (raw, &[])
}

fn looks_like_header(line: &[u8]) -> bool {
    line.iter()
        .position(|&b| b == b':')
        .is_some_and(|colon| colon > 0 && !line[..colon].iter().any(u8::is_ascii_whitespace))
}

/// Splits a multipart body into its raw child parts.
///
/// The preamble and epilogue are discarded. The line break preceding each
/// delimiter belongs to the delimiter, not the part. Without a closing
/// delimiter the last part runs to the end of input.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut current_start: Option<usize> = None;

    for (start, content_end, next) in lines(body) {
        let line = &body[start..content_end];
        let Some(rest) = line.strip_prefix(delimiter) else {
            continue;
        };
        let is_close = rest.starts_with(b"--");
        let rest = if is_close { &rest[2..] } else { rest };
        if !rest.iter().all(|b| *b == b' ' || *b == b'\t') {
            continue;
        }

        if let Some(part_start) = current_start.take() {
            let part_end = strip_line_break(body, part_start, start);
            parts.push(&body[part_start..part_end]);
        }
        if is_close {
            return parts;
        }
        current_start = Some(next);
    }

    if let Some(part_start) = current_start {
        parts.push(&body[part_start.min(body.len())..]);
    }
    parts
}

/// Returns `end` moved back over one preceding CRLF or LF, not before `start`.
fn strip_line_break(data: &[u8], start: usize, end: usize) -> usize {
    let mut end = end;
    if end > start && data[end - 1] == b'\n' {
        end -= 1;
        if end > start && data[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    const MULTIPART: &str = concat!(
        "From: organizer@example.com\r\n",
        "To: invites@tasks.example\r\n",
        "Subject: Invitation\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "This is the preamble.\r\n",
        "--outer\r\n",
        "Content-Type: multipart/alternative; boundary=inner\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "You are invited.\r\n",
        "--inner\r\n",
        "Content-Type: text/calendar; method=REQUEST\r\n",
        "\r\n",
        "BEGIN:VCALENDAR\r\n",
        "END:VCALENDAR\r\n",
        "--inner--\r\n",
        "--outer\r\n",
        "Content-Type: application/octet-stream\r\n",
        "Content-Disposition: attachment; filename=\"invite.ics\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "QkVHSU46VkNBTEVOREFS\r\n",
        "--outer--\r\n",
        "epilogue\r\n",
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-unknown"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_single_part_message() {
        let message = Message::parse(b"Subject: Hi\r\nContent-Type: text/plain\r\n\r\nHello\r\n");
        assert!(!message.is_multipart());
        assert!(message.root.is_leaf());
        assert_eq!(message.subject().as_deref(), Some("Hi"));
        assert_eq!(message.root.body_text().unwrap(), "Hello\r\n");
        assert_eq!(message.walk().count(), 1);
    }

    #[test]
    fn test_missing_content_type_defaults_to_text_plain() {
        let message = Message::parse(b"Subject: Hi\r\n\r\nHello");
        assert_eq!(message.root.content_type().mime_type(), "text/plain");
    }

    #[test]
    fn test_nested_multipart_walk_order() {
        let message = Message::parse(MULTIPART.as_bytes());
        assert!(message.is_multipart());

        let types: Vec<String> = message
            .walk()
            .map(|part| part.content_type().mime_type())
            .collect();
        assert_eq!(
            types,
            vec![
                "multipart/mixed",
                "multipart/alternative",
                "text/plain",
                "text/calendar",
                "application/octet-stream",
            ]
        );
    }

    #[test]
    fn test_part_bodies_exclude_delimiter_line_break() {
        let message = Message::parse(MULTIPART.as_bytes());
        let plain = message
            .walk()
            .find(|part| part.content_type().mime_type() == "text/plain")
            .unwrap();
        assert_eq!(plain.body_text().unwrap(), "You are invited.");

        let calendar = message
            .walk()
            .find(|part| part.content_type().mime_type() == "text/calendar")
            .unwrap();
        assert_eq!(
            calendar.body_text().unwrap(),
            "BEGIN:VCALENDAR\r\nEND:VCALENDAR"
        );
    }

    #[test]
    fn test_base64_attachment_decoding_and_filename() {
        let message = Message::parse(MULTIPART.as_bytes());
        let attachment = message.walk().last().unwrap();
        assert_eq!(attachment.filename().as_deref(), Some("invite.ics"));
        assert_eq!(attachment.transfer_encoding(), TransferEncoding::Base64);
        assert_eq!(attachment.decode_body().unwrap(), b"BEGIN:VCALENDAR");
    }

    #[test]
    fn test_container_has_no_payload() {
        let message = Message::parse(MULTIPART.as_bytes());
        assert!(matches!(
            message.root.decode_body(),
            Err(Error::NotLeaf("multipart"))
        ));
    }

    #[test]
    fn test_multipart_without_boundary_is_leaf() {
        let message = Message::parse(b"Content-Type: multipart/mixed\r\n\r\n--x\r\nbody\r\n");
        assert!(message.root.is_leaf());
        assert_eq!(message.walk().count(), 1);
    }

    #[test]
    fn test_multipart_without_close_delimiter() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\n",
            "\n",
            "--b\n",
            "Content-Type: text/plain\n",
            "\n",
            "first\n",
            "--b\n",
            "Content-Type: text/calendar\n",
            "\n",
            "truncated",
        );
        let message = Message::parse(raw.as_bytes());
        let children = message.root.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].body_text().unwrap(), "first");
        assert_eq!(children[1].body_text().unwrap(), "truncated");
    }

    #[test]
    fn test_boundary_prefix_lines_are_content() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "\r\n",
            "--bogus line\r\n",
            "--b--\r\n",
        );
        let message = Message::parse(raw.as_bytes());
        let children = message.root.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].body_text().unwrap(), "--bogus line");
    }

    #[test]
    fn test_encapsulated_message_is_walked() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: message/rfc822\r\n",
            "\r\n",
            "Subject: forwarded\r\n",
            "Content-Type: text/calendar\r\n",
            "\r\n",
            "BEGIN:VCALENDAR\r\n",
            "--b--\r\n",
        );
        let message = Message::parse(raw.as_bytes());
        let types: Vec<String> = message
            .walk()
            .map(|part| part.content_type().mime_type())
            .collect();
        assert_eq!(types, vec!["multipart/mixed", "message/rfc822", "text/calendar"]);
    }

    #[test]
    fn test_headerless_part() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "\r\n",
            "just text\r\n",
            "--b--\r\n",
        );
        let message = Message::parse(raw.as_bytes());
        let child = &message.root.children()[0];
        assert!(child.headers.is_empty());
        assert_eq!(child.body_text().unwrap(), "just text");
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let mut raw = String::new();
        for depth in 0..(MAX_DEPTH + 8) {
            raw.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=b{depth}\r\n\r\n--b{depth}\r\n"
            ));
        }
        let message = Message::parse(raw.as_bytes());
        assert!(message.walk().count() <= MAX_DEPTH + 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
                let message = Message::parse(&raw);
                prop_assert!(message.walk().count() >= 1);
            }

            #[test]
            fn multipart_children_round_trip(bodies in proptest::collection::vec("[a-z ]{0,40}", 1..5)) {
                let mut raw = String::from("Content-Type: multipart/mixed; boundary=zz\r\n\r\n");
                for body in &bodies {
                    raw.push_str("--zz\r\nContent-Type: text/plain\r\n\r\n");
                    raw.push_str(body);
                    raw.push_str("\r\n");
                }
                raw.push_str("--zz--\r\n");

                let message = Message::parse(raw.as_bytes());
                let decoded: Vec<String> = message
                    .root
                    .children()
                    .iter()
                    .map(|part| part.body_text().unwrap())
                    .collect();
                prop_assert_eq!(decoded, bodies);
            }
        }
    }
}
