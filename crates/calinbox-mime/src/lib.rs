//! # calinbox-mime
//!
//! Lenient MIME parsing for inbound mail.
//!
//! ## Features
//!
//! - **Message tree**: every part is tagged as a leaf, a multipart container
//!   or an encapsulated message
//! - **Depth-first walk**: parts are visited in serialized order
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words and
//!   RFC 2231 parameter values
//! - **Never fails**: malformed structure degrades to leaf parts
//!
//! ## Quick Start
//!
//! ```
//! use calinbox_mime::Message;
//!
//! let raw = b"Subject: Standup\r\n\
//!             Content-Type: multipart/mixed; boundary=b\r\n\
//!             \r\n\
//!             --b\r\n\
//!             Content-Type: text/calendar\r\n\
//!             \r\n\
//!             BEGIN:VCALENDAR\r\n\
//!             --b--\r\n";
//!
//! let message = Message::parse(raw);
//! let calendar = message
//!     .walk()
//!     .find(|part| part.content_type().mime_type() == "text/calendar");
//! assert!(calendar.is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::{ContentDisposition, ContentType};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, Message, Part, TransferEncoding, Walk};
