//! # calinbox-ical
//!
//! Calendar document parsing for invitation ingestion.
//!
//! Reads an iCalendar (RFC 5545) document and normalizes the first `VEVENT`
//! into a [`NormalizedEvent`]: identifier, title, description, start and end
//! timestamps and a joined attendee list.
//!
//! ## Quick Start
//!
//! ```
//! use calinbox_ical::parse;
//!
//! let ics = b"BEGIN:VCALENDAR\r\n\
//!             BEGIN:VEVENT\r\n\
//!             UID:evt-1\r\n\
//!             SUMMARY:Standup\r\n\
//!             DTSTART:20240115T090000Z\r\n\
//!             END:VEVENT\r\n\
//!             END:VCALENDAR\r\n";
//!
//! let event = parse(ics)?.expect("document has an event");
//! assert_eq!(event.summary, "Standup");
//! assert_eq!(event.start.unwrap().to_string(), "2024-01-15T09:00:00+00:00");
//! # Ok::<(), calinbox_ical::Error>(())
//! ```
//!
//! A document without events yields `Ok(None)`; a document that cannot be
//! parsed yields an [`Error`], so callers can tell the two apart.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod event;
mod parser;

pub use error::{Error, Result};
pub use event::{DEFAULT_SUMMARY, EventTime, NormalizedEvent};
pub use parser::parse;
