//! Normalized event record.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::fmt;

/// Summary used when the event has no title, or an empty one.
pub const DEFAULT_SUMMARY: &str = "Calendar event";

/// Fields extracted from the first `VEVENT` of a calendar document.
///
/// Serializes to the JSON body accepted by the task store, with absent values
/// written as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedEvent {
    /// `UID` value, empty when the event has none.
    pub uid: String,
    /// `SUMMARY` value, or [`DEFAULT_SUMMARY`].
    pub summary: String,
    /// `DESCRIPTION` value when present and non-empty.
    pub description: Option<String>,
    /// `DTSTART`.
    pub start: Option<EventTime>,
    /// `DTEND`.
    pub end: Option<EventTime>,
    /// Every `ATTENDEE` value joined with `", "`.
    pub attendees: Option<String>,
}

/// A `DATE` or `DATE-TIME` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    /// All-day value: `2024-01-15`.
    Date(NaiveDate),
    /// Local time without zone: `2024-01-15T09:00:00`.
    Floating(NaiveDateTime),
    /// UTC or `TZID`-resolved time: `2024-01-15T09:00:00+01:00`.
    Zoned(DateTime<FixedOffset>),
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Floating(local) => write!(f, "{}", local.format("%Y-%m-%dT%H:%M:%S")),
            Self::Zoned(zoned) => write!(f, "{}", zoned.format("%Y-%m-%dT%H:%M:%S%:z")),
        }
    }
}

impl Serialize for EventTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_time_display() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(EventTime::Date(date).to_string(), "2024-01-15");

        let local = date.and_hms_opt(9, 0, 0).unwrap();
        assert_eq!(EventTime::Floating(local).to_string(), "2024-01-15T09:00:00");

        let utc = FixedOffset::east_opt(0)
            .unwrap()
            .from_local_datetime(&local)
            .unwrap();
        assert_eq!(
            EventTime::Zoned(utc).to_string(),
            "2024-01-15T09:00:00+00:00"
        );

        let cet = FixedOffset::east_opt(3600)
            .unwrap()
            .from_local_datetime(&local)
            .unwrap();
        assert_eq!(
            EventTime::Zoned(cet).to_string(),
            "2024-01-15T09:00:00+01:00"
        );
    }

    #[test]
    fn test_normalized_event_json_shape() {
        let event = NormalizedEvent {
            uid: "u1".to_string(),
            summary: DEFAULT_SUMMARY.to_string(),
            description: None,
            start: Some(EventTime::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())),
            end: None,
            attendees: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "uid": "u1",
                "summary": "Calendar event",
                "description": null,
                "start": "2024-03-01",
                "end": null,
                "attendees": null,
            })
        );
    }
}
