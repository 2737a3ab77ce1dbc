//! `VEVENT` extraction from iCalendar documents.

use crate::error::{Error, Result};
use crate::event::{DEFAULT_SUMMARY, EventTime, NormalizedEvent};
use chrono::{NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use std::borrow::Cow;

const DATE_FORMAT: &str = "%Y%m%d";
const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Parses a calendar document and normalizes its first event.
///
/// Components are scanned in document order; time zone definitions, to-dos
/// and other non-event components are ignored. Bytes that are not valid
/// UTF-8 are replaced.
///
/// Returns `Ok(None)` when the document holds no `VEVENT`, including when it
/// is empty.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if the component structure cannot be parsed
/// and [`Error::InvalidTime`] if `DTSTART` or `DTEND` holds an invalid value.
pub fn parse(bytes: &[u8]) -> Result<Option<NormalizedEvent>> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Ok(None);
    }

    let text = uppercase_component_names(&text.replace("\r\n", "\n"));
    let reader = ical::IcalParser::new(text.as_bytes());

    for calendar in reader {
        let calendar = calendar.map_err(|e| Error::Malformed(e.to_string()))?;
        if let Some(event) = calendar.events.first() {
            return normalize(event).map(Some);
        }
    }

    Ok(None)
}

/// Uppercases `BEGIN`/`END` delimiter lines, whose names are
/// case-insensitive but matched literally by the `ical` reader.
fn uppercase_component_names(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let is_delimiter = line
                .get(..6)
                .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:"))
                || line
                    .get(..4)
                    .is_some_and(|head| head.eq_ignore_ascii_case("END:"));
            if is_delimiter {
                Cow::Owned(line.to_ascii_uppercase())
            } else {
                Cow::Borrowed(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize(event: &IcalEvent) -> Result<NormalizedEvent> {
    let props = &event.properties;

    let uid = text_value(props, "UID").unwrap_or_default();
    let summary = text_value(props, "SUMMARY")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
    let description = text_value(props, "DESCRIPTION").filter(|d| !d.is_empty());

    let start = find(props, "DTSTART").map(parse_time).transpose()?;
    let end = find(props, "DTEND").map(parse_time).transpose()?;

    let attendees: Vec<&str> = props
        .iter()
        .filter(|p| p.name.eq_ignore_ascii_case("ATTENDEE"))
        .filter_map(|p| p.value.as_deref())
        .collect();
    let attendees = (!attendees.is_empty()).then(|| attendees.join(", "));

    tracing::trace!(%uid, ?start, ?end, "normalized event");

    Ok(NormalizedEvent {
        uid,
        summary,
        description,
        start,
        end,
        attendees,
    })
}

fn find<'a>(props: &'a [Property], name: &str) -> Option<&'a Property> {
    props.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

fn text_value(props: &[Property], name: &str) -> Option<String> {
    find(props, name)
        .and_then(|p| p.value.as_deref())
        .map(unescape_text)
}

fn param<'a>(prop: &'a Property, name: &str) -> Option<&'a str> {
    prop.params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(|v| v.trim_matches('"'))
}

/// Parses a `DATE` or `DATE-TIME` property.
fn parse_time(prop: &Property) -> Result<EventTime> {
    let raw = prop.value.as_deref().unwrap_or_default().trim();
    let invalid = || Error::InvalidTime {
        property: prop.name.to_uppercase(),
        value: raw.to_string(),
    };

    let is_date = param(prop, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || (raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()));
    if is_date {
        return NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(EventTime::Date)
            .map_err(|_| invalid());
    }

    if let Some(utc) = raw.strip_suffix(['Z', 'z']) {
        let naive = NaiveDateTime::parse_from_str(utc, DATE_TIME_FORMAT).map_err(|_| invalid())?;
        return Ok(EventTime::Zoned(Utc.from_utc_datetime(&naive).fixed_offset()));
    }

    let naive = NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT).map_err(|_| invalid())?;
    let Some(tzid) = param(prop, "TZID") else {
        return Ok(EventTime::Floating(naive));
    };

    match tzid.parse::<Tz>() {
        Ok(tz) => Ok(EventTime::Zoned(resolve_local(tz, naive))),
        Err(_) => {
            tracing::debug!(tzid, "unknown TZID, keeping floating time");
            Ok(EventTime::Floating(naive))
        }
    }
}

/// Resolves a wall-clock time in `tz`, taking the earlier instant when the
/// time is ambiguous and the pre-transition offset when it does not exist.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> chrono::DateTime<chrono::FixedOffset> {
    if let Some(resolved) = tz.from_local_datetime(&naive).earliest() {
        return resolved.fixed_offset();
    }
    // In a gap: no transition is shorter than a few hours, so three hours
    // earlier is still on the old offset.
    let offset = naive
        .checked_sub_signed(TimeDelta::hours(3))
        .and_then(|before| tz.from_local_datetime(&before).earliest())
        .map_or_else(
            || tz.offset_from_utc_datetime(&naive).fix(),
            |before| before.offset().fix(),
        );
    offset
        .from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| offset.from_utc_datetime(&naive))
}

/// Unescapes an RFC 5545 TEXT value.
fn unescape_text(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => result.push('\n'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
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

    fn calendar(event_lines: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//calinbox//test//EN\r\n\
             BEGIN:VEVENT\r\n{event_lines}END:VEVENT\r\nEND:VCALENDAR\r\n"
        )
    }

    #[test]
    fn test_parse_standup() {
        let ics = calendar(concat!(
            "UID:evt-1\r\n",
            "SUMMARY:Standup\r\n",
            "DTSTART:20240115T090000\r\n",
            "DTEND:20240115T091500\r\n",
            "ATTENDEE:a@x.com\r\n",
            "ATTENDEE:b@x.com\r\n",
        ));

        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.uid, "evt-1");
        assert_eq!(event.summary, "Standup");
        assert_eq!(event.description, None);
        assert_eq!(event.start.unwrap().to_string(), "2024-01-15T09:00:00");
        assert_eq!(event.end.unwrap().to_string(), "2024-01-15T09:15:00");
        assert_eq!(event.attendees.as_deref(), Some("a@x.com, b@x.com"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let ics = calendar("UID:evt-1\r\nSUMMARY:Standup\r\nDTSTART:20240115T090000Z\r\n");
        assert_eq!(
            parse(ics.as_bytes()).unwrap(),
            parse(ics.as_bytes()).unwrap()
        );
    }

    #[test]
    fn test_missing_summary_uses_default() {
        let ics = calendar("UID:u1\r\nDTSTART:20240115T090000Z\r\n");
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.uid, "u1");
        assert_eq!(event.summary, DEFAULT_SUMMARY);
        assert!(event.attendees.is_none());
    }

    #[test]
    fn test_empty_summary_and_description() {
        let ics = calendar("SUMMARY:\r\nDESCRIPTION:\r\n");
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.uid, "");
        assert_eq!(event.summary, DEFAULT_SUMMARY);
        assert!(event.description.is_none());
        assert!(event.start.is_none());
        assert!(event.end.is_none());
    }

    #[test]
    fn test_attendee_values_are_literal() {
        let ics = calendar(concat!(
            "ATTENDEE;CN=Alice;ROLE=REQ-PARTICIPANT:mailto:alice@example.com\r\n",
            "ATTENDEE;CN=\"Bob, Jr.\":mailto:bob@example.com\r\n",
        ));
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(
            event.attendees.as_deref(),
            Some("mailto:alice@example.com, mailto:bob@example.com")
        );
    }

    #[test]
    fn test_utc_time() {
        let ics = calendar("DTSTART:20240115T090000Z\r\n");
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.start.unwrap().to_string(), "2024-01-15T09:00:00+00:00");
    }

    #[test]
    fn test_tzid_time() {
        let ics = calendar(concat!(
            "DTSTART;TZID=Europe/Berlin:20240115T090000\r\n",
            "DTEND;TZID=America/New_York:20240715T090000\r\n",
        ));
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.start.unwrap().to_string(), "2024-01-15T09:00:00+01:00");
        assert_eq!(event.end.unwrap().to_string(), "2024-07-15T09:00:00-04:00");
    }

    #[test]
    fn test_tzid_time_in_dst_gap() {
        let ics = calendar("DTSTART;TZID=Europe/Berlin:20240331T023000\r\n");
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.start.unwrap().to_string(), "2024-03-31T02:30:00+01:00");
    }

    #[test]
    fn test_tzid_time_in_dst_overlap_takes_earlier() {
        let ics = calendar("DTSTART;TZID=Europe/Berlin:20241027T023000\r\n");
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.start.unwrap().to_string(), "2024-10-27T02:30:00+02:00");
    }

    #[test]
    fn test_lowercase_component_names() {
        let ics = concat!(
            "begin:vcalendar\r\n",
            "version:2.0\r\n",
            "Begin:VEvent\r\n",
            "uid:u1\r\n",
            "summary:Standup\r\n",
            "dtstart:20240115T090000\r\n",
            "end:vevent\r\n",
            "end:vcalendar\r\n",
        );
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.uid, "u1");
        assert_eq!(event.summary, "Standup");
        assert_eq!(event.start.unwrap().to_string(), "2024-01-15T09:00:00");
    }

    #[test]
    fn test_uppercase_component_names_leaves_values() {
        assert_eq!(
            uppercase_component_names("begin:vevent\nsummary:end: of day\nend:vevent"),
            "BEGIN:VEVENT\nsummary:end: of day\nEND:VEVENT"
        );
    }

    #[test]
    fn test_unknown_tzid_stays_floating() {
        let ics = calendar("DTSTART;TZID=Eastern Standard Time:20240115T090000\r\n");
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.start.unwrap().to_string(), "2024-01-15T09:00:00");
    }

    #[test]
    fn test_all_day_date() {
        let ics = calendar("DTSTART;VALUE=DATE:20240301\r\nDTEND:20240302\r\n");
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.start.unwrap().to_string(), "2024-03-01");
        assert_eq!(event.end.unwrap().to_string(), "2024-03-02");
    }

    #[test]
    fn test_invalid_time_is_error() {
        let ics = calendar("DTSTART:2024-01-15 nine\r\n");
        let err = parse(ics.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidTime { ref property, .. } if property == "DTSTART"));
    }

    #[test]
    fn test_text_unescaping() {
        let ics = calendar("SUMMARY:Plan\\, review\\; ship\r\nDESCRIPTION:Line one\\nLine two\\\\\r\n");
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.summary, "Plan, review; ship");
        assert_eq!(event.description.as_deref(), Some("Line one\nLine two\\"));
    }

    #[test]
    fn test_folded_lines() {
        let ics = calendar("SUMMARY:Quarterly plan\r\n ning session\r\n");
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.summary, "Quarterly planning session");
    }

    #[test]
    fn test_timezone_only_document_has_no_event() {
        let ics = concat!(
            "BEGIN:VCALENDAR\r\n",
            "VERSION:2.0\r\n",
            "BEGIN:VTIMEZONE\r\n",
            "TZID:Europe/Berlin\r\n",
            "BEGIN:STANDARD\r\n",
            "DTSTART:19701025T030000\r\n",
            "TZOFFSETFROM:+0200\r\n",
            "TZOFFSETTO:+0100\r\n",
            "END:STANDARD\r\n",
            "END:VTIMEZONE\r\n",
            "END:VCALENDAR\r\n",
        );
        assert!(parse(ics.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn test_first_event_wins() {
        let ics = concat!(
            "BEGIN:VCALENDAR\n",
            "BEGIN:VTODO\n",
            "SUMMARY:Not an event\n",
            "END:VTODO\n",
            "BEGIN:VEVENT\n",
            "UID:first\n",
            "END:VEVENT\n",
            "BEGIN:VEVENT\n",
            "UID:second\n",
            "END:VEVENT\n",
            "END:VCALENDAR\n",
        );
        let event = parse(ics.as_bytes()).unwrap().unwrap();
        assert_eq!(event.uid, "first");
    }

    #[test]
    fn test_empty_input_has_no_event() {
        assert!(parse(b"").unwrap().is_none());
        assert!(parse(b"\r\n  \r\n").unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = parse(b"this is not a calendar").unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn test_unescape_text() {
        assert_eq!(unescape_text("a\\,b"), "a,b");
        assert_eq!(unescape_text("a\\Nb"), "a\nb");
        assert_eq!(unescape_text("trailing\\"), "trailing\\");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
                let _ = parse(&raw);
            }

            #[test]
            fn summary_is_never_empty(summary in "[A-Za-z0-9 ]{0,30}") {
                let ics = calendar(&format!("SUMMARY:{summary}\r\n"));
                let event = parse(ics.as_bytes()).unwrap().unwrap();
                prop_assert!(!event.summary.is_empty());
            }
        }
    }
}
