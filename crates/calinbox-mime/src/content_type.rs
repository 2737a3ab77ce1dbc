//! MIME content type and disposition handling.

use crate::encoding::{decode_rfc2047, decode_rfc2231};
use std::collections::HashMap;
use std::fmt;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "calendar").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx), keys lowercased.
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// Creates a text/plain content type, the RFC 2045 default.
    #[must_use]
    pub fn text_plain() -> Self {
        let mut ct = Self::new("text", "plain");
        ct.parameters
            .insert("charset".to_string(), "us-ascii".to_string());
        ct
    }

    /// Returns the `type/subtype` essence, lowercased.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters
            .get("boundary")
            .map(String::as_str)
            .filter(|b| !b.is_empty())
    }

    /// Returns the (decoded) `name` parameter if present.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        extended_parameter(&self.parameters, "name")
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is an encapsulated message (`message/rfc822`).
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("message")
            && (self.sub_type.eq_ignore_ascii_case("rfc822")
                || self.sub_type.eq_ignore_ascii_case("global"))
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// Returns `None` if the `type/subtype` part is missing or empty.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let mut segments = split_parameters(s).into_iter();
        let essence = segments.next()?;
        let (main_type, sub_type) = essence.split_once('/')?;
        let main_type = main_type.trim().to_lowercase();
        let sub_type = sub_type.trim().to_lowercase();
        if main_type.is_empty() || sub_type.is_empty() {
            return None;
        }

        let mut content_type = Self::new(main_type, sub_type);
        content_type.parameters = parse_parameters(segments);
        Some(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)
    }
}

/// MIME content disposition (RFC 2183).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition kind, lowercased (e.g., "attachment", "inline").
    pub kind: String,
    /// Parameters, keys lowercased.
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Parses a content disposition header value.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let mut segments = split_parameters(s).into_iter();
        let kind = segments
            .next()
            .map(|k| k.trim().to_lowercase())
            .unwrap_or_default();
        Self {
            kind,
            parameters: parse_parameters(segments),
        }
    }

    /// Checks if this is an attachment disposition.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == "attachment"
    }

    /// Returns the decoded `filename` parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        extended_parameter(&self.parameters, "filename")
    }
}

/// Splits a header value on `;`, ignoring separators inside quoted strings.
fn split_parameters(s: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in s.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

/// Parses `key=value` segments into a map, unquoting values.
///
/// RFC 2231 continuations (`key*0`, `key*1*`, ...) are reassembled under
/// `key*` when any segment is extended, or `key` otherwise.
fn parse_parameters(segments: impl Iterator<Item = String>) -> HashMap<String, String> {
    let mut parameters = HashMap::new();
    let mut continuations: HashMap<String, Vec<(u32, bool, String)>> = HashMap::new();

    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = unquote(value.trim());

        // key*N or key*N*
        if let Some((base, index)) = key.split_once('*')
            && let Some(number) = index.trim_end_matches('*').parse::<u32>().ok()
        {
            let extended = index.ends_with('*');
            continuations
                .entry(base.to_string())
                .or_default()
                .push((number, extended, value));
            continue;
        }

        parameters.insert(key, value);
    }

    for (base, mut pieces) in continuations {
        pieces.sort_by_key(|(number, _, _)| *number);
        let extended = pieces.first().is_some_and(|(_, extended, _)| *extended);
        let joined: String = pieces.into_iter().map(|(_, _, value)| value).collect();
        let key = if extended { format!("{base}*") } else { base };
        parameters.entry(key).or_insert(joined);
    }

    parameters
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Looks up a parameter, preferring the RFC 2231 extended form (`name*`).
fn extended_parameter(parameters: &HashMap<String, String>, name: &str) -> Option<String> {
    if let Some(value) = parameters.get(&format!("{name}*")) {
        return Some(decode_rfc2231(value));
    }
    parameters.get(name).map(|value| decode_rfc2047(value))
}
