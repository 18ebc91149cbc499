//! MIME header handling.

use std::collections::HashMap;

use crate::encoding::{decode_rfc2047, decode_rfc2047_full};

/// How much of an RFC 2047 header value gets decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderDecoding {
    /// Decode only the first segment (`Re: =?utf-8?..?=` yields `"Re: "`).
    #[default]
    FirstSegment,
    /// Decode every segment and join them.
    Full,
}

impl HeaderDecoding {
    /// Decodes a raw header value according to this mode.
    #[must_use]
    pub fn decode(self, value: &str) -> String {
        match self {
            Self::FirstSegment => decode_rfc2047(value),
            Self::Full => decode_rfc2047_full(value),
        }
    }
}

/// Collection of email headers.
///
/// Names are case-insensitive. Values are stored raw (unfolded, still
/// RFC 2047 encoded) in the order they appear.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        self.headers.entry(name).or_default().push(value.into());
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Gets the first value for a header with encoded-words decoded.
    #[must_use]
    pub fn get_decoded(&self, name: &str, mode: HeaderDecoding) -> Option<String> {
        self.get(name).map(|value| mode.decode(value))
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Parses the header block at the start of `raw`.
    ///
    /// Returns the headers and the offset where the body begins. The block
    /// ends at the first empty line, or at the first line that is neither a
    /// `Name: value` field nor a continuation (that line starts the body).
    /// Bytes that are not valid UTF-8 are replaced.
    #[must_use]
    pub fn parse(raw: &[u8]) -> (Self, usize) {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;
        let mut offset = 0;

        while offset < raw.len() {
            let line_end = raw[offset..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(raw.len(), |pos| offset + pos + 1);
            let line = trim_line_ending(&raw[offset..line_end]);

            if line.is_empty() {
                offset = line_end;
                break;
            }

            if line[0] == b' ' || line[0] == b'\t' {
                if let Some((_, value)) = current.as_mut() {
                    let text = String::from_utf8_lossy(line);
                    value.push(' ');
                    value.push_str(text.trim());
                }
                offset = line_end;
                continue;
            }

            let Some((name, value)) = split_field(line) else {
                // Not a header field: the body starts here
                break;
            };

            if let Some((name, value)) = current.take() {
                headers.add(name, value.trim().to_string());
            }
            current = Some((name, value));
            offset = line_end;
        }

        if let Some((name, value)) = current {
            headers.add(name, value.trim().to_string());
        }

        (headers, offset)
    }
}

/// Strips a trailing `\n` or `\r\n`.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Splits a `Name: value` line. Field names are printable ASCII without
/// spaces or colons.
fn split_field(line: &[u8]) -> Option<(String, String)> {
    let colon = line.iter().position(|&b| b == b':')?;
    let name = &line[..colon];
    let valid_name = !name.is_empty() && name.iter().all(|&b| b.is_ascii_graphic());
    if !valid_name {
        return None;
    }

    let name = String::from_utf8_lossy(name).into_owned();
    let value = String::from_utf8_lossy(&line[colon + 1..]).trim().to_string();
    Some((name, value))
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

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_first_value_wins() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("To", "bob@example.com");
        assert_eq!(headers.get("To"), Some("alice@example.com"));
        assert_eq!(headers.get_all("to").len(), 2);
    }

    #[test]
    fn test_headers_parse() {
        let raw = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body"
        );

        let (headers, offset) = Headers::parse(raw.as_bytes());
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("To"), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(&raw.as_bytes()[offset..], b"Body");
    }

    #[test]
    fn test_headers_parse_bare_newlines() {
        let raw = b"Subject: hi\n\nBody\n";
        let (headers, offset) = Headers::parse(raw);
        assert_eq!(headers.get("subject"), Some("hi"));
        assert_eq!(&raw[offset..], b"Body\n");
    }

    #[test]
    fn test_headers_parse_missing_separator() {
        let raw = b"Subject: hi\r\nThis line is body text\r\n";
        let (headers, offset) = Headers::parse(raw);
        assert_eq!(headers.len(), 1);
        assert_eq!(&raw[offset..], b"This line is body text\r\n");
    }

    #[test]
    fn test_headers_parse_only_headers() {
        let raw = b"Subject: hi";
        let (headers, offset) = Headers::parse(raw);
        assert_eq!(headers.get("subject"), Some("hi"));
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn test_headers_parse_invalid_utf8_replaced() {
        let raw = b"Subject: caf\xE9\r\n\r\n";
        let (headers, _) = Headers::parse(raw);
        assert_eq!(headers.get("subject"), Some("caf\u{FFFD}"));
    }

    #[test]
    fn test_get_decoded_modes() {
        let mut headers = Headers::new();
        headers.add("Subject", "Re: =?utf-8?Q?caf=C3=A9?=");
        assert_eq!(
            headers.get_decoded("subject", HeaderDecoding::FirstSegment),
            Some("Re: ".to_string())
        );
        assert_eq!(
            headers.get_decoded("subject", HeaderDecoding::Full),
            Some("Re: café".to_string())
        );
        assert_eq!(headers.get_decoded("from", HeaderDecoding::Full), None);
    }
}
