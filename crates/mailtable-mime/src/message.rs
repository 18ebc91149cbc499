//! MIME message structure and parsing.

use std::fmt;

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;

/// Maximum nesting of multipart containers and encapsulated messages.
const MAX_NESTING_DEPTH: usize = 64;

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

    /// Reverses the transfer encoding.
    ///
    /// Undecodable Base64 is returned unchanged.
    #[must_use]
    pub fn decode(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Base64 => decode_base64(data).unwrap_or_else(|| data.to_vec()),
            Self::QuotedPrintable => decode_quoted_printable(data),
            Self::SevenBit | Self::EightBit | Self::Binary => data.to_vec(),
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

/// Content of a MIME part.
#[derive(Debug, Clone)]
pub enum Body {
    /// Leaf content, still transfer-encoded.
    Leaf(Vec<u8>),
    /// Children of a `multipart/*` container, in document order.
    Multipart(Vec<Part>),
    /// An encapsulated `message/rfc822`.
    Message(Box<Part>),
}

/// MIME message part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part content.
    pub body: Body,
}

impl Part {
    /// Creates a leaf part.
    #[must_use]
    pub const fn leaf(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            body: Body::Leaf(body),
        }
    }

    /// Creates a multipart container.
    #[must_use]
    pub const fn multipart(headers: Headers, parts: Vec<Self>) -> Self {
        Self {
            headers,
            body: Body::Multipart(parts),
        }
    }

    /// Parses raw bytes (headers, blank line, body) into a part tree.
    ///
    /// Parsing is lenient: a multipart container without a usable boundary
    /// degrades to a leaf, and a missing closing delimiter ends the last
    /// part at the end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if containers nest deeper than the supported limit.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Self::parse_nested(raw, 0)
    }

    fn parse_nested(raw: &[u8], depth: usize) -> Result<Self> {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::InvalidMultipart(format!(
                "nesting deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }

        let (headers, offset) = Headers::parse(raw);
        let content = &raw[offset..];
        let content_type = headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok());

        let body = match content_type {
            Some(ct) if ct.is_multipart() => {
                match ct.boundary().and_then(|b| split_multipart(content, b)) {
                    Some(sections) => Body::Multipart(
                        sections
                            .into_iter()
                            .map(|section| Self::parse_nested(section, depth + 1))
                            .collect::<Result<_>>()?,
                    ),
                    None => Body::Leaf(content.to_vec()),
                }
            }
            Some(ct) if ct.is_message() => {
                Body::Message(Box::new(Self::parse_nested(content, depth + 1)?))
            }
            _ => Body::Leaf(content.to_vec()),
        };

        Ok(Self { headers, body })
    }

    /// Gets the content type, defaulting to `text/plain` when absent or invalid.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok())
            .unwrap_or_else(ContentType::text_plain)
    }

    /// Gets the content disposition if declared.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// Returns true if the disposition marks this part as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition()
            .is_some_and(|disposition| disposition.is_attachment())
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns true if this part contains other parts.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        !matches!(self.body, Body::Leaf(_))
    }

    /// Returns the transfer-decoded payload, or `None` for containers.
    #[must_use]
    pub fn payload(&self) -> Option<Vec<u8>> {
        match &self.body {
            Body::Leaf(data) => Some(self.transfer_encoding().decode(data)),
            Body::Multipart(_) | Body::Message(_) => None,
        }
    }

    /// Returns the payload decoded as text with the declared charset
    /// (UTF-8 when undeclared), or `None` for containers.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let payload = self.payload()?;
        let content_type = self.content_type();
        Some(decode_charset(&payload, content_type.charset()))
    }

    /// Iterates over this part and all descendants, depth-first in
    /// document order.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Depth-first iterator over a part tree.
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a Part>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        match &part.body {
            Body::Leaf(_) => {}
            Body::Multipart(children) => self.stack.extend(children.iter().rev()),
            Body::Message(inner) => self.stack.push(inner),
        }
        Some(part)
    }
}

/// A parsed MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    root: Part,
}

impl Message {
    /// Parses a raw RFC 5322 message.
    ///
    /// # Errors
    ///
    /// Returns an error if containers nest deeper than the supported limit.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Part::parse(raw).map(|root| Self { root })
    }

    /// Wraps an already built part tree.
    #[must_use]
    pub const fn from_part(root: Part) -> Self {
        Self { root }
    }

    /// Returns the top-level part.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// Returns the top-level headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Checks if this is a multipart (or encapsulating) message.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        self.root.is_container()
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers().get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers().get("to")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers().get("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers().get("date")
    }

    /// Iterates over every part, depth-first in document order.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        self.root.walk()
    }
}

/// Splits a multipart body into its sections.
///
/// Returns `None` when no delimiter line for `boundary` is present.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Option<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut sections = Vec::new();
    let mut section_start: Option<usize> = None;
    let mut found = false;
    let mut offset = 0;

    while offset < body.len() {
        let line_end = body[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |pos| offset + pos + 1);
        let line = trim_trailing_whitespace(&body[offset..line_end]);

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest == b"--";
            if rest.is_empty() || closing {
                found = true;
                if let Some(start) = section_start.take() {
                    sections.push(strip_final_line_break(&body[start..offset]));
                }
                if closing {
                    return Some(sections);
                }
                section_start = Some(line_end);
            }
        }

        offset = line_end;
    }

    if !found {
        return None;
    }
    if let Some(start) = section_start {
        sections.push(&body[start.min(body.len())..]);
    }
    Some(sections)
}

/// Removes the line break that belongs to the following delimiter.
fn strip_final_line_break(section: &[u8]) -> &[u8] {
    let section = section.strip_suffix(b"\n").unwrap_or(section);
    section.strip_suffix(b"\r").unwrap_or(section)
}

fn trim_trailing_whitespace(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    &line[..end]
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
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse(" quoted-printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_transfer_encoding_decode_invalid_base64_passthrough() {
        assert_eq!(TransferEncoding::Base64.decode(b"abcde"), b"abcde");
    }

    #[test]
    fn test_single_part() {
        let raw = b"From: a@example.com\r\nSubject: Hi\r\n\r\nHello, World!";
        let message = Message::parse(raw).unwrap();
        assert!(!message.is_multipart());
        assert_eq!(message.from(), Some("a@example.com"));
        assert_eq!(message.subject(), Some("Hi"));
        assert_eq!(message.root().text().unwrap(), "Hello, World!");
    }

    #[test]
    fn test_single_part_base64_latin1() {
        let raw = concat!(
            "Content-Type: text/plain; charset=iso-8859-1\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "Y2Fm6Q==\r\n"
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.root().text().unwrap(), "café");
    }

    #[test]
    fn test_multipart_sections() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n",
            "\r\n",
            "preamble\r\n",
            "--XYZ\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "first\r\n",
            "--XYZ\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "second\r\n",
            "--XYZ--\r\n",
            "epilogue\r\n"
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert!(message.is_multipart());

        let texts: Vec<String> = message.walk().filter_map(Part::text).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_multipart_missing_closing_delimiter() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\n\n--b\n\nonly part\n";
        let message = Message::parse(raw).unwrap();
        let texts: Vec<String> = message.walk().filter_map(Part::text).collect();
        assert_eq!(texts, vec!["only part\n"]);
    }

    #[test]
    fn test_multipart_without_delimiters_is_leaf() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\r\nno parts here";
        let message = Message::parse(raw).unwrap();
        assert!(!message.is_multipart());
        assert_eq!(message.root().text().unwrap(), "no parts here");
    }

    #[test]
    fn test_multipart_without_boundary_is_leaf() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nbody";
        let message = Message::parse(raw).unwrap();
        assert!(!message.is_multipart());
    }

    #[test]
    fn test_boundary_prefix_is_not_delimiter() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "\r\n",
            "--bogus line stays\r\n",
            "--b--\r\n"
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        let texts: Vec<String> = message.walk().filter_map(Part::text).collect();
        assert_eq!(texts, vec!["--bogus line stays"]);
    }

    #[test]
    fn test_walk_document_order_nested() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=outer\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=inner\r\n",
            "\r\n",
            "--inner\r\n",
            "\r\n",
            "a\r\n",
            "--inner\r\n",
            "\r\n",
            "b\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "\r\n",
            "c\r\n",
            "--outer--\r\n"
        );
        let message = Message::parse(raw.as_bytes()).unwrap();

        let kinds: Vec<bool> = message.walk().map(Part::is_container).collect();
        assert_eq!(kinds, vec![true, true, false, false, false]);

        let texts: Vec<String> = message.walk().filter_map(Part::text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_encapsulated_message() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=m\r\n",
            "\r\n",
            "--m\r\n",
            "Content-Type: message/rfc822\r\n",
            "\r\n",
            "Subject: inner\r\n",
            "\r\n",
            "inner body\r\n",
            "--m--\r\n"
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        let parts: Vec<&Part> = message.walk().collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].headers.get("subject"), Some("inner"));
        assert_eq!(parts[2].text().unwrap(), "inner body");
    }

    #[test]
    fn test_nesting_limit() {
        let mut raw = String::new();
        for level in 0..=MAX_NESTING_DEPTH + 1 {
            raw.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=b{level}\r\n\r\n--b{level}\r\n"
            ));
        }
        assert!(matches!(
            Message::parse(raw.as_bytes()),
            Err(Error::InvalidMultipart(_))
        ));
    }

    #[test]
    fn test_attachment_detection() {
        let mut headers = Headers::new();
        headers.add("Content-Disposition", "attachment; filename=a.txt");
        let part = Part::leaf(headers, b"data".to_vec());
        assert!(part.is_attachment());

        let part = Part::leaf(Headers::new(), b"data".to_vec());
        assert!(!part.is_attachment());
    }

    #[test]
    fn test_container_has_no_payload() {
        let part = Part::multipart(Headers::new(), vec![]);
        assert!(part.payload().is_none());
        assert!(part.text().is_none());
    }
}
