//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, charset conversion and RFC 2047
//! encoded-word header values. Every decoder here is lenient: malformed
//! input degrades to a best-effort result instead of an error, so a single
//! damaged message never stops a folder scan.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use encoding_rs::{Encoding, UTF_8};

/// Base64 engine that tolerates missing padding and stray trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes Base64 data, ignoring whitespace, line breaks and padding.
///
/// Returns `None` when the remaining alphabet characters still do not form
/// valid Base64 (for example a truncated final quantum).
#[must_use]
pub fn decode_base64(data: &[u8]) -> Option<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        .collect();

    let end = cleaned
        .iter()
        .rposition(|&b| b != b'=')
        .map_or(0, |pos| pos + 1);

    LENIENT_BASE64.decode(&cleaned[..end]).ok()
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed. An `=` that does not start a valid escape
/// is kept literally.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break, possibly with trailing whitespace before it
        let rest = &data[i + 1..];
        let blanks = rest
            .iter()
            .take_while(|&&b| b == b' ' || b == b'\t')
            .count();
        if rest[blanks..].starts_with(b"\r\n") {
            i += 1 + blanks + 2;
            continue;
        }
        if rest[blanks..].starts_with(b"\n") {
            i += 1 + blanks + 1;
            continue;
        }

        match (rest.first().copied().and_then(hex_value), rest.get(1).copied().and_then(hex_value)) {
            (Some(high), Some(low)) => {
                result.push((high << 4) | low);
                i += 3;
            }
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Looks up the encoding for a MIME charset label.
///
/// RFC 2231 language suffixes (`utf-8*en`) are ignored. Labels that only map
/// to the WHATWG "replacement" encoding are treated as unknown.
#[must_use]
pub fn charset_encoding(label: &str) -> Option<&'static Encoding> {
    let label = label.split('*').next().unwrap_or(label).trim();
    Encoding::for_label_no_replacement(label.as_bytes())
}

/// Decodes bytes to text using the given charset, defaulting to UTF-8.
///
/// Unknown charsets fall back to UTF-8. Invalid byte sequences become
/// U+FFFD; this function never fails.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset.map_or(UTF_8, |label| {
        charset_encoding(label).unwrap_or_else(|| {
            tracing::warn!(charset = label, "unknown charset, decoding as UTF-8");
            UTF_8
        })
    });

    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        tracing::debug!(
            charset = encoding.name(),
            "replaced invalid byte sequences while decoding"
        );
    }
    text.into_owned()
}

/// One run of a header value after RFC 2047 tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSegment {
    /// Text outside any encoded-word, kept verbatim.
    Plain(String),
    /// Bytes of one or more adjacent encoded-words sharing a charset.
    Encoded {
        /// Lowercased charset label.
        charset: String,
        /// Transfer-decoded bytes, still in `charset`.
        bytes: Vec<u8>,
    },
}

impl HeaderSegment {
    /// Converts the segment to text.
    #[must_use]
    pub fn decode(&self) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Encoded { charset, bytes } => {
                let charset = (!charset.is_empty()).then_some(charset.as_str());
                decode_charset(bytes, charset)
            }
        }
    }
}

/// A single `=?charset?encoding?text?=` occurrence.
struct EncodedWord<'a> {
    start: usize,
    end: usize,
    charset: &'a str,
    base64: bool,
    text: &'a str,
}

impl EncodedWord<'_> {
    fn decode_bytes(&self) -> Vec<u8> {
        if self.base64 {
            decode_base64(self.text.as_bytes()).unwrap_or_else(|| self.text.as_bytes().to_vec())
        } else {
            let text = self.text.replace('_', " ");
            decode_quoted_printable(text.as_bytes())
        }
    }
}

/// Finds the next encoded-word at or after `from`.
fn find_encoded_word(value: &str, from: usize) -> Option<EncodedWord<'_>> {
    let mut search = from;

    while let Some(offset) = value[search..].find("=?") {
        let start = search + offset;
        let rest = &value[start + 2..];
        let charset_len = rest.find('?')?;
        let after_charset = &rest[charset_len + 1..];

        let mut chars = after_charset.chars();
        if let (Some(encoding @ ('b' | 'B' | 'q' | 'Q')), Some('?')) = (chars.next(), chars.next())
        {
            let payload = &after_charset[2..];
            if let Some(text_len) = payload.find("?=") {
                let end = start + 2 + charset_len + 1 + 2 + text_len + 2;
                return Some(EncodedWord {
                    start,
                    end,
                    charset: &rest[..charset_len],
                    base64: encoding.eq_ignore_ascii_case(&'b'),
                    text: &payload[..text_len],
                });
            }
        }

        search = start + 2;
    }

    None
}

/// Splits a header value into plain and encoded segments.
///
/// Leading whitespace before the first segment is dropped, whitespace that
/// only separates two encoded-words is dropped, and adjacent encoded-words
/// with the same charset are merged so multi-byte characters split across
/// words decode correctly. A value without any encoded-word yields a single
/// plain segment equal to the input.
#[must_use]
pub fn split_rfc2047(value: &str) -> Vec<HeaderSegment> {
    let mut segments: Vec<HeaderSegment> = Vec::new();
    let mut cursor = 0;

    while let Some(word) = find_encoded_word(value, cursor) {
        let mut gap = &value[cursor..word.start];
        if segments.is_empty() {
            gap = gap.trim_start();
        }
        let between_words = matches!(segments.last(), Some(HeaderSegment::Encoded { .. }));
        if !gap.is_empty() && !(between_words && gap.trim().is_empty()) {
            segments.push(HeaderSegment::Plain(gap.to_string()));
        }

        let charset = word.charset.to_ascii_lowercase();
        let bytes = word.decode_bytes();
        match segments.last_mut() {
            Some(HeaderSegment::Encoded {
                charset: last,
                bytes: buffer,
            }) if *last == charset => buffer.extend_from_slice(&bytes),
            _ => segments.push(HeaderSegment::Encoded { charset, bytes }),
        }

        cursor = word.end;
    }

    if segments.is_empty() {
        return vec![HeaderSegment::Plain(value.to_string())];
    }

    let tail = &value[cursor..];
    if !tail.is_empty() {
        segments.push(HeaderSegment::Plain(tail.to_string()));
    }

    segments
}

/// Decodes the first segment of an RFC 2047 header value.
///
/// Only the first segment is returned: `Re: =?utf-8?Q?caf=C3=A9?=` decodes
/// to `"Re: "`. Values without encoded-words come back unchanged. Use
/// [`decode_rfc2047_full`] to decode every segment.
#[must_use]
pub fn decode_rfc2047(value: &str) -> String {
    split_rfc2047(value)
        .first()
        .map(HeaderSegment::decode)
        .unwrap_or_default()
}

/// Decodes every segment of an RFC 2047 header value and joins them.
#[must_use]
pub fn decode_rfc2047_full(value: &str) -> String {
    split_rfc2047(value)
        .iter()
        .map(HeaderSegment::decode)
        .collect()
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
    use base64::engine::general_purpose::STANDARD;
    use proptest::prelude::*;

    #[test]
    fn test_base64_decode() {
        assert_eq!(decode_base64(b"SGVsbG8sIFdvcmxkIQ==").unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_with_line_breaks_and_missing_padding() {
        assert_eq!(decode_base64(b"SGVs\r\nbG8sIFdv\r\ncmxkIQ").unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_truncated() {
        assert!(decode_base64(b"SGVsb").is_none());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello= \nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_invalid_escape_kept() {
        assert_eq!(decode_quoted_printable(b"100=%"), b"100=%");
        assert_eq!(decode_quoted_printable(b"end="), b"end=");
    }

    #[test]
    fn test_decode_charset_latin1() {
        assert_eq!(decode_charset(&[0x63, 0x61, 0x66, 0xE9], Some("ISO-8859-1")), "café");
    }

    #[test]
    fn test_decode_charset_invalid_utf8_replaced() {
        assert_eq!(decode_charset(b"ok\xFFok", None), "ok\u{FFFD}ok");
    }

    #[test]
    fn test_decode_charset_unknown_label_falls_back() {
        assert_eq!(decode_charset("héllo".as_bytes(), Some("x-unknown")), "héllo");
    }

    #[test]
    fn test_charset_encoding_language_suffix() {
        assert_eq!(charset_encoding("UTF-8*en"), Some(UTF_8));
    }

    #[test]
    fn test_rfc2047_plain_identity() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
        assert_eq!(decode_rfc2047("  padded  "), "  padded  ");
        assert_eq!(decode_rfc2047(""), "");
    }

    #[test]
    fn test_rfc2047_base64() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_world?="), "Héllo world");
    }

    #[test]
    fn test_rfc2047_declared_charset() {
        assert_eq!(decode_rfc2047("=?iso-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_rfc2047_first_segment_only() {
        assert_eq!(decode_rfc2047("Re: =?utf-8?Q?caf=C3=A9?="), "Re: ");
        assert_eq!(decode_rfc2047("=?utf-8?Q?caf=C3=A9?= ok"), "café");
    }

    #[test]
    fn test_rfc2047_full() {
        assert_eq!(decode_rfc2047_full("Re: =?utf-8?Q?caf=C3=A9?= ok"), "Re: café ok");
    }

    #[test]
    fn test_rfc2047_adjacent_words_merged() {
        // "é" split across two encoded-words
        let value = "=?utf-8?Q?caf=C3?= =?utf-8?Q?=A9?=";
        assert_eq!(decode_rfc2047(value), "café");
        assert_eq!(split_rfc2047(value).len(), 1);
    }

    #[test]
    fn test_rfc2047_different_charsets_split() {
        let value = "=?utf-8?B?SMOpbGxv?= =?iso-8859-1?Q?caf=E9?=";
        assert_eq!(decode_rfc2047(value), "Héllo");
        assert_eq!(decode_rfc2047_full(value), "Héllocafé");
    }

    #[test]
    fn test_rfc2047_unterminated_word_is_plain() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOp"), "=?utf-8?B?SMOp");
    }

    #[test]
    fn test_rfc2047_broken_base64_degrades() {
        assert_eq!(decode_rfc2047("=?utf-8?B?S?="), "S");
    }

    proptest! {
        #[test]
        fn prop_plain_header_identity(value in "[a-zA-Z0-9 ,.<>@:'-]{0,60}") {
            prop_assert_eq!(decode_rfc2047(&value), value);
        }

        #[test]
        fn prop_utf8_base64_round_trip(text in "\\PC{0,40}") {
            let header = format!("=?utf-8?B?{}?=", STANDARD.encode(text.as_bytes()));
            prop_assert_eq!(decode_rfc2047(&header), text);
        }

        #[test]
        fn prop_latin1_round_trip(text in "[a-zA-Z0-9àéîõüç ]{0,40}") {
            let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&text);
            let header = format!("=?iso-8859-1?B?{}?=", STANDARD.encode(&bytes));
            prop_assert_eq!(decode_rfc2047(&header), text);
        }
    }
}
