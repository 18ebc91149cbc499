//! Body text extraction.

use htmd::HtmlToMarkdown;
use tracing::warn;

use crate::message::{Message, Part};

/// Extracts the readable body of a message.
///
/// A single-part message yields its payload decoded with the declared
/// charset. For a multipart message every part is visited depth-first in
/// document order; attachments and containers are skipped, HTML parts are
/// converted to plain text, and the remaining texts are concatenated
/// without separators. Never fails: undecodable bytes are replaced.
#[must_use]
pub fn extract_body(message: &Message) -> String {
    if !message.is_multipart() {
        return message.root().text().unwrap_or_default();
    }

    let mut body = String::new();
    for part in message.walk() {
        if let Some(text) = part_text(part) {
            body.push_str(&text);
        }
    }
    body
}

/// Returns the contribution of one part of a multipart message.
fn part_text(part: &Part) -> Option<String> {
    if part.is_attachment() {
        return None;
    }

    let text = part.text()?;
    if part.content_type().is_html() {
        Some(html_to_text(&text))
    } else {
        Some(text)
    }
}

/// Converts HTML to a plain-text approximation.
///
/// Markup is stripped while paragraphs, lists and links stay readable.
/// Script, style and head contents are dropped.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "head"])
        .build();

    match converter.convert(html) {
        Ok(text) => text,
        Err(e) => {
            warn!("HTML conversion failed, keeping markup: {e}");
            html.to_string()
        }
    }
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
    use crate::header::Headers;

    fn leaf(content_type: &str, disposition: Option<&str>, body: &[u8]) -> Part {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type);
        if let Some(disposition) = disposition {
            headers.add("Content-Disposition", disposition);
        }
        Part::leaf(headers, body.to_vec())
    }

    fn multipart(parts: Vec<Part>) -> Part {
        let mut headers = Headers::new();
        headers.add("Content-Type", "multipart/mixed; boundary=x");
        Part::multipart(headers, parts)
    }

    #[test]
    fn test_single_part_utf8() {
        let message = Message::parse("Subject: hi\r\n\r\nhéllo".as_bytes()).unwrap();
        assert_eq!(extract_body(&message), "héllo");
    }

    #[test]
    fn test_single_part_invalid_bytes_replaced() {
        let message = Message::parse(b"Subject: hi\r\n\r\nab\xFFcd").unwrap();
        assert_eq!(extract_body(&message), "ab\u{FFFD}cd");
    }

    #[test]
    fn test_single_part_declared_charset() {
        let raw = b"Content-Type: text/plain; charset=windows-1252\r\n\r\n\x93quoted\x94";
        let message = Message::parse(raw).unwrap();
        assert_eq!(extract_body(&message), "\u{201C}quoted\u{201D}");
    }

    #[test]
    fn test_single_part_html_kept_verbatim() {
        let raw = b"Content-Type: text/html\r\n\r\n<p>hi</p>";
        let message = Message::parse(raw).unwrap();
        assert_eq!(extract_body(&message), "<p>hi</p>");
    }

    #[test]
    fn test_single_part_empty() {
        let message = Message::parse(b"Subject: hi\r\n\r\n").unwrap();
        assert_eq!(extract_body(&message), "");
    }

    #[test]
    fn test_multipart_trees() {
        let cases: Vec<(&str, Part, &str)> = vec![
            (
                "plain parts concatenated in order",
                multipart(vec![
                    leaf("text/plain", None, b"one "),
                    leaf("text/plain", None, b"two"),
                ]),
                "one two",
            ),
            (
                "attachment skipped",
                multipart(vec![
                    leaf("text/plain", None, b"keep"),
                    leaf("text/plain", Some("attachment; filename=a.txt"), b"drop"),
                ]),
                "keep",
            ),
            (
                "inline disposition kept",
                multipart(vec![leaf("text/plain", Some("inline"), b"inline text")]),
                "inline text",
            ),
            (
                "nested containers walked depth first",
                multipart(vec![
                    multipart(vec![
                        leaf("text/plain", None, b"a"),
                        leaf("text/plain", None, b"b"),
                    ]),
                    leaf("text/plain", None, b"c"),
                ]),
                "abc",
            ),
            (
                "only attachments",
                multipart(vec![leaf(
                    "application/pdf",
                    Some("attachment; filename=r.pdf"),
                    b"%PDF",
                )]),
                "",
            ),
            ("empty container", multipart(vec![]), ""),
        ];

        for (name, root, expected) in cases {
            let message = Message::from_part(root);
            assert_eq!(extract_body(&message), expected, "case: {name}");
        }
    }

    #[test]
    fn test_multipart_html_converted() {
        let root = multipart(vec![
            leaf("text/plain", None, b"plain\n"),
            leaf("text/html", None, b"<p>Hello <b>there</b></p>"),
        ]);
        let body = extract_body(&Message::from_part(root));
        assert!(body.starts_with("plain\n"));
        assert!(body.contains("Hello"));
        assert!(body.contains("there"));
        assert!(!body.contains("<p>"));
    }

    #[test]
    fn test_multipart_transfer_and_charset_decoding() {
        let raw = concat!(
            "Content-Type: multipart/alternative; boundary=\"sep\"\r\n",
            "\r\n",
            "--sep\r\n",
            "Content-Type: text/plain; charset=iso-8859-1\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "caf=E9\r\n",
            "--sep\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "IGNyw6htZQ==\r\n",
            "--sep--\r\n"
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(extract_body(&message), "café crème");
    }

    #[test]
    fn test_html_to_text_drops_script() {
        let text = html_to_text("<html><head><title>t</title></head><body><script>x()</script><p>Body</p></body></html>");
        assert!(text.contains("Body"));
        assert!(!text.contains("x()"));
    }
}
