//! Message records.

use serde::{Deserialize, Serialize};
use tracing::debug;

use mailtable_mime::{HeaderDecoding, Message, extract_body, normalize_date};

use crate::error::DecodeError;

/// One normalized message, a row of a folder table.
///
/// Every field is always present. Missing headers become empty strings;
/// only the date can fail a record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Decoded `From` header.
    pub sender: String,
    /// Decoded `To` header.
    pub receiver: String,
    /// Date in `YYYY-MM-DD` form.
    pub day: String,
    /// Decoded `Subject` header.
    pub subject: String,
    /// Extracted plain-text body.
    pub message: String,
}

impl MessageRecord {
    /// Builds a record from a raw RFC 822 message.
    ///
    /// # Errors
    ///
    /// Returns an error if the Date header is missing or malformed, or if
    /// the MIME structure cannot be parsed.
    pub fn from_raw(raw: &[u8], decoding: HeaderDecoding) -> Result<Self, DecodeError> {
        let message = Message::parse(raw)?;
        Self::from_message(&message, decoding)
    }

    /// Builds a record from a parsed message.
    ///
    /// # Errors
    ///
    /// Returns an error if the Date header is missing or malformed.
    pub fn from_message(message: &Message, decoding: HeaderDecoding) -> Result<Self, DecodeError> {
        let headers = message.headers();
        let header = |name: &str| headers.get_decoded(name, decoding).unwrap_or_default();

        let day = normalize_date(message.date())?;
        let record = Self {
            sender: header("From"),
            receiver: header("To"),
            day,
            subject: header("Subject"),
            message: extract_body(message),
        };

        debug!(
            day = %record.day,
            body_len = record.message.len(),
            "assembled record"
        );
        Ok(record)
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

    const SIMPLE: &[u8] = b"From: Alice <alice@example.com>\r\n\
To: bob@example.com\r\n\
Subject: Lunch\r\n\
Date: Tue, 5 Mar 2024 12:30:00 +0100\r\n\
\r\n\
See you at noon.\r\n";

    #[test]
    fn test_simple_record() {
        let record = MessageRecord::from_raw(SIMPLE, HeaderDecoding::default()).unwrap();
        assert_eq!(
            record,
            MessageRecord {
                sender: "Alice <alice@example.com>".into(),
                receiver: "bob@example.com".into(),
                day: "2024-03-05".into(),
                subject: "Lunch".into(),
                message: "See you at noon.\r\n".into(),
            }
        );
    }

    #[test]
    fn test_missing_headers_are_empty() {
        let raw = b"Date: 1 Jan 2023 00:00:00 +0000\r\n\r\nbody";
        let record = MessageRecord::from_raw(raw, HeaderDecoding::default()).unwrap();
        assert_eq!(record.sender, "");
        assert_eq!(record.receiver, "");
        assert_eq!(record.subject, "");
        assert_eq!(record.day, "2023-01-01");
        assert_eq!(record.message, "body");
    }

    #[test]
    fn test_encoded_subject() {
        let raw = b"From: =?UTF-8?B?SsO8cmdlbg==?= <j@example.com>\r\n\
Subject: =?ISO-8859-1?Q?Caf=E9?=\r\n\
Date: Wed, 6 Mar 2024 08:00:00 -0500\r\n\
\r\n\
x";
        let record = MessageRecord::from_raw(raw, HeaderDecoding::default()).unwrap();
        assert_eq!(record.subject, "Café");
        assert!(record.sender.starts_with("Jürgen"));
    }

    #[test]
    fn test_date_errors() {
        let missing = b"Subject: no date\r\n\r\nbody";
        assert_eq!(
            MessageRecord::from_raw(missing, HeaderDecoding::default()),
            Err(DecodeError::MissingDate)
        );

        let malformed = b"Date: the day after tomorrow\r\n\r\nbody";
        assert!(matches!(
            MessageRecord::from_raw(malformed, HeaderDecoding::default()),
            Err(DecodeError::MalformedDate(_))
        ));
    }

    #[test]
    fn test_multipart_body_skips_attachment() {
        let raw = b"From: a@example.com\r\n\
Date: Thu, 7 Mar 2024 09:15:00 +0000\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain\r\n\
\r\n\
Hello\r\n\
--b1\r\n\
Content-Type: text/plain\r\n\
Content-Disposition: attachment; filename=\"notes.txt\"\r\n\
\r\n\
secret notes\r\n\
--b1--\r\n";
        let record = MessageRecord::from_raw(raw, HeaderDecoding::default()).unwrap();
        assert_eq!(record.message, "Hello");
    }

    #[test]
    fn test_serialize_field_names() {
        let record = MessageRecord::from_raw(SIMPLE, HeaderDecoding::default()).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys.len(), 5);
        for key in crate::schema::COLUMN_NAMES {
            assert!(keys.contains(&key), "missing {key}");
        }
    }
}
