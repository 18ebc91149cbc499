//! # mailtable-mime
//!
//! MIME decoding for turning raw email into flat text fields.
//!
//! ## Features
//!
//! - **Headers**: unfolding, case-insensitive lookup, RFC 2047 encoded-words
//! - **Part trees**: multipart containers and encapsulated `message/rfc822`
//! - **Transfer encodings**: lenient Base64 and Quoted-Printable
//! - **Charsets**: any WHATWG label via `encoding_rs`, replacement on invalid bytes
//! - **Bodies**: attachment skipping and HTML to text conversion
//! - **Dates**: tolerant RFC 2822 parsing, normalized to `YYYY-MM-DD`
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailtable_mime::{extract_body, normalize_date, HeaderDecoding, Message};
//!
//! let raw = b"From: sender@example.com\r\n\
//!             Subject: =?utf-8?Q?caf=C3=A9?=\r\n\
//!             Date: Thu, 15 Jan 2026 19:31:43 +0000\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw)?;
//! let subject = message.headers().get_decoded("subject", HeaderDecoding::FirstSegment);
//! let day = normalize_date(message.date())?;
//! let body = extract_body(&message);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod body;
mod content_type;
mod date;
mod error;
mod header;
mod message;

pub mod encoding;

pub use body::{extract_body, html_to_text};
pub use content_type::{ContentDisposition, ContentType};
pub use date::{normalize_date, parse_date};
pub use error::{Error, Result};
pub use header::{HeaderDecoding, Headers};
pub use message::{Body, Message, Part, TransferEncoding, Walk};
