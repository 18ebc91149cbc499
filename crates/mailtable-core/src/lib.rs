//! # mailtable-core
//!
//! Exposes a remote mailbox as a tabular data source: folders are tables
//! and every message becomes a fixed-shape record
//! `{sender, receiver, day, subject, message}`.
//!
//! ## Features
//!
//! - **Connector** - connect, liveness check, folder listing, fixed schema
//! - **Lazy scans** - one fetch and decode per pull, drop-safe
//! - **Normalization** - encoded headers, multipart bodies, HTML to text,
//!   `YYYY-MM-DD` dates
//! - **Scan policies** - abort on the first bad message, or skip it
//! - **Pluggable protocol** - [`MailProtocol`] and [`Connect`] traits with
//!   an IMAP implementation
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailtable_core::{ConnectorConfig, MailConnector};
//!
//! let mut connector = MailConnector::new(ConnectorConfig::new("me@gmail.com", "app-password"));
//! connector.connect().await?;
//!
//! for table in connector.list_tables().await? {
//!     println!("{table}");
//! }
//!
//! let mut records = connector.select_and_stream("INBOX")?;
//! while let Some(record) = records.next().await {
//!     let record = record?;
//!     println!("{} {} {}", record.day, record.sender, record.subject);
//! }
//!
//! connector.disconnect().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod connector;
mod error;
mod folder;
pub mod imap;
pub mod protocol;
mod record;
pub mod schema;
pub mod stream;

pub use config::{ConfigError, ConnectorConfig, ConnectorConfigBuilder};
pub use connector::{ConnectionStatus, MailConnector};
pub use error::{DecodeError, Error, Result};
pub use folder::{parse_folder_descriptor, parse_folder_list};
pub use imap::{ImapConnect, ImapProtocol};
pub use protocol::{Connect, MailProtocol};
pub use record::MessageRecord;
pub use schema::{COLUMN_NAMES, Column, ColumnType, columns};
pub use stream::{RecordStream, ScanPolicy, ScanState};

pub use mailtable_mime::HeaderDecoding;
