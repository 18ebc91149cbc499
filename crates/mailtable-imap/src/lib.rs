//! # mailtable-imap
//!
//! A small async IMAP4rev1 client covering what a read-only mailbox scan
//! needs: LOGIN, LIST, SELECT, SEARCH, FETCH, NOOP and LOGOUT.
//!
//! ## Features
//!
//! - **Type-state connection management**: `NotAuthenticated` →
//!   `Authenticated` → `Selected`, checked at compile time
//! - **TLS via rustls**: no OpenSSL dependency
//! - **Literal-aware framing**: whole messages arrive as `{n}` literals
//! - **Timeouts**: every round trip is bounded, failures disconnect
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailtable_imap::{Config, FetchAttribute, Session};
//!
//! #[tokio::main]
//! async fn main() -> mailtable_imap::Result<()> {
//!     let config = Config::new("imap.gmail.com");
//!     let mut session = Session::connect(&config, "user@gmail.com", "app-password").await?;
//!
//!     for entry in session.list("", "*").await? {
//!         println!("{}", entry.name);
//!     }
//!
//!     session.select("INBOX").await?;
//!     for seq in session.search("ALL").await? {
//!         if let Some(raw) = session.fetch(seq, FetchAttribute::BodyPeek).await? {
//!             println!("message {seq}: {} bytes", raw.len());
//!         }
//!     }
//!
//!     session.logout().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod response;

pub use command::{Command, FetchAttribute, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, ConfigBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT,
    FramedStream, ImapStream, MailboxStatus, NotAuthenticated, Security, Selected, Selection,
    Session,
};
pub use error::{Error, Result};
pub use response::{ListEntry, Response, ResponseParser, Status, UntaggedResponse};
