//! IMAP connection management.
//!
//! - Configuration (host, port, security mode, timeouts)
//! - TLS/plaintext stream abstraction
//! - Framed I/O for the IMAP protocol
//! - Type-state client
//! - Single-connection session with timeouts

mod client;
mod config;
mod framed;
mod session;
mod stream;

pub use client::{
    Authenticated, Authorized, Client, MailboxStatus, NotAuthenticated, Selected, Selection,
};
pub use config::{Config, ConfigBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT, Security};
pub use framed::FramedStream;
pub use session::Session;
pub use stream::{ImapStream, connect, create_tls_connector};
