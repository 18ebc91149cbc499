//! Errors raised by the IMAP client.

use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong between connecting and logging out.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket failure, including a failed TLS handshake.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host is not a valid TLS server name.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// A response line could not be parsed.
    #[error("malformed response at byte {position}: {message}")]
    Parse {
        /// Byte offset into the response.
        position: usize,
        /// What was expected.
        message: String,
    },

    /// Tagged NO.
    #[error("server refused: {0}")]
    No(String),

    /// Tagged BAD.
    #[error("server rejected command: {0}")]
    Bad(String),

    /// The server closed the session.
    #[error("server said goodbye: {0}")]
    Bye(String),

    /// No reply within the configured timeout.
    #[error("no reply after {0:?}")]
    Timeout(Duration),

    /// The session is closed or in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The server sent something the protocol does not allow here.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true if the server rejected the command but kept the
    /// connection open.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::No(_) | Self::Bad(_))
    }
}

/// Result alias for IMAP operations.
pub type Result<T> = std::result::Result<T, Error>;

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
    fn test_rejections() {
        assert!(Error::No("[NONEXISTENT] Unknown Mailbox".into()).is_rejection());
        assert!(Error::Bad("Unknown command".into()).is_rejection());
        assert!(!Error::Bye("shutting down".into()).is_rejection());
        assert!(!Error::Timeout(Duration::from_secs(1)).is_rejection());
        let io = Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(!io.is_rejection());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::Bad("Unknown command".into()).to_string(),
            "server rejected command: Unknown command"
        );
    }
}
