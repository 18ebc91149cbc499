//! Error types for the connector.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur in connector operations.
///
/// Every variant names the operation that failed and carries the proximate
/// cause from the layer below.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection could not be established, or it broke mid-operation.
    #[error("{operation} failed: connection error: {cause}")]
    Connection {
        /// Operation that was running.
        operation: &'static str,
        /// Cause reported by the transport or server.
        cause: String,
    },

    /// An operation needs a live session and there is none.
    #[error("{operation} failed: not connected")]
    NotConnected {
        /// Operation that was requested.
        operation: &'static str,
    },

    /// The server refused a command.
    #[error("{operation} failed: server refused: {cause}")]
    Protocol {
        /// Operation that was refused.
        operation: &'static str,
        /// Server response text.
        cause: String,
    },

    /// A server response could not be interpreted.
    #[error("Protocol parse error: {0}")]
    ProtocolParse(String),

    /// A single message could not be turned into a record.
    #[error("Message {id} could not be decoded: {source}")]
    Decode {
        /// Message identifier within the selected folder.
        id: u32,
        /// What went wrong.
        source: DecodeError,
    },

    /// The connector configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Maps an IMAP error raised while running `operation`.
    pub(crate) fn imap(operation: &'static str, error: mailtable_imap::Error) -> Self {
        use mailtable_imap::Error as Imap;

        match error {
            Imap::No(cause) | Imap::Bad(cause) => Self::Protocol { operation, cause },
            Imap::Parse { .. } | Imap::Protocol(_) => Self::ProtocolParse(error.to_string()),
            Imap::InvalidState(_) => Self::NotConnected { operation },
            other => Self::Connection {
                operation,
                cause: other.to_string(),
            },
        }
    }

    /// Returns true for errors scoped to one message.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Per-message decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The message has no Date header.
    #[error("missing Date header")]
    MissingDate,

    /// The Date header could not be parsed.
    #[error("malformed Date header {0:?}")]
    MalformedDate(String),

    /// The MIME structure could not be parsed.
    #[error("MIME error: {0}")]
    Mime(mailtable_mime::Error),

    /// The server did not return the message.
    #[error("fetch returned no message: {0}")]
    Fetch(String),
}

impl From<mailtable_mime::Error> for DecodeError {
    fn from(error: mailtable_mime::Error) -> Self {
        match error {
            mailtable_mime::Error::MissingDate => Self::MissingDate,
            mailtable_mime::Error::MalformedDate(raw) => Self::MalformedDate(raw),
            other => Self::Mime(other),
        }
    }
}

/// Result type alias using our Error type.
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
    fn test_imap_rejection_maps_to_protocol() {
        let err = Error::imap("select", mailtable_imap::Error::No("Unknown Mailbox".into()));
        assert!(matches!(err, Error::Protocol { operation: "select", .. }));
        assert_eq!(
            err.to_string(),
            "select failed: server refused: Unknown Mailbox"
        );
    }

    #[test]
    fn test_imap_transport_maps_to_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = Error::imap("fetch", mailtable_imap::Error::Io(io));
        let Error::Connection { operation, cause } = err else {
            panic!("expected connection error");
        };
        assert_eq!(operation, "fetch");
        assert!(cause.contains("reset by peer"));
    }

    #[test]
    fn test_imap_invalid_state_maps_to_not_connected() {
        let err = Error::imap("noop", mailtable_imap::Error::InvalidState("not connected".into()));
        assert!(matches!(err, Error::NotConnected { operation: "noop" }));
    }

    #[test]
    fn test_decode_error_from_mime() {
        assert_eq!(
            DecodeError::from(mailtable_mime::Error::MissingDate),
            DecodeError::MissingDate
        );
        assert_eq!(
            DecodeError::from(mailtable_mime::Error::MalformedDate("soon".into())),
            DecodeError::MalformedDate("soon".into())
        );
        assert!(matches!(
            DecodeError::from(mailtable_mime::Error::InvalidMultipart("deep".into())),
            DecodeError::Mime(_)
        ));
    }

    #[test]
    fn test_decode_display_names_message() {
        let err = Error::Decode {
            id: 2,
            source: DecodeError::MalformedDate("yesterday".into()),
        };
        assert_eq!(
            err.to_string(),
            "Message 2 could not be decoded: malformed Date header \"yesterday\""
        );
        assert!(err.is_decode());
    }
}
