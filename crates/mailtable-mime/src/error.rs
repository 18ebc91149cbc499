//! Error types for MIME operations.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid multipart structure.
    #[error("Invalid multipart structure: {0}")]
    InvalidMultipart(String),

    /// The message carries no Date header.
    #[error("Missing Date header")]
    MissingDate,

    /// The Date header does not follow the internet message date grammar.
    #[error("Malformed date: {0:?}")]
    MalformedDate(String),
}
