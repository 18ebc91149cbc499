//! IMAP-backed mail protocol.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use mailtable_imap::{Config, FetchAttribute, ImapStream, Session};

use crate::config::ConnectorConfig;
use crate::error::DecodeError;
use crate::protocol::{Connect, MailProtocol};
use crate::{Error, Result};

/// [`MailProtocol`] over an IMAP session.
pub struct ImapProtocol<S = ImapStream> {
    session: Session<S>,
}

impl<S> std::fmt::Debug for ImapProtocol<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapProtocol")
            .field("session", &self.session)
            .finish()
    }
}

impl<S> ImapProtocol<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an authenticated session.
    #[must_use]
    pub const fn new(session: Session<S>) -> Self {
        Self { session }
    }

    /// Returns the underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session<S> {
        &self.session
    }

    /// Maps a session error, keeping state errors raised while still
    /// connected (such as no folder selected) as refusals.
    fn error(&self, operation: &'static str, error: mailtable_imap::Error) -> Error {
        match error {
            mailtable_imap::Error::InvalidState(cause) if self.session.is_connected() => {
                Error::Protocol { operation, cause }
            }
            other => Error::imap(operation, other),
        }
    }
}

impl<S> MailProtocol for ImapProtocol<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn noop(&mut self) -> Result<()> {
        self.session
            .noop()
            .await
            .map_err(|e| self.error("check_connection", e))
    }

    async fn list(&mut self) -> Result<Vec<String>> {
        let entries = self
            .session
            .list("", "*")
            .await
            .map_err(|e| self.error("list_tables", e))?;

        Ok(entries.into_iter().map(|entry| entry.descriptor).collect())
    }

    async fn select(&mut self, folder: &str) -> Result<()> {
        let status = self
            .session
            .select(folder)
            .await
            .map_err(|e| self.error("select", e))?;

        debug!(folder, exists = status.exists, "folder selected");
        Ok(())
    }

    async fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        self.session
            .search(criteria)
            .await
            .map_err(|e| self.error("search", e))
    }

    async fn fetch(&mut self, id: u32) -> Result<Vec<u8>> {
        self.session
            .fetch(id, FetchAttribute::BodyPeek)
            .await
            .map_err(|e| self.error("fetch", e))?
            .ok_or_else(|| Error::Decode {
                id,
                source: DecodeError::Fetch("server completed FETCH without message data".into()),
            })
    }

    async fn logout(&mut self) -> Result<()> {
        self.session
            .logout()
            .await
            .map_err(|e| self.error("disconnect", e))
    }
}

/// Opens implicit-TLS IMAP sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImapConnect;

impl Connect for ImapConnect {
    type Session = ImapProtocol;

    async fn connect(&self, config: &ConnectorConfig) -> Result<Self::Session> {
        let imap_config = Config::builder(&config.host)
            .port(config.port)
            .security(config.security)
            .connect_timeout(config.connect_timeout)
            .io_timeout(config.io_timeout)
            .build();

        let session = Session::connect(&imap_config, &config.email, &config.password)
            .await
            .map_err(|e| Error::Connection {
                operation: "connect",
                cause: e.to_string(),
            })?;

        Ok(ImapProtocol::new(session))
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
    use std::time::Duration;

    use mailtable_imap::Client;
    use tokio_test::io::{Builder, Mock};

    use super::*;

    async fn protocol(mock: Mock) -> ImapProtocol<Mock> {
        let client = Client::from_stream(mock).await.unwrap();
        let session = Session::login(client, "user@example.com", "secret", Duration::from_secs(5))
            .await
            .unwrap();
        ImapProtocol::new(session)
    }

    fn login(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"* OK IMAP4rev1 ready\r\n")
            .write(b"A0000 LOGIN user@example.com secret\r\n")
            .read(b"A0000 OK LOGIN completed\r\n")
    }

    #[tokio::test]
    async fn test_list_returns_descriptors() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 LIST \"\" *\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" \"Work/2024\"\r\n")
            .read(b"A0001 OK LIST completed\r\n")
            .build();

        let mut imap = protocol(mock).await;
        let descriptors = imap.list().await.unwrap();
        assert_eq!(
            descriptors,
            vec![
                "(\\HasNoChildren) \"/\" \"INBOX\"".to_string(),
                "(\\HasNoChildren) \"/\" \"Work/2024\"".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_fails_on_malformed_descriptor() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 LIST \"\" *\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n")
            .read(b"* LIST \\HasNoChildren \"/\" \"Broken\"\r\n")
            .read(b"A0001 OK LIST completed\r\n")
            .build();

        let mut imap = protocol(mock).await;
        let err = imap.list().await.unwrap_err();
        assert!(matches!(err, Error::ProtocolParse(_)));
    }

    #[tokio::test]
    async fn test_search_without_folder_keeps_cause() {
        let mock = login(&mut Builder::new()).build();

        let mut imap = protocol(mock).await;
        let err = imap.search("ALL").await.unwrap_err();
        let Error::Protocol { operation, cause } = err else {
            panic!("expected protocol error");
        };
        assert_eq!(operation, "search");
        assert_eq!(cause, "no mailbox selected");
        assert!(imap.session().is_connected());
    }

    #[tokio::test]
    async fn test_select_search_fetch() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 1 EXISTS\r\nA0001 OK [READ-WRITE] SELECT completed\r\n")
            .write(b"A0002 SEARCH ALL\r\n")
            .read(b"* SEARCH 7\r\nA0002 OK SEARCH completed\r\n")
            .write(b"A0003 FETCH 7 (BODY.PEEK[])\r\n")
            .read(b"* 7 FETCH (BODY[] {4}\r\nabcd)\r\nA0003 OK FETCH completed\r\n")
            .build();

        let mut imap = protocol(mock).await;
        imap.select("INBOX").await.unwrap();
        assert_eq!(imap.search("ALL").await.unwrap(), vec![7]);
        assert_eq!(imap.fetch(7).await.unwrap(), b"abcd".to_vec());
    }

    #[tokio::test]
    async fn test_select_refused_is_protocol_error() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 SELECT Missing\r\n")
            .read(b"A0001 NO [NONEXISTENT] Unknown Mailbox\r\n")
            .build();

        let mut imap = protocol(mock).await;
        let err = imap.select("Missing").await.unwrap_err();
        assert!(matches!(err, Error::Protocol { operation: "select", .. }));
        assert!(imap.session().is_connected());
    }

    #[tokio::test]
    async fn test_fetch_without_message_is_decode_error() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK SELECT completed\r\n")
            .write(b"A0002 FETCH 3 (BODY.PEEK[])\r\n")
            .read(b"A0002 OK FETCH completed\r\n")
            .build();

        let mut imap = protocol(mock).await;
        imap.select("INBOX").await.unwrap();
        let err = imap.fetch(3).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                id: 3,
                source: DecodeError::Fetch(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_noop_after_logout_is_not_connected() {
        let mock = login(&mut Builder::new())
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE logging out\r\nA0001 OK LOGOUT completed\r\n")
            .build();

        let mut imap = protocol(mock).await;
        imap.logout().await.unwrap();
        assert!(matches!(
            imap.noop().await,
            Err(Error::NotConnected {
                operation: "check_connection"
            })
        ));
    }
}
