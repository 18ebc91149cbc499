//! Single-connection IMAP session.
//!
//! `Session` wraps the type-state [`Client`] behind a `&mut self` API and
//! applies the configured timeouts to every round trip. It owns exactly one
//! connection and never reconnects: after a transport failure or timeout it
//! is disconnected and every further command fails with
//! [`Error::InvalidState`].
//!
//! ```ignore
//! use mailtable_imap::{Config, Session};
//!
//! let config = Config::new("imap.gmail.com");
//! let mut session = Session::connect(&config, "user@gmail.com", "app-password").await?;
//!
//! let folders = session.list("", "*").await?;
//! session.select("INBOX").await?;
//! for seq in session.search("ALL").await? {
//!     let raw = session.fetch(seq, FetchAttribute::BodyPeek).await?;
//! }
//! session.logout().await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::client::{Authenticated, Client, MailboxStatus, NotAuthenticated, Selected, Selection};
use super::config::Config;
use super::stream::{ImapStream, connect};
use crate::command::FetchAttribute;
use crate::response::ListEntry;
use crate::{Error, Result};

/// Current state of the session.
enum SessionState<S> {
    /// No live connection.
    Disconnected,
    /// Authenticated, no mailbox selected.
    Authenticated(Client<S, Authenticated>),
    /// Mailbox selected.
    Selected(Client<S, Selected>),
}

/// IMAP session owning one authenticated connection.
pub struct Session<S = ImapStream> {
    state: SessionState<S>,
    io_timeout: Duration,
}

impl Session<ImapStream> {
    /// Connects, reads the greeting and logs in.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, TLS handshake or LOGIN fails or
    /// times out.
    pub async fn connect(config: &Config, username: &str, password: &str) -> Result<Self> {
        let stream = with_timeout(config.connect_timeout, connect(config)).await?;
        let client = with_timeout(config.connect_timeout, Client::from_stream(stream)).await?;
        let session = Self::login(client, username, password, config.io_timeout).await?;

        info!(host = %config.host, port = config.port, "IMAP session established");
        Ok(session)
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Logs in over an already greeted connection.
    ///
    /// # Errors
    ///
    /// Returns an error if LOGIN is refused or times out.
    pub async fn login(
        client: Client<S, NotAuthenticated>,
        username: &str,
        password: &str,
        io_timeout: Duration,
    ) -> Result<Self> {
        let client = with_timeout(io_timeout, client.login(username, password)).await?;
        Ok(Self {
            state: SessionState::Authenticated(client),
            io_timeout,
        })
    }

    /// Returns true if the session holds a live connection.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        !matches!(self.state, SessionState::Disconnected)
    }

    /// Returns the currently selected mailbox, if any.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        match &self.state {
            SessionState::Selected(client) => Some(client.mailbox()),
            _ => None,
        }
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error if disconnected or the server does not answer OK.
    pub async fn noop(&mut self) -> Result<()> {
        let io_timeout = self.io_timeout;
        let result = match &mut self.state {
            SessionState::Authenticated(client) => with_timeout(io_timeout, client.noop()).await,
            SessionState::Selected(client) => with_timeout(io_timeout, client.noop()).await,
            SessionState::Disconnected => return Err(not_connected()),
        };
        self.settle(result)
    }

    /// Lists mailboxes matching `pattern` under `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if disconnected or LIST fails.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListEntry>> {
        let io_timeout = self.io_timeout;
        let result = match &mut self.state {
            SessionState::Authenticated(client) => {
                with_timeout(io_timeout, client.list(reference, pattern)).await
            }
            SessionState::Selected(client) => {
                with_timeout(io_timeout, client.list(reference, pattern)).await
            }
            SessionState::Disconnected => return Err(not_connected()),
        };
        self.settle(result)
    }

    /// Selects a mailbox.
    ///
    /// A refused SELECT leaves the session authenticated with no mailbox
    /// selected.
    ///
    /// # Errors
    ///
    /// Returns an error if disconnected or SELECT fails.
    pub async fn select(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        let io_timeout = self.io_timeout;
        let selection = match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Authenticated(client) => {
                with_timeout(io_timeout, client.select(mailbox)).await
            }
            SessionState::Selected(client) => with_timeout(io_timeout, client.select(mailbox)).await,
            SessionState::Disconnected => return Err(not_connected()),
        };

        match selection {
            Ok(Selection::Selected(client)) => {
                let status = client.state().status();
                self.state = SessionState::Selected(client);
                Ok(status)
            }
            Ok(Selection::Rejected { client, error }) => {
                self.state = SessionState::Authenticated(client);
                Err(error)
            }
            Err(e) => {
                warn!(error = %e, mailbox, "connection lost during SELECT");
                Err(e)
            }
        }
    }

    /// Searches the selected mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is selected or SEARCH fails.
    pub async fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let io_timeout = self.io_timeout;
        let result = match &mut self.state {
            SessionState::Selected(client) => with_timeout(io_timeout, client.search(criteria)).await,
            SessionState::Authenticated(_) => return Err(not_selected()),
            SessionState::Disconnected => return Err(not_connected()),
        };
        self.settle(result)
    }

    /// Fetches one complete message from the selected mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is selected or FETCH fails.
    pub async fn fetch(&mut self, seq: u32, attribute: FetchAttribute) -> Result<Option<Vec<u8>>> {
        let io_timeout = self.io_timeout;
        let result = match &mut self.state {
            SessionState::Selected(client) => {
                with_timeout(io_timeout, client.fetch(seq, attribute)).await
            }
            SessionState::Authenticated(_) => return Err(not_selected()),
            SessionState::Disconnected => return Err(not_connected()),
        };
        self.settle(result)
    }

    /// Logs out. The session is disconnected afterwards whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if disconnected or LOGOUT fails.
    pub async fn logout(&mut self) -> Result<()> {
        let io_timeout = self.io_timeout;
        match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Authenticated(client) => with_timeout(io_timeout, client.logout()).await,
            SessionState::Selected(client) => with_timeout(io_timeout, client.logout()).await,
            SessionState::Disconnected => Err(not_connected()),
        }
    }

    /// Drops the connection after failures that leave the stream unusable.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && !e.is_rejection()
        {
            debug!(error = %e, "dropping IMAP connection");
            self.state = SessionState::Disconnected;
        }
        result
    }
}

impl<S> std::fmt::Debug for Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.is_connected())
            .field("selected_mailbox", &self.selected_mailbox())
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

/// Awaits `future`, failing with [`Error::Timeout`] after `duration`.
async fn with_timeout<T>(duration: Duration, future: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| Error::Timeout(duration))?
}

fn not_connected() -> Error {
    Error::InvalidState("not connected".to_string())
}

fn not_selected() -> Error {
    Error::InvalidState("no mailbox selected".to_string())
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
    use tokio_test::io::Builder;

    async fn session(mock: tokio_test::io::Mock) -> Session<tokio_test::io::Mock> {
        let client = Client::from_stream(mock).await.unwrap();
        Session::login(client, "user", "pass", Duration::from_secs(5))
            .await
            .unwrap()
    }

    fn login_script() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK IMAP4rev1 ready\r\n")
            .write(b"A0000 LOGIN user pass\r\n")
            .read(b"A0000 OK LOGIN completed\r\n");
        builder
    }

    #[tokio::test]
    async fn test_select_search_fetch() {
        let mock = login_script()
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 2 EXISTS\r\nA0001 OK [READ-WRITE] SELECT completed\r\n")
            .write(b"A0002 SEARCH ALL\r\n")
            .read(b"* SEARCH 1 2\r\nA0002 OK SEARCH completed\r\n")
            .write(b"A0003 FETCH 1 (BODY.PEEK[])\r\n")
            .read(b"* 1 FETCH (BODY[] {4}\r\nbody)\r\nA0003 OK FETCH completed\r\n")
            .build();
        let mut session = session(mock).await;

        let status = session.select("INBOX").await.unwrap();
        assert_eq!(status.exists, 2);
        assert_eq!(session.selected_mailbox(), Some("INBOX"));
        assert_eq!(session.search("ALL").await.unwrap(), vec![1, 2]);
        assert_eq!(
            session.fetch(1, FetchAttribute::BodyPeek).await.unwrap(),
            Some(b"body".to_vec())
        );
    }

    #[tokio::test]
    async fn test_rejected_select_keeps_session() {
        let mock = login_script()
            .write(b"A0001 SELECT Missing\r\n")
            .read(b"A0001 NO [NONEXISTENT] Unknown Mailbox\r\n")
            .write(b"A0002 NOOP\r\n")
            .read(b"A0002 OK NOOP completed\r\n")
            .build();
        let mut session = session(mock).await;

        let err = session.select("Missing").await.unwrap_err();
        assert!(matches!(err, Error::No(_)));
        assert!(session.is_connected());
        assert_eq!(session.selected_mailbox(), None);
        session.noop().await.unwrap();
    }

    #[tokio::test]
    async fn test_search_requires_selection() {
        let mock = login_script().build();
        let mut session = session(mock).await;

        let err = session.search("ALL").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_bad_keeps_connection() {
        let mock = login_script()
            .write(b"A0001 NOOP\r\n")
            .read(b"* BYE going away\r\nA0001 BAD oops\r\n")
            .build();
        let mut session = session(mock).await;

        assert!(matches!(session.noop().await, Err(Error::Bad(_))));
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_eof_disconnects() {
        let mock = login_script().write(b"A0001 NOOP\r\n").build();
        let mut session = session(mock).await;

        assert!(matches!(session.noop().await, Err(Error::Io(_))));
        assert!(!session.is_connected());
        assert!(matches!(session.noop().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_logout() {
        let mock = login_script()
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE logging out\r\nA0001 OK LOGOUT completed\r\n")
            .build();
        let mut session = session(mock).await;

        session.logout().await.unwrap();
        assert!(!session.is_connected());
        assert!(matches!(session.logout().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_login_refused() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN user wrong\r\n")
            .read(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();

        let err = Session::login(client, "user", "wrong", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::No(text) if text.contains("Invalid credentials")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let mock = login_script()
            .write(b"A0001 NOOP\r\n")
            .wait(Duration::from_secs(10))
            .build();
        let mut session = session(mock).await;

        assert!(matches!(session.noop().await, Err(Error::Timeout(_))));
        assert!(!session.is_connected());
    }
}
