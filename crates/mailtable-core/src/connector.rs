//! The mailbox-as-tables connector.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ConnectorConfig;
use crate::folder::parse_folder_list;
use crate::imap::ImapConnect;
use crate::protocol::{Connect, MailProtocol};
use crate::schema::{Column, columns};
use crate::stream::RecordStream;
use crate::{Error, Result};

/// Outcome of a connection attempt or liveness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// True when the operation succeeded.
    pub status: bool,
    /// Cause of the failure.
    pub error: Option<String>,
}

impl ConnectionStatus {
    /// Builds a status from an operation's result.
    #[must_use]
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self {
                status: true,
                error: None,
            },
            Err(e) => Self {
                status: false,
                error: Some(e.to_string()),
            },
        }
    }
}

impl<T> From<&Result<T>> for ConnectionStatus {
    fn from(result: &Result<T>) -> Self {
        Self::from_result(result)
    }
}

/// Exposes one mail account as a set of tables.
///
/// Folders are tables and every message is a [`MessageRecord`](crate::MessageRecord)
/// row. The connector holds at most one live session.
///
/// ```ignore
/// let mut connector = MailConnector::new(ConnectorConfig::from_env()?);
/// connector.connect().await?;
///
/// let mut records = connector.select_and_stream("INBOX")?;
/// while let Some(record) = records.next().await {
///     println!("{:?}", record?);
/// }
/// connector.disconnect().await;
/// ```
#[derive(Debug)]
pub struct MailConnector<C: Connect = ImapConnect> {
    config: ConnectorConfig,
    connector: C,
    session: Option<C::Session>,
}

impl MailConnector<ImapConnect> {
    /// Creates an IMAP connector. No connection is opened yet.
    #[must_use]
    pub const fn new(config: ConnectorConfig) -> Self {
        Self::with_connector(config, ImapConnect)
    }
}

impl<C: Connect> MailConnector<C> {
    /// Creates a connector using a custom session factory.
    #[must_use]
    pub const fn with_connector(config: ConnectorConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            session: None,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Returns true while a session is held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Opens and authenticates a session, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the connection
    /// or login fails. No session is held afterwards in that case.
    pub async fn connect(&mut self) -> Result<()> {
        self.disconnect().await;
        self.config.validate()?;

        let session = self.connector.connect(&self.config).await?;
        info!(
            account = %self.config.email,
            host = %self.config.host,
            "connected"
        );
        self.session = Some(session);
        Ok(())
    }

    /// Logs out and drops the session.
    ///
    /// Logout failures are ignored. Calling this without a session is a
    /// no-op.
    pub async fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            match session.logout().await {
                Ok(()) => debug!("logged out"),
                Err(e) => debug!(error = %e, "logout failed, ignoring"),
            }
        }
    }

    /// Checks that the session is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no session or the server does not
    /// answer.
    pub async fn check_connection(&mut self) -> Result<()> {
        self.session_mut("check_connection")?.noop().await
    }

    /// Lists folder names in server order.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no session, LIST fails, or any folder
    /// descriptor is malformed.
    pub async fn list_tables(&mut self) -> Result<Vec<String>> {
        let descriptors = self.session_mut("list_tables")?.list().await?;
        parse_folder_list(descriptors)
    }

    /// Returns the column schema. Every table has the same columns.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn get_columns(&self, _table: &str) -> Vec<Column> {
        columns()
    }

    /// Starts a lazy scan of `folder`.
    ///
    /// The folder is selected on the first pull. The scan borrows the
    /// session until it is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no session.
    pub fn select_and_stream(&mut self, folder: &str) -> Result<RecordStream<'_, C::Session>> {
        let policy = self.config.policy;
        let decoding = self.config.header_decoding;
        let session = self.session_mut("select_and_stream")?;
        Ok(RecordStream::new(session, folder, policy, decoding))
    }

    fn session_mut(&mut self, operation: &'static str) -> Result<&mut C::Session> {
        self.session
            .as_mut()
            .ok_or(Error::NotConnected { operation })
    }
}
