//! Outbound mail protocol contract.
//!
//! The connector never talks to the network directly. It drives a
//! [`MailProtocol`] session, which a [`Connect`] factory opens and
//! authenticates. The IMAP implementation lives in [`crate::imap`]; tests
//! substitute scripted sessions.

use std::future::Future;

use crate::Result;
use crate::config::ConnectorConfig;

/// One authenticated mail session.
///
/// Every call is a single round trip awaited to completion. Implementations
/// own exactly one connection.
pub trait MailProtocol: Send {
    /// Liveness probe.
    fn noop(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Lists every folder, returning raw descriptors in server order.
    ///
    /// A descriptor has the shape `(\HasNoChildren) "/" "INBOX"`.
    fn list(&mut self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Selects a folder for the following searches and fetches.
    fn select(&mut self, folder: &str) -> impl Future<Output = Result<()>> + Send;

    /// Searches the selected folder and returns message identifiers in
    /// server order.
    fn search(&mut self, criteria: &str) -> impl Future<Output = Result<Vec<u32>>> + Send;

    /// Fetches the complete raw message for `id`.
    fn fetch(&mut self, id: u32) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Ends the session.
    fn logout(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens authenticated sessions.
pub trait Connect: Send + Sync {
    /// Session type produced by this factory.
    type Session: MailProtocol;

    /// Connects and logs in with the configured account.
    fn connect(
        &self,
        config: &ConnectorConfig,
    ) -> impl Future<Output = Result<Self::Session>> + Send;
}
