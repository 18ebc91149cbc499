//! Lazy record scan over one folder.
//!
//! A [`RecordStream`] borrows the connector's session mutably, so nothing
//! else can use the session while a scan is alive. Each call to
//! [`RecordStream::next`] performs at most one protocol round trip:
//!
//! ```text
//! Idle --select--> FolderSelected --search--> Streaming --fetch+decode--> ... --> Done
//!   \                    \                        \
//!    +--------------------+------------------------+--> Failed
//! ```
//!
//! Dropping the stream early is fine; the session stays usable.

use std::collections::VecDeque;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mailtable_mime::HeaderDecoding;

use crate::protocol::MailProtocol;
use crate::record::MessageRecord;
use crate::{Error, Result};

/// Search criteria selecting every message of a folder.
const SEARCH_ALL: &str = "ALL";

/// What a scan does when a single message cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPolicy {
    /// Yield the error and end the scan.
    #[default]
    AbortOnError,
    /// Yield the error and continue with the next message.
    SkipInvalid,
}

/// Position of a scan in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Nothing sent yet.
    Idle,
    /// The folder is selected; the search is next.
    FolderSelected,
    /// Identifiers are known; each pull fetches one message.
    Streaming,
    /// Every message was emitted.
    Done,
    /// The scan ended with an error.
    Failed,
}

impl ScanState {
    /// Returns true once no further items will be produced.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Pull-based sequence of records for one folder.
#[derive(Debug)]
pub struct RecordStream<'a, P> {
    protocol: &'a mut P,
    folder: String,
    policy: ScanPolicy,
    decoding: HeaderDecoding,
    state: ScanState,
    pending: VecDeque<u32>,
    emitted: usize,
}

impl<'a, P: MailProtocol> RecordStream<'a, P> {
    /// Creates a scan of `folder`. Nothing is sent until the first pull.
    pub fn new(
        protocol: &'a mut P,
        folder: impl Into<String>,
        policy: ScanPolicy,
        decoding: HeaderDecoding,
    ) -> Self {
        Self {
            protocol,
            folder: folder.into(),
            policy,
            decoding,
            state: ScanState::Idle,
            pending: VecDeque::new(),
            emitted: 0,
        }
    }

    /// Returns the folder being scanned.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ScanState {
        self.state
    }

    /// Returns how many identifiers are still to be fetched.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Produces the next record.
    ///
    /// Returns `None` once the scan is finished. An error item is terminal
    /// unless the policy is [`ScanPolicy::SkipInvalid`] and the error
    /// concerns a single message.
    pub async fn next(&mut self) -> Option<Result<MessageRecord>> {
        loop {
            match self.state {
                ScanState::Idle => {
                    if let Err(e) = self.protocol.select(&self.folder).await {
                        return Some(self.fail(e));
                    }
                    info!(folder = %self.folder, "folder selected for scan");
                    self.state = ScanState::FolderSelected;
                }
                ScanState::FolderSelected => match self.protocol.search(SEARCH_ALL).await {
                    Ok(ids) => {
                        debug!(folder = %self.folder, count = ids.len(), "search complete");
                        self.pending = ids.into();
                        self.state = ScanState::Streaming;
                    }
                    Err(e) => return Some(self.fail(e)),
                },
                ScanState::Streaming => {
                    let Some(id) = self.pending.pop_front() else {
                        debug!(folder = %self.folder, emitted = self.emitted, "scan complete");
                        self.state = ScanState::Done;
                        return None;
                    };

                    return match self.read(id).await {
                        Ok(record) => {
                            self.emitted += 1;
                            Some(Ok(record))
                        }
                        Err(e) if e.is_decode() && self.policy == ScanPolicy::SkipInvalid => {
                            warn!(error = %e, "skipping undecodable message");
                            Some(Err(e))
                        }
                        Err(e) => Some(self.fail(e)),
                    };
                }
                ScanState::Done | ScanState::Failed => return None,
            }
        }
    }

    /// Collects every remaining item, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error the scan yields.
    pub async fn try_collect(mut self) -> Result<Vec<MessageRecord>> {
        let mut records = Vec::new();
        while let Some(item) = self.next().await {
            records.push(item?);
        }
        Ok(records)
    }

    /// Adapts the scan into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<MessageRecord>> + 'a {
        futures::stream::unfold(self, |mut scan| async move {
            let item = scan.next().await?;
            Some((item, scan))
        })
    }

    async fn read(&mut self, id: u32) -> Result<MessageRecord> {
        let raw = self.protocol.fetch(id).await?;
        debug!(id, bytes = raw.len(), "fetched message");
        MessageRecord::from_raw(&raw, self.decoding).map_err(|source| Error::Decode { id, source })
    }

    fn fail(&mut self, error: Error) -> Result<MessageRecord> {
        debug!(folder = %self.folder, error = %error, "scan failed");
        self.state = ScanState::Failed;
        self.pending.clear();
        Err(error)
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
    use std::collections::HashMap;

    use futures::StreamExt;

    use super::*;
    use crate::error::DecodeError;

    /// Scripted folder: identifiers and raw messages.
    #[derive(Default)]
    struct Folder {
        select_error: Option<String>,
        ids: Vec<u32>,
        messages: HashMap<u32, Vec<u8>>,
        calls: Vec<String>,
    }

    impl MailProtocol for Folder {
        async fn noop(&mut self) -> Result<()> {
            Ok(())
        }

        async fn list(&mut self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn select(&mut self, folder: &str) -> Result<()> {
            self.calls.push(format!("select {folder}"));
            match &self.select_error {
                Some(cause) => Err(Error::Protocol {
                    operation: "select",
                    cause: cause.clone(),
                }),
                None => Ok(()),
            }
        }

        async fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
            self.calls.push(format!("search {criteria}"));
            Ok(self.ids.clone())
        }

        async fn fetch(&mut self, id: u32) -> Result<Vec<u8>> {
            self.calls.push(format!("fetch {id}"));
            self.messages.get(&id).cloned().ok_or(Error::Connection {
                operation: "fetch",
                cause: "connection reset".into(),
            })
        }

        async fn logout(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn message(day: u32, subject: &str) -> Vec<u8> {
        format!("Subject: {subject}\r\nDate: {day} Jan 2024 10:00:00 +0000\r\n\r\nbody {subject}")
            .into_bytes()
    }

    fn folder(ids: &[u32]) -> Folder {
        Folder {
            ids: ids.to_vec(),
            messages: ids.iter().map(|&id| (id, message(id, &format!("m{id}")))).collect(),
            ..Folder::default()
        }
    }

    fn scan(protocol: &mut Folder, policy: ScanPolicy) -> RecordStream<'_, Folder> {
        RecordStream::new(protocol, "INBOX", policy, HeaderDecoding::default())
    }

    #[tokio::test]
    async fn test_lazy_until_first_pull() {
        let mut protocol = folder(&[1]);
        let stream = scan(&mut protocol, ScanPolicy::AbortOnError);
        assert_eq!(stream.state(), ScanState::Idle);
        drop(stream);
        assert!(protocol.calls.is_empty());
    }

    #[tokio::test]
    async fn test_emits_in_search_order() {
        let mut protocol = folder(&[3, 1, 2]);
        let mut stream = scan(&mut protocol, ScanPolicy::AbortOnError);

        let mut subjects = Vec::new();
        while let Some(item) = stream.next().await {
            subjects.push(item.unwrap().subject);
        }
        assert_eq!(subjects, vec!["m3", "m1", "m2"]);
        assert_eq!(stream.state(), ScanState::Done);
        assert!(stream.next().await.is_none());

        assert_eq!(
            protocol.calls,
            vec!["select INBOX", "search ALL", "fetch 3", "fetch 1", "fetch 2"]
        );
    }

    #[tokio::test]
    async fn test_empty_folder() {
        let mut protocol = folder(&[]);
        let mut stream = scan(&mut protocol, ScanPolicy::AbortOnError);
        assert!(stream.next().await.is_none());
        assert_eq!(stream.state(), ScanState::Done);
    }

    #[tokio::test]
    async fn test_select_failure_yields_only_error() {
        let mut protocol = Folder {
            select_error: Some("Unknown Mailbox".into()),
            ..folder(&[1])
        };
        let mut stream = scan(&mut protocol, ScanPolicy::AbortOnError);

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Protocol { operation: "select", .. }));
        assert_eq!(stream.state(), ScanState::Failed);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_abort_on_decode_error() {
        let mut protocol = folder(&[1, 2, 3]);
        protocol
            .messages
            .insert(2, b"Date: not a date\r\n\r\nx".to_vec());
        let mut stream = scan(&mut protocol, ScanPolicy::AbortOnError);

        assert_eq!(stream.next().await.unwrap().unwrap().subject, "m1");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                id: 2,
                source: DecodeError::MalformedDate(_)
            }
        ));
        assert!(stream.next().await.is_none());
        assert_eq!(stream.remaining(), 0);
        drop(stream);

        assert!(!protocol.calls.contains(&"fetch 3".to_string()));
    }

    #[tokio::test]
    async fn test_skip_invalid_continues() {
        let mut protocol = folder(&[1, 2, 3]);
        protocol.messages.insert(2, b"Subject: undated\r\n\r\nx".to_vec());
        let mut stream = scan(&mut protocol, ScanPolicy::SkipInvalid);

        let mut ok = Vec::new();
        let mut errors = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(record) => ok.push(record.subject),
                Err(e) => errors.push(e),
            }
        }

        assert_eq!(ok, vec!["m1", "m3"]);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            Error::Decode {
                id: 2,
                source: DecodeError::MissingDate
            }
        ));
    }

    #[tokio::test]
    async fn test_skip_invalid_still_stops_on_connection_error() {
        let mut protocol = folder(&[1, 2]);
        protocol.messages.remove(&1);
        let mut stream = scan(&mut protocol, ScanPolicy::SkipInvalid);

        assert!(matches!(
            stream.next().await,
            Some(Err(Error::Connection { .. }))
        ));
        assert!(stream.next().await.is_none());
        assert_eq!(stream.state(), ScanState::Failed);
    }

    #[tokio::test]
    async fn test_early_drop_leaves_protocol_usable() {
        let mut protocol = folder(&[1, 2, 3]);
        {
            let mut stream = scan(&mut protocol, ScanPolicy::AbortOnError);
            assert!(stream.next().await.unwrap().is_ok());
        }
        assert!(protocol.noop().await.is_ok());
        assert_eq!(protocol.calls.len(), 3);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let mut protocol = folder(&[1, 2, 3]);
        let records: Vec<_> = scan(&mut protocol, ScanPolicy::AbortOnError)
            .into_stream()
            .take(2)
            .collect()
            .await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].as_ref().unwrap().day, "2024-01-02");
    }

    #[tokio::test]
    async fn test_try_collect() {
        let mut protocol = folder(&[5, 6]);
        let records = scan(&mut protocol, ScanPolicy::AbortOnError)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "body m5");
    }
}
