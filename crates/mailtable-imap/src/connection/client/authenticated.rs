//! Mailbox commands valid once authenticated.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::states::{Authenticated, Authorized, MailboxStatus, Selected};
use super::{Client, parse_all};
use crate::command::Command;
use crate::response::{ListEntry, Response, ResponseParser, UntaggedResponse};
use crate::{Error, Result};

/// Outcome of a SELECT the server answered.
#[derive(Debug)]
pub enum Selection<S> {
    /// The mailbox is open.
    Selected(Client<S, Selected>),
    /// The server refused with NO or BAD. The connection stays usable and
    /// no mailbox is selected.
    Rejected {
        /// The connection, back in the authenticated state.
        client: Client<S, Authenticated>,
        /// The server's refusal.
        error: Error,
    },
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
    State: Authorized,
{
    /// Lists mailboxes matching a pattern.
    ///
    /// Entries are returned in server order. A `* LIST` line that does not
    /// parse fails the whole call with [`Error::Parse`].
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListEntry>> {
        let responses = self
            .run(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;

        let mut entries = Vec::new();
        for bytes in responses.iter().filter(|bytes| is_list_line(bytes)) {
            if let Response::Untagged(UntaggedResponse::List(entry)) =
                ResponseParser::parse(bytes)?
            {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Selects a mailbox.
    ///
    /// A refused SELECT hands the connection back in the authenticated
    /// state; transport failures consume it.
    pub async fn select(mut self, mailbox: &str) -> Result<Selection<S>> {
        let command = Command::Select {
            mailbox: mailbox.to_string(),
        };

        match self.run(&command).await {
            Ok(responses) => {
                let status = parse_mailbox_status(&responses);
                debug!(mailbox, exists = status.exists, "mailbox selected");
                Ok(Selection::Selected(
                    self.into_state(Selected::new(mailbox, status)),
                ))
            }
            Err(error) if error.is_rejection() => Ok(Selection::Rejected {
                client: self.into_state(Authenticated),
                error,
            }),
            Err(error) => Err(error),
        }
    }
}

fn is_list_line(bytes: &[u8]) -> bool {
    bytes
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"* LIST "))
}

/// Reads the mailbox status from SELECT responses.
fn parse_mailbox_status(responses: &[Vec<u8>]) -> MailboxStatus {
    let mut status = MailboxStatus::default();
    for response in parse_all(responses) {
        if let Response::Untagged(UntaggedResponse::Exists(n)) = response {
            status.exists = n;
        }
    }
    status
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

    #[test]
    fn test_is_list_line() {
        assert!(is_list_line(b"* LIST () \"/\" INBOX\r\n"));
        assert!(is_list_line(b"* list () \"/\" INBOX\r\n"));
        assert!(!is_list_line(b"* LSUB () \"/\" INBOX\r\n"));
        assert!(!is_list_line(b"A0001 OK LIST completed\r\n"));
        assert!(!is_list_line(b"* LIST"));
    }
}
