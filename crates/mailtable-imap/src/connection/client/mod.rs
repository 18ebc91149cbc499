//! Type-state IMAP client connection.
//!
//! Uses the type-state pattern to enforce valid state transitions at compile
//! time:
//!
//! - `NotAuthenticated`: initial state after the greeting
//! - `Authenticated`: after a successful LOGIN
//! - `Selected`: after a successful SELECT
//!
//! Each state only exposes the commands that are valid in it.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

pub use self::authenticated::Selection;
pub use self::states::{Authenticated, Authorized, MailboxStatus, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::response::{Response, ResponseParser, Status};
use crate::{Error, Result};

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    stream: FramedStream<S>,
    tag_gen: TagGenerator,
    state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the current state.
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Consumes the client and returns the underlying stream.
    pub fn into_stream(self) -> S {
        self.stream.into_inner()
    }

    /// Sends a NOOP command.
    pub async fn noop(&mut self) -> Result<()> {
        self.run(&Command::Noop).await.map(drop)
    }

    /// Logs out and closes the session.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next_tag();
        debug!(%tag, "LOGOUT");
        self.stream.write_command(&Command::Logout.serialize(&tag)).await?;

        // The untagged BYE precedes the tagged OK
        let responses = self.stream.read_until_tagged(&tag).await?;
        match check_tagged(&responses, &tag) {
            Ok(()) | Err(Error::Bye(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Sends a command and reads through its tagged completion.
    ///
    /// Returns every response on success.
    pub(crate) async fn run(&mut self, command: &Command) -> Result<Vec<Vec<u8>>> {
        let tag = self.tag_gen.next_tag();
        debug!(%tag, command = command.name(), "sending command");

        self.stream.write_command(&command.serialize(&tag)).await?;
        let responses = self.stream.read_until_tagged(&tag).await?;
        check_tagged(&responses, &tag)?;

        Ok(responses)
    }

    /// Moves the connection into another state.
    fn into_state<T>(self, state: T) -> Client<S, T> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            state,
        }
    }
}

/// Checks that the tagged completion for `tag` is OK.
fn check_tagged(responses: &[Vec<u8>], tag: &str) -> Result<()> {
    let last = responses
        .last()
        .ok_or_else(|| Error::Protocol("missing tagged response".to_string()))?;

    match ResponseParser::parse(last)? {
        Response::Tagged {
            tag: resp_tag,
            status,
            text,
        } if resp_tag == tag => match status {
            Status::Ok | Status::PreAuth => Ok(()),
            Status::No => Err(Error::No(text)),
            Status::Bad => Err(Error::Bad(text)),
            Status::Bye => Err(Error::Bye(text)),
        },
        _ => Err(Error::Protocol("missing tagged response".to_string())),
    }
}

/// Parses every response, skipping ones that fail to parse.
fn parse_all(responses: &[Vec<u8>]) -> impl Iterator<Item = Response> + '_ {
    responses.iter().filter_map(|bytes| match ResponseParser::parse(bytes) {
        Ok(response) => Some(response),
        Err(e) => {
            debug!(error = %e, "skipping unparsable response");
            None
        }
    })
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
    fn test_check_tagged_statuses() {
        let ok = vec![b"* 1 EXISTS\r\n".to_vec(), b"A0001 OK done\r\n".to_vec()];
        assert!(check_tagged(&ok, "A0001").is_ok());

        let no = vec![b"A0001 NO [NONEXISTENT] Unknown Mailbox\r\n".to_vec()];
        assert!(matches!(check_tagged(&no, "A0001"), Err(Error::No(text)) if text.contains("Unknown")));

        let bad = vec![b"A0001 BAD syntax\r\n".to_vec()];
        assert!(matches!(check_tagged(&bad, "A0001"), Err(Error::Bad(_))));
    }

    #[test]
    fn test_check_tagged_wrong_tag() {
        let responses = vec![b"A0002 OK done\r\n".to_vec()];
        assert!(matches!(
            check_tagged(&responses, "A0001"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(check_tagged(&[], "A0001"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_all_skips_garbage() {
        let responses = vec![b"\r\n".to_vec(), b"* SEARCH 4\r\n".to_vec()];
        assert_eq!(parse_all(&responses).count(), 1);
    }
}
