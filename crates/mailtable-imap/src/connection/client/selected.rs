//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::states::Selected;
use super::{Client, parse_all};
use crate::Result;
use crate::command::{Command, FetchAttribute};
use crate::response::{Response, UntaggedResponse};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Searches the mailbox and returns message sequence numbers in the
    /// order the server sent them.
    pub async fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let responses = self
            .run(&Command::Search {
                criteria: criteria.to_string(),
            })
            .await?;

        let mut ids = Vec::new();
        for response in parse_all(&responses) {
            if let Response::Untagged(UntaggedResponse::Search(found)) = response {
                ids.extend(found);
            }
        }
        Ok(ids)
    }

    /// Fetches one complete message.
    ///
    /// Returns `None` if the server completed the FETCH without sending the
    /// message, e.g. because it was expunged meanwhile.
    pub async fn fetch(&mut self, seq: u32, attribute: FetchAttribute) -> Result<Option<Vec<u8>>> {
        let responses = self.run(&Command::Fetch { seq, attribute }).await?;

        // Unsolicited FETCH responses for other messages may be interleaved
        Ok(parse_all(&responses).find_map(|response| match response {
            Response::Untagged(UntaggedResponse::Fetch {
                seq: fetched,
                message: Some(message),
            }) if fetched == seq => Some(message),
            _ => None,
        }))
    }
}
