//! Integration tests for the IMAP client.
//!
//! These tests replay a scripted server conversation through an in-memory
//! stream and inspect what the client sent.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailtable_imap::{Client, Error, FetchAttribute, Selection};

/// Mock stream that returns predefined responses.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured commands sent by the client.
    sent: Vec<u8>,
}

impl MockStream {
    fn new(responses: &[u8]) -> Self {
        Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Vec::new(),
        }
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.responses.position()).unwrap();
        let data = self.responses.get_ref();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let to_read = (data.len() - pos).min(buf.remaining());
        buf.put_slice(&data[pos..pos + to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

const MESSAGE: &[u8] = b"From: a@example.com\r\nSubject: hi\r\n\r\nbody\r\n";

fn fetch_response(seq: u32, tag: &str) -> Vec<u8> {
    let mut response = format!("* {seq} FETCH (RFC822 {{{}}}\r\n", MESSAGE.len()).into_bytes();
    response.extend_from_slice(MESSAGE);
    response.extend_from_slice(format!(")\r\n{tag} OK FETCH completed\r\n").as_bytes());
    response
}

#[tokio::test]
async fn test_full_scan_conversation() {
    let mut script = Vec::new();
    script.extend_from_slice(b"* OK [CAPABILITY IMAP4rev1] Gimap ready\r\n");
    script.extend_from_slice(b"A0000 OK user authenticated (Success)\r\n");
    script.extend_from_slice(
        b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
          * LIST (\\HasChildren \\Noselect) \"/\" \"[Gmail]\"\r\n\
          * LIST (\\All \\HasNoChildren) \"/\" \"[Gmail]/All Mail\"\r\n\
          A0001 OK Success\r\n",
    );
    script.extend_from_slice(
        b"* FLAGS (\\Answered \\Flagged \\Draft \\Deleted \\Seen)\r\n\
          * 2 EXISTS\r\n\
          * 0 RECENT\r\n\
          A0002 OK [READ-WRITE] INBOX selected. (Success)\r\n",
    );
    script.extend_from_slice(b"* SEARCH 1 2\r\nA0003 OK SEARCH completed (Success)\r\n");
    script.extend_from_slice(&fetch_response(1, "A0004"));
    script.extend_from_slice(b"* BYE LOGOUT Requested\r\nA0005 OK 73 good day (Success)\r\n");

    let client = Client::from_stream(MockStream::new(&script)).await.unwrap();
    let mut client = client.login("user@gmail.com", "app password").await.unwrap();

    let folders = client.list("", "*").await.unwrap();
    let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["INBOX", "[Gmail]", "[Gmail]/All Mail"]);
    assert_eq!(folders[0].descriptor, "(\\HasNoChildren) \"/\" \"INBOX\"");

    let Selection::Selected(mut client) = client.select("INBOX").await.unwrap() else {
        panic!("expected INBOX to be selected");
    };
    assert_eq!(client.state().status().exists, 2);
    assert_eq!(client.mailbox(), "INBOX");

    assert_eq!(client.search("ALL").await.unwrap(), vec![1, 2]);

    let raw = client.fetch(1, FetchAttribute::Rfc822).await.unwrap();
    assert_eq!(raw.as_deref(), Some(MESSAGE));

    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_commands_on_the_wire() {
    let script = b"* OK ready\r\n\
                   A0000 OK LOGIN completed\r\n\
                   A0001 OK NOOP completed\r\n";

    let mut client = Client::from_stream(MockStream::new(script))
        .await
        .unwrap()
        .login("user", "secret pass")
        .await
        .unwrap();
    client.noop().await.unwrap();

    let sent = String::from_utf8(client_sent(client)).unwrap();
    assert_eq!(
        sent,
        "A0000 LOGIN user \"secret pass\"\r\nA0001 NOOP\r\n"
    );
}

#[tokio::test]
async fn test_fetch_peeks_without_marking_seen() {
    let mut script = b"* OK ready\r\n\
                       A0000 OK LOGIN completed\r\n\
                       A0001 OK SELECT completed\r\n"
        .to_vec();
    script.extend_from_slice(format!("* 4 FETCH (BODY[] {{{}}}\r\n", MESSAGE.len()).as_bytes());
    script.extend_from_slice(MESSAGE);
    script.extend_from_slice(b")\r\nA0002 OK FETCH completed\r\n");

    let client = Client::from_stream(MockStream::new(&script))
        .await
        .unwrap()
        .login("user", "pass")
        .await
        .unwrap();
    let Selection::Selected(mut client) = client.select("INBOX").await.unwrap() else {
        panic!("expected INBOX to be selected");
    };

    let raw = client.fetch(4, FetchAttribute::BodyPeek).await.unwrap();
    assert_eq!(raw.as_deref(), Some(MESSAGE));

    let sent = String::from_utf8(client_sent(client)).unwrap();
    assert!(sent.ends_with("A0002 FETCH 4 (BODY.PEEK[])\r\n"));
}

fn client_sent<State>(client: Client<MockStream, State>) -> Vec<u8> {
    client.into_stream().sent
}

#[tokio::test]
async fn test_greeting_bye() {
    let result = Client::from_stream(MockStream::new(b"* BYE too many connections\r\n")).await;
    assert!(matches!(result, Err(Error::Bye(text)) if text.contains("too many")));
}

#[tokio::test]
async fn test_login_rejected() {
    let script = b"* OK ready\r\nA0000 NO [AUTHENTICATIONFAILED] Invalid credentials (Failure)\r\n";
    let client = Client::from_stream(MockStream::new(script)).await.unwrap();

    let err = client.login("user", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::No(ref text) if text.contains("Invalid credentials")));
    assert!(err.is_rejection());
}

#[tokio::test]
async fn test_select_rejected_returns_client() {
    let script = b"* OK ready\r\n\
                   A0000 OK LOGIN completed\r\n\
                   A0001 NO [NONEXISTENT] Unknown Mailbox: Nope (Failure)\r\n\
                   * LIST () \"/\" INBOX\r\n\
                   A0002 OK LIST completed\r\n";

    let client = Client::from_stream(MockStream::new(script))
        .await
        .unwrap()
        .login("user", "pass")
        .await
        .unwrap();

    let Selection::Rejected { mut client, error } = client.select("Nope").await.unwrap() else {
        panic!("expected SELECT to be rejected");
    };
    assert!(matches!(error, Error::No(_)));

    let folders = client.list("", "*").await.unwrap();
    assert_eq!(folders.len(), 1);
}

#[tokio::test]
async fn test_list_fails_on_malformed_entry() {
    let script = b"* OK ready\r\n\
                   A0000 OK LOGIN completed\r\n\
                   * LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
                   * LIST \\HasNoChildren \"/\" \"Broken\"\r\n\
                   A0001 OK LIST completed\r\n";

    let mut client = Client::from_stream(MockStream::new(script))
        .await
        .unwrap()
        .login("user", "pass")
        .await
        .unwrap();

    let err = client.list("", "*").await.unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
}

#[tokio::test]
async fn test_fetch_missing_message() {
    let script = b"* OK ready\r\n\
                   A0000 OK LOGIN completed\r\n\
                   * 0 EXISTS\r\n\
                   A0001 OK SELECT completed\r\n\
                   A0002 OK FETCH completed\r\n";

    let client = Client::from_stream(MockStream::new(script))
        .await
        .unwrap()
        .login("user", "pass")
        .await
        .unwrap();
    let Selection::Selected(mut client) = client.select("INBOX").await.unwrap() else {
        panic!("expected INBOX to be selected");
    };

    assert_eq!(client.fetch(9, FetchAttribute::Rfc822).await.unwrap(), None);
}

#[tokio::test]
async fn test_fetch_skips_unsolicited_updates() {
    let mut script = b"* OK ready\r\n\
                       A0000 OK LOGIN completed\r\n\
                       A0001 OK SELECT completed\r\n\
                       * 5 FETCH (FLAGS (\\Seen))\r\n"
        .to_vec();
    script.extend_from_slice(&fetch_response(3, "A0002"));

    let client = Client::from_stream(MockStream::new(&script))
        .await
        .unwrap()
        .login("user", "pass")
        .await
        .unwrap();
    let Selection::Selected(mut client) = client.select("INBOX").await.unwrap() else {
        panic!("expected INBOX to be selected");
    };

    let raw = client.fetch(3, FetchAttribute::Rfc822).await.unwrap();
    assert_eq!(raw.as_deref(), Some(MESSAGE));
}

#[tokio::test]
async fn test_connection_closed_mid_command() {
    let script = b"* OK ready\r\nA0000 OK LOGIN completed\r\n* SEARCH 1";

    let mut client = Client::from_stream(MockStream::new(script))
        .await
        .unwrap()
        .login("user", "pass")
        .await
        .unwrap();

    let err = client.noop().await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
