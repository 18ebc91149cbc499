//! End-to-end connector scenarios against a scripted mailbox.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mailtable_core::{
    COLUMN_NAMES, Connect, ConnectionStatus, ConnectorConfig, DecodeError, Error, MailConnector,
    MailProtocol, Result, ScanPolicy,
};

/// A mailbox held in memory, shared with the test for inspection.
#[derive(Debug, Default)]
struct Mailbox {
    password: String,
    folders: Vec<String>,
    messages: HashMap<String, Vec<(u32, Vec<u8>)>>,
    log: Vec<String>,
    fail_logout: bool,
}

type Shared = Arc<Mutex<Mailbox>>;

#[derive(Debug)]
struct FakeSession {
    mailbox: Shared,
    selected: Option<String>,
}

impl FakeSession {
    fn record(&self, entry: impl Into<String>) {
        self.mailbox.lock().unwrap().log.push(entry.into());
    }
}

impl MailProtocol for FakeSession {
    async fn noop(&mut self) -> Result<()> {
        self.record("noop");
        Ok(())
    }

    async fn list(&mut self) -> Result<Vec<String>> {
        self.record("list");
        Ok(self.mailbox.lock().unwrap().folders.clone())
    }

    async fn select(&mut self, folder: &str) -> Result<()> {
        self.record(format!("select {folder}"));
        if self.mailbox.lock().unwrap().messages.contains_key(folder) {
            self.selected = Some(folder.to_string());
            Ok(())
        } else {
            Err(Error::Protocol {
                operation: "select",
                cause: format!("Unknown Mailbox: {folder}"),
            })
        }
    }

    async fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        self.record(format!("search {criteria}"));
        let folder = self.selected.clone().unwrap_or_default();
        let mailbox = self.mailbox.lock().unwrap();
        Ok(mailbox.messages[&folder].iter().map(|(id, _)| *id).collect())
    }

    async fn fetch(&mut self, id: u32) -> Result<Vec<u8>> {
        self.record(format!("fetch {id}"));
        let folder = self.selected.clone().unwrap_or_default();
        let mailbox = self.mailbox.lock().unwrap();
        Ok(mailbox.messages[&folder]
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, raw)| raw.clone())
            .unwrap_or_default())
    }

    async fn logout(&mut self) -> Result<()> {
        self.record("logout");
        if self.mailbox.lock().unwrap().fail_logout {
            Err(Error::Connection {
                operation: "disconnect",
                cause: "broken pipe".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
struct FakeConnect(Shared);

impl Connect for FakeConnect {
    type Session = FakeSession;

    async fn connect(&self, config: &ConnectorConfig) -> Result<FakeSession> {
        let expected = self.0.lock().unwrap().password.clone();
        if config.password != expected {
            return Err(Error::Connection {
                operation: "connect",
                cause: "Server returned NO: [AUTHENTICATIONFAILED] Invalid credentials".into(),
            });
        }
        Ok(FakeSession {
            mailbox: Arc::clone(&self.0),
            selected: None,
        })
    }
}

fn message(id: u32, date: &str) -> Vec<u8> {
    format!(
        "From: sender{id}@example.com\r\n\
         To: me@example.com\r\n\
         Subject: message {id}\r\n\
         Date: {date}\r\n\
         \r\n\
         body {id}"
    )
    .into_bytes()
}

fn mailbox() -> Shared {
    let inbox = vec![
        (1, message(1, "Mon, 1 Jan 2024 09:00:00 +0000")),
        (2, message(2, "Tue, 2 Jan 2024 09:00:00 +0000")),
        (3, message(3, "Wed, 3 Jan 2024 09:00:00 +0000")),
    ];
    let broken = vec![
        (1, message(1, "Mon, 1 Jan 2024 09:00:00 +0000")),
        (2, message(2, "sometime last week")),
        (3, message(3, "Wed, 3 Jan 2024 09:00:00 +0000")),
    ];

    Arc::new(Mutex::new(Mailbox {
        password: "right".into(),
        folders: vec![
            r#"(\HasNoChildren) "/" "INBOX""#.into(),
            r#"(\HasChildren \Noselect) "/" "[Gmail]""#.into(),
            r#"(\HasNoChildren) "/" "[Gmail]/Sent Mail""#.into(),
        ],
        messages: HashMap::from([("INBOX".to_string(), inbox), ("Broken".to_string(), broken)]),
        ..Mailbox::default()
    }))
}

fn connector(mailbox: &Shared, password: &str) -> MailConnector<FakeConnect> {
    MailConnector::with_connector(
        ConnectorConfig::new("me@example.com", password),
        FakeConnect(Arc::clone(mailbox)),
    )
}

#[tokio::test]
async fn test_well_formed_folder_streams_every_message() {
    let mailbox = mailbox();
    let mut connector = connector(&mailbox, "right");
    connector.connect().await.unwrap();

    let mut stream = connector.select_and_stream("INBOX").unwrap();
    let mut records = Vec::new();
    while let Some(item) = stream.next().await {
        records.push(item.unwrap());
    }

    assert_eq!(records.len(), 3);
    let days: Vec<&str> = records.iter().map(|r| r.day.as_str()).collect();
    assert_eq!(days, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
    assert_eq!(records[0].sender, "sender1@example.com");
    assert_eq!(records[0].receiver, "me@example.com");
    assert_eq!(records[2].subject, "message 3");
    assert_eq!(records[2].message, "body 3");
}

#[tokio::test]
async fn test_malformed_date_ends_stream() {
    let mailbox = mailbox();
    let mut connector = connector(&mailbox, "right");
    connector.connect().await.unwrap();

    let mut stream = connector.select_and_stream("Broken").unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.subject, "message 1");

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        Error::Decode {
            id: 2,
            source: DecodeError::MalformedDate(_)
        }
    ));
    assert!(stream.next().await.is_none());
    drop(stream);

    let log = mailbox.lock().unwrap().log.clone();
    assert!(!log.contains(&"fetch 3".to_string()));
}

#[tokio::test]
async fn test_skip_invalid_policy_reaches_the_end() {
    let mailbox = mailbox();
    let mut connector = MailConnector::with_connector(
        ConnectorConfig::builder("me@example.com", "right")
            .policy(ScanPolicy::SkipInvalid)
            .build(),
        FakeConnect(Arc::clone(&mailbox)),
    );
    connector.connect().await.unwrap();

    let mut stream = connector.select_and_stream("Broken").unwrap();
    let mut subjects = Vec::new();
    let mut failed = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(record) => subjects.push(record.subject),
            Err(Error::Decode { id, .. }) => failed.push(id),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(subjects, vec!["message 1", "message 3"]);
    assert_eq!(failed, vec![2]);
}

#[tokio::test]
async fn test_wrong_credential_then_disconnect() {
    let mailbox = mailbox();
    let mut connector = connector(&mailbox, "wrong");

    let result = connector.connect().await;
    let status = ConnectionStatus::from(&result);
    assert!(!status.status);
    assert!(status.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(!connector.is_connected());

    connector.disconnect().await;
    assert!(!connector.is_connected());
    assert!(matches!(
        connector.check_connection().await,
        Err(Error::NotConnected {
            operation: "check_connection"
        })
    ));
}

#[tokio::test]
async fn test_get_columns_ignores_table_name() {
    let mailbox = mailbox();
    let connector = connector(&mailbox, "right");

    for table in ["anything", "INBOX", ""] {
        let names: Vec<String> = connector
            .get_columns(table)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, COLUMN_NAMES);
    }
}

#[tokio::test]
async fn test_list_tables_in_server_order() {
    let mailbox = mailbox();
    let mut connector = connector(&mailbox, "right");
    connector.connect().await.unwrap();

    assert_eq!(
        connector.list_tables().await.unwrap(),
        vec!["INBOX", "[Gmail]", "[Gmail]/Sent Mail"]
    );
}

#[tokio::test]
async fn test_list_tables_fails_on_malformed_descriptor() {
    let mailbox = mailbox();
    mailbox
        .lock()
        .unwrap()
        .folders
        .push(r#"(\HasNoChildren) "." "Other""#.into());
    let mut connector = connector(&mailbox, "right");
    connector.connect().await.unwrap();

    assert!(matches!(
        connector.list_tables().await,
        Err(Error::ProtocolParse(_))
    ));
}

#[tokio::test]
async fn test_unknown_folder_yields_single_error() {
    let mailbox = mailbox();
    let mut connector = connector(&mailbox, "right");
    connector.connect().await.unwrap();

    let mut stream = connector.select_and_stream("Nope").unwrap();
    assert!(matches!(
        stream.next().await,
        Some(Err(Error::Protocol { operation: "select", .. }))
    ));
    assert!(stream.next().await.is_none());
    drop(stream);

    assert!(connector.check_connection().await.is_ok());
}

#[tokio::test]
async fn test_disconnect_swallows_logout_failure() {
    let mailbox = mailbox();
    mailbox.lock().unwrap().fail_logout = true;
    let mut connector = connector(&mailbox, "right");
    connector.connect().await.unwrap();

    connector.disconnect().await;
    assert!(!connector.is_connected());
    assert!(mailbox.lock().unwrap().log.contains(&"logout".to_string()));
}

#[tokio::test]
async fn test_operations_require_connection() {
    let mailbox = mailbox();
    let mut connector = connector(&mailbox, "right");

    assert!(matches!(
        connector.list_tables().await,
        Err(Error::NotConnected { .. })
    ));
    assert!(matches!(
        connector.select_and_stream("INBOX"),
        Err(Error::NotConnected { .. })
    ));
}

#[tokio::test]
async fn test_invalid_config_fails_before_connecting() {
    let mailbox = mailbox();
    let mut connector = connector(&mailbox, "");

    let err = connector.connect().await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(mailbox.lock().unwrap().log.is_empty());
}

#[tokio::test]
async fn test_reconnect_replaces_session() {
    let mailbox = mailbox();
    let mut connector = connector(&mailbox, "right");
    connector.connect().await.unwrap();
    connector.connect().await.unwrap();

    assert!(connector.is_connected());
    assert_eq!(mailbox.lock().unwrap().log, vec!["logout"]);
}
