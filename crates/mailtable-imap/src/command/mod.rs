//! IMAP command builder.
//!
//! This module provides the commands a read-only mailbox scan needs and
//! their wire serialization.

mod tag_generator;

use std::fmt;

pub use tag_generator::TagGenerator;

/// Message data item requested by FETCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAttribute {
    /// The complete message (`RFC822`).
    Rfc822,
    /// The complete message without setting `\Seen` (`BODY.PEEK[]`).
    BodyPeek,
}

impl FetchAttribute {
    /// Returns the attribute as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rfc822 => "RFC822",
            Self::BodyPeek => "BODY.PEEK[]",
        }
    }
}

/// IMAP command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern with wildcards.
        pattern: String,
    },
    /// SELECT command.
    Select {
        /// Mailbox name.
        mailbox: String,
    },
    /// SEARCH command with raw criteria such as `ALL`.
    Search {
        /// Search criteria.
        criteria: String,
    },
    /// FETCH command for a single message sequence number.
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// Requested data item.
        attribute: FetchAttribute,
    },
}

impl Command {
    /// Returns the command name, safe to log.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::List { .. } => "LIST",
            Self::Select { .. } => "SELECT",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
        }
    }

    /// Serializes the command with the given tag, including the final CRLF.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.name().as_bytes());

        match self {
            Self::Noop | Self::Logout => {}

            Self::Login { username, password } => {
                buf.push(b' ');
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }

            Self::List { reference, pattern } => {
                buf.push(b' ');
                write_astring(&mut buf, reference);
                buf.push(b' ');
                write_list_pattern(&mut buf, pattern);
            }

            Self::Select { mailbox } => {
                buf.push(b' ');
                write_astring(&mut buf, mailbox);
            }

            Self::Search { criteria } => {
                buf.push(b' ');
                buf.extend_from_slice(criteria.as_bytes());
            }

            Self::Fetch { seq, attribute } => {
                buf.push(b' ');
                buf.extend_from_slice(seq.to_string().as_bytes());
                buf.extend_from_slice(b" (");
                buf.extend_from_slice(attribute.as_str().as_bytes());
                buf.push(b')');
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::List { reference, pattern } => f
                .debug_struct("List")
                .field("reference", reference)
                .field("pattern", pattern)
                .finish(),
            Self::Select { mailbox } => f.debug_struct("Select").field("mailbox", mailbox).finish(),
            Self::Search { criteria } => {
                f.debug_struct("Search").field("criteria", criteria).finish()
            }
            Self::Fetch { seq, attribute } => f
                .debug_struct("Fetch")
                .field("seq", seq)
                .field("attribute", attribute)
                .finish(),
            Self::Noop | Self::Logout => f.write_str(self.name()),
        }
    }
}

/// Writes an astring (atom or quoted string).
fn write_astring(buf: &mut Vec<u8>, s: &str) {
    write_quoted_if(buf, s, needs_quoting);
}

/// Writes a LIST pattern, where `%` and `*` stay unquoted wildcards.
fn write_list_pattern(buf: &mut Vec<u8>, s: &str) {
    write_quoted_if(buf, s, |b| !matches!(b, b'%' | b'*') && needs_quoting(b));
}

fn write_quoted_if(buf: &mut Vec<u8>, s: &str, quote: impl Fn(u8) -> bool) {
    if s.is_empty() || s.bytes().any(quote) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Returns true if the byte cannot appear in an atom.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']')
        || b < 0x20
        || b == 0x7F
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
    fn test_simple_commands() {
        assert_eq!(Command::Noop.serialize("A0001"), b"A0001 NOOP\r\n");
        assert_eq!(Command::Logout.serialize("A0002"), b"A0002 LOGOUT\r\n");
    }

    #[test]
    fn test_login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pass word\"x".to_string(),
        };
        assert_eq!(
            cmd.serialize("A0000"),
            b"A0000 LOGIN user@example.com \"pass word\\\"x\"\r\n"
        );
    }

    #[test]
    fn test_list_keeps_wildcards() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(cmd.serialize("A0003"), b"A0003 LIST \"\" *\r\n");
    }

    #[test]
    fn test_select_quotes_spaces() {
        let cmd = Command::Select {
            mailbox: "[Gmail]/All Mail".to_string(),
        };
        assert_eq!(cmd.serialize("A0004"), b"A0004 SELECT \"[Gmail]/All Mail\"\r\n");

        let cmd = Command::Select {
            mailbox: "INBOX".to_string(),
        };
        assert_eq!(cmd.serialize("A0005"), b"A0005 SELECT INBOX\r\n");
    }

    #[test]
    fn test_search_and_fetch() {
        let cmd = Command::Search {
            criteria: "ALL".to_string(),
        };
        assert_eq!(cmd.serialize("A0006"), b"A0006 SEARCH ALL\r\n");

        let cmd = Command::Fetch {
            seq: 42,
            attribute: FetchAttribute::Rfc822,
        };
        assert_eq!(cmd.serialize("A0007"), b"A0007 FETCH 42 (RFC822)\r\n");

        let cmd = Command::Fetch {
            seq: 42,
            attribute: FetchAttribute::BodyPeek,
        };
        assert_eq!(cmd.serialize("A0008"), b"A0008 FETCH 42 (BODY.PEEK[])\r\n");
    }

    #[test]
    fn test_debug_redacts_password() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{cmd:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
