//! IMAP response parsing.
//!
//! Parses one complete server response, as returned by
//! [`FramedStream::read_response`](crate::FramedStream::read_response), with
//! any literals still inline. Only the responses a mailbox scan acts on are
//! decoded; everything else is kept as [`UntaggedResponse::Other`].

use crate::{Error, Result};

/// Response condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed.
    Ok,
    /// Command failed.
    No,
    /// Command unknown or malformed.
    Bad,
    /// Server is closing the connection.
    Bye,
    /// Connection is already authenticated.
    PreAuth,
}

impl Status {
    fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "BYE" => Some(Self::Bye),
            "PREAUTH" => Some(Self::PreAuth),
            _ => None,
        }
    }

    /// Returns true for `OK` and `PREAUTH`.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// One mailbox from a LIST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Mailbox attributes, e.g. `\HasNoChildren`.
    pub attributes: Vec<String>,
    /// Hierarchy delimiter, `None` for `NIL`.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub name: String,
    /// The descriptor text after `LIST `, for example
    /// `(\HasNoChildren) "/" "INBOX"`. A name sent as a literal appears in
    /// quoted form.
    pub descriptor: String,
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK`, `* NO`, `* BAD`, `* BYE` or `* PREAUTH`.
    Status {
        /// Condition.
        status: Status,
        /// Human-readable text, including any response code.
        text: String,
    },
    /// `* SEARCH` results.
    Search(Vec<u32>),
    /// `* LIST` entry.
    List(ListEntry),
    /// `* n EXISTS`.
    Exists(u32),
    /// `* n FETCH (...)`.
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// Full message bytes if the response carried `RFC822` or `BODY[]`.
        message: Option<Vec<u8>>,
    },
    /// Anything else, as text.
    Other(String),
}

/// Server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged completion.
    Tagged {
        /// Command tag.
        tag: String,
        /// Condition.
        status: Status,
        /// Human-readable text, including any response code.
        text: String,
    },
    /// Untagged data.
    Untagged(UntaggedResponse),
    /// Command continuation request (`+`).
    Continuation(String),
}

/// Response parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the response is malformed.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut cursor = Cursor::new(input);

        match cursor.peek() {
            Some(b'+') => {
                cursor.advance(1);
                Ok(Response::Continuation(cursor.rest_of_line()))
            }
            Some(b'*') => {
                cursor.advance(1);
                cursor.expect(b' ')?;
                parse_untagged(&mut cursor).map(Response::Untagged)
            }
            Some(_) => parse_tagged(&mut cursor),
            None => Err(cursor.error("empty response")),
        }
    }
}

fn parse_tagged(cursor: &mut Cursor<'_>) -> Result<Response> {
    let tag = String::from_utf8_lossy(cursor.atom()?).into_owned();
    cursor.expect(b' ')?;
    let keyword = cursor.keyword()?;
    let status = Status::parse(&keyword)
        .ok_or_else(|| cursor.error(format!("unknown status {keyword:?}")))?;
    let text = cursor.rest_of_line();

    Ok(Response::Tagged { tag, status, text })
}

fn parse_untagged(cursor: &mut Cursor<'_>) -> Result<UntaggedResponse> {
    if cursor.peek().is_some_and(|b| b.is_ascii_digit()) {
        let n = cursor.number()?;
        cursor.expect(b' ')?;
        let keyword = cursor.keyword()?;
        return match keyword.as_str() {
            "EXISTS" => Ok(UntaggedResponse::Exists(n)),
            "FETCH" => {
                cursor.expect(b' ')?;
                parse_fetch(cursor, n)
            }
            _ => Ok(UntaggedResponse::Other(format!(
                "{n} {keyword}{}",
                cursor.rest_of_line_with_space()
            ))),
        };
    }

    let keyword = cursor.keyword()?;
    if let Some(status) = Status::parse(&keyword) {
        return Ok(UntaggedResponse::Status {
            status,
            text: cursor.rest_of_line(),
        });
    }

    match keyword.as_str() {
        "SEARCH" => parse_search(cursor),
        "LIST" => {
            cursor.expect(b' ')?;
            parse_list(cursor)
        }
        _ => Ok(UntaggedResponse::Other(format!(
            "{keyword}{}",
            cursor.rest_of_line_with_space()
        ))),
    }
}

fn parse_search(cursor: &mut Cursor<'_>) -> Result<UntaggedResponse> {
    let mut ids = Vec::new();
    loop {
        cursor.skip_spaces();
        if !cursor.peek().is_some_and(|b| b.is_ascii_digit()) {
            break;
        }
        ids.push(cursor.number()?);
    }
    Ok(UntaggedResponse::Search(ids))
}

fn parse_list(cursor: &mut Cursor<'_>) -> Result<UntaggedResponse> {
    let flags_start = cursor.pos;
    cursor.expect(b'(')?;
    let mut attributes = Vec::new();
    loop {
        cursor.skip_spaces();
        match cursor.peek() {
            Some(b')') => {
                cursor.advance(1);
                break;
            }
            Some(_) => attributes.push(String::from_utf8_lossy(cursor.atom()?).into_owned()),
            None => return Err(cursor.error("unterminated LIST attributes")),
        }
    }
    let flags_raw = cursor.slice_from(flags_start);
    cursor.expect(b' ')?;

    let delimiter_start = cursor.pos;
    let delimiter = cursor
        .nstring()?
        .and_then(|d| String::from_utf8_lossy(&d).chars().next());
    let delimiter_raw = cursor.slice_from(delimiter_start);
    cursor.expect(b' ')?;

    let (name, name_raw) = match cursor.peek() {
        Some(b'{') => {
            let name = String::from_utf8_lossy(cursor.literal()?).into_owned();
            let quoted = quote(&name);
            (name, quoted)
        }
        Some(b'"') => {
            let start = cursor.pos;
            let name = String::from_utf8_lossy(&cursor.quoted()?).into_owned();
            (name, cursor.slice_from(start))
        }
        _ => {
            let atom = String::from_utf8_lossy(cursor.atom()?).into_owned();
            (atom.clone(), atom)
        }
    };

    Ok(UntaggedResponse::List(ListEntry {
        attributes,
        delimiter,
        name,
        descriptor: format!("{flags_raw} {delimiter_raw} {name_raw}"),
    }))
}

fn parse_fetch(cursor: &mut Cursor<'_>, seq: u32) -> Result<UntaggedResponse> {
    cursor.expect(b'(')?;
    let mut message = None;

    loop {
        cursor.skip_spaces();
        match cursor.peek() {
            Some(b')') => {
                cursor.advance(1);
                break;
            }
            None => return Err(cursor.error("unterminated FETCH response")),
            Some(_) => {}
        }

        let name = cursor.fetch_item_name()?.to_ascii_uppercase();
        cursor.expect(b' ')?;

        if is_full_message(&name) {
            message = cursor.nstring()?;
        } else {
            cursor.skip_value()?;
        }
    }

    Ok(UntaggedResponse::Fetch { seq, message })
}

/// Returns true for data items that carry the whole message.
fn is_full_message(name: &str) -> bool {
    name == "RFC822" || name == "BODY[]" || name.starts_with("BODY[]<")
}

/// Formats a string as an IMAP quoted string.
fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Byte cursor over one response.
struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.advance(1);
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", char::from(byte))))
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.advance(1);
        }
    }

    fn slice_from(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Reads a non-empty run of atom characters.
    fn atom(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b' ' | b'(' | b')' | b'"' | b'{' | b'\r' | b'\n') {
                break;
            }
            self.advance(1);
        }
        if self.pos == start {
            return Err(self.error("expected atom"));
        }
        Ok(&self.input[start..self.pos])
    }

    /// Reads an atom and uppercases it.
    fn keyword(&mut self) -> Result<String> {
        self.atom()
            .map(|atom| String::from_utf8_lossy(atom).to_ascii_uppercase())
    }

    fn number(&mut self) -> Result<u32> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(b) = self.peek().filter(u8::is_ascii_digit) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u32::from(b - b'0')))
                .ok_or_else(|| self.error("number too large"))?;
            self.advance(1);
        }
        if self.pos == start {
            return Err(self.error("expected number"));
        }
        Ok(value)
    }

    fn quoted(&mut self) -> Result<Vec<u8>> {
        self.expect(b'"')?;
        let mut value = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.advance(1);
                    return Ok(value);
                }
                Some(b'\\') => {
                    self.advance(1);
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.error("unterminated quoted string"))?;
                    value.push(escaped);
                    self.advance(1);
                }
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("unterminated quoted string"));
                }
                Some(b) => {
                    value.push(b);
                    self.advance(1);
                }
            }
        }
    }

    /// Reads `{n}` or `{n+}`, CRLF, and the `n` bytes that follow.
    fn literal(&mut self) -> Result<&'a [u8]> {
        self.expect(b'{')?;
        let len = usize::try_from(self.number()?)
            .map_err(|_| self.error("literal length out of range"))?;
        if self.peek() == Some(b'+') {
            self.advance(1);
        }
        self.expect(b'}')?;
        self.expect(b'\r')?;
        self.expect(b'\n')?;

        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("literal exceeds response"))?;
        self.pos = end;
        Ok(&self.input[start..end])
    }

    /// Reads a quoted string, a literal or `NIL`.
    fn nstring(&mut self) -> Result<Option<Vec<u8>>> {
        match self.peek() {
            Some(b'"') => self.quoted().map(Some),
            Some(b'{') => self.literal().map(|bytes| Some(bytes.to_vec())),
            _ => {
                let atom = self.atom()?;
                if atom.eq_ignore_ascii_case(b"NIL") {
                    Ok(None)
                } else {
                    Err(self.error("expected string or NIL"))
                }
            }
        }
    }

    /// Reads a FETCH data item name such as `RFC822` or
    /// `BODY[HEADER.FIELDS (FROM)]<0>`.
    fn fetch_item_name(&mut self) -> Result<String> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b' ' | b'(' | b')' if depth == 0 => break,
                b'\r' | b'\n' => break,
                _ => {}
            }
            self.advance(1);
        }
        if self.pos == start {
            return Err(self.error("expected FETCH item name"));
        }
        Ok(self.slice_from(start))
    }

    /// Skips one value: a parenthesized list, string, literal or atom.
    fn skip_value(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'(') => {
                self.advance(1);
                loop {
                    self.skip_spaces();
                    match self.peek() {
                        Some(b')') => {
                            self.advance(1);
                            return Ok(());
                        }
                        Some(_) => self.skip_value()?,
                        None => return Err(self.error("unterminated list")),
                    }
                }
            }
            Some(b'"') => self.quoted().map(drop),
            Some(b'{') => self.literal().map(drop),
            Some(_) => self.atom().map(drop),
            None => Err(self.error("expected value")),
        }
    }

    /// Returns the remaining text of the line after one separating space.
    fn rest_of_line(&mut self) -> String {
        if self.peek() == Some(b' ') {
            self.advance(1);
        }
        let rest = &self.input[self.pos..];
        let rest = rest.strip_suffix(b"\n").unwrap_or(rest);
        let rest = rest.strip_suffix(b"\r").unwrap_or(rest);
        self.pos = self.input.len();
        String::from_utf8_lossy(rest).into_owned()
    }

    /// Like [`Self::rest_of_line`], keeping the leading space if any text
    /// remains.
    fn rest_of_line_with_space(&mut self) -> String {
        let rest = self.rest_of_line();
        if rest.is_empty() {
            rest
        } else {
            format!(" {rest}")
        }
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
    use super::*;

    #[test]
    fn test_tagged_ok() {
        let response = ResponseParser::parse(b"A0001 OK LOGIN completed\r\n").unwrap();
        assert_eq!(
            response,
            Response::Tagged {
                tag: "A0001".to_string(),
                status: Status::Ok,
                text: "LOGIN completed".to_string(),
            }
        );
    }

    #[test]
    fn test_tagged_no_with_code() {
        let response =
            ResponseParser::parse(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
                .unwrap();
        match response {
            Response::Tagged { status, text, .. } => {
                assert_eq!(status, Status::No);
                assert_eq!(text, "[AUTHENTICATIONFAILED] Invalid credentials");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tagged_unknown_status() {
        assert!(matches!(
            ResponseParser::parse(b"A0001 MAYBE later\r\n"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_untagged_status() {
        let response = ResponseParser::parse(b"* BYE Logging out\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                text: "Logging out".to_string(),
            })
        );
    }

    #[test]
    fn test_continuation() {
        let response = ResponseParser::parse(b"+ Ready\r\n").unwrap();
        assert_eq!(response, Response::Continuation("Ready".to_string()));
    }

    #[test]
    fn test_search() {
        let response = ResponseParser::parse(b"* SEARCH 1 2 3 10\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Search(vec![1, 2, 3, 10]))
        );

        let response = ResponseParser::parse(b"* SEARCH\r\n").unwrap();
        assert_eq!(response, Response::Untagged(UntaggedResponse::Search(vec![])));
    }

    #[test]
    fn test_exists_and_other() {
        assert_eq!(
            ResponseParser::parse(b"* 23 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(23))
        );
        assert_eq!(
            ResponseParser::parse(b"* 0 RECENT\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Other("0 RECENT".to_string()))
        );
        assert_eq!(
            ResponseParser::parse(b"* FLAGS (\\Seen \\Deleted)\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Other("FLAGS (\\Seen \\Deleted)".to_string()))
        );
    }

    #[test]
    fn test_list_quoted() {
        let response = ResponseParser::parse(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::List(entry)) = response else {
            panic!("expected LIST");
        };
        assert_eq!(entry.attributes, vec!["\\HasNoChildren"]);
        assert_eq!(entry.delimiter, Some('/'));
        assert_eq!(entry.name, "INBOX");
        assert_eq!(entry.descriptor, "(\\HasNoChildren) \"/\" \"INBOX\"");
    }

    #[test]
    fn test_list_gmail_folder() {
        let response = ResponseParser::parse(
            b"* LIST (\\All \\HasNoChildren) \"/\" \"[Gmail]/All Mail\"\r\n",
        )
        .unwrap();
        let Response::Untagged(UntaggedResponse::List(entry)) = response else {
            panic!("expected LIST");
        };
        assert_eq!(entry.name, "[Gmail]/All Mail");
        assert_eq!(
            entry.descriptor,
            "(\\All \\HasNoChildren) \"/\" \"[Gmail]/All Mail\""
        );
    }

    #[test]
    fn test_list_literal_name_normalized() {
        let response = ResponseParser::parse(b"* LIST () \"/\" {8}\r\nMy \"Box\"\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::List(entry)) = response else {
            panic!("expected LIST");
        };
        assert_eq!(entry.name, "My \"Box\"");
        assert_eq!(entry.descriptor, "() \"/\" \"My \\\"Box\\\"\"");
    }

    #[test]
    fn test_list_atom_name_and_nil_delimiter() {
        let response = ResponseParser::parse(b"* LIST (\\Noselect) NIL INBOX\r\n").unwrap();
        let Response::Untagged(UntaggedResponse::List(entry)) = response else {
            panic!("expected LIST");
        };
        assert_eq!(entry.delimiter, None);
        assert_eq!(entry.name, "INBOX");
        assert_eq!(entry.descriptor, "(\\Noselect) NIL INBOX");
    }

    #[test]
    fn test_fetch_rfc822_literal() {
        let response = ResponseParser::parse(b"* 1 FETCH (RFC822 {5}\r\nhello)\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Fetch {
                seq: 1,
                message: Some(b"hello".to_vec()),
            })
        );
    }

    #[test]
    fn test_fetch_with_other_items() {
        let response = ResponseParser::parse(
            b"* 7 FETCH (UID 42 FLAGS (\\Seen) BODY[] {3}\r\nabc INTERNALDATE \"01-Jan-2024 00:00:00 +0000\")\r\n",
        )
        .unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Fetch {
                seq: 7,
                message: Some(b"abc".to_vec()),
            })
        );
    }

    #[test]
    fn test_fetch_literal_containing_parens() {
        let response =
            ResponseParser::parse(b"* 2 FETCH (RFC822 {9}\r\n(a) \")\" b)\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Fetch {
                seq: 2,
                message: Some(b"(a) \")\" b".to_vec()),
            })
        );
    }

    #[test]
    fn test_fetch_without_message() {
        let response = ResponseParser::parse(b"* 3 FETCH (FLAGS (\\Seen))\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Fetch {
                seq: 3,
                message: None,
            })
        );
    }

    #[test]
    fn test_fetch_truncated_literal() {
        assert!(ResponseParser::parse(b"* 1 FETCH (RFC822 {50}\r\nshort)\r\n").is_err());
    }

    #[test]
    fn test_empty_response() {
        assert!(ResponseParser::parse(b"").is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
                let _ = ResponseParser::parse(&bytes);
            }

            #[test]
            fn search_ids_roundtrip(ids in proptest::collection::vec(1u32..100_000, 0..50)) {
                let mut line = String::from("* SEARCH");
                for id in &ids {
                    line.push_str(&format!(" {id}"));
                }
                line.push_str("\r\n");

                let response = ResponseParser::parse(line.as_bytes()).unwrap();
                prop_assert_eq!(response, Response::Untagged(UntaggedResponse::Search(ids)));
            }

            #[test]
            fn literal_message_is_preserved(body in proptest::collection::vec(any::<u8>(), 0..512)) {
                let mut raw = format!("* 9 FETCH (RFC822 {{{}}}\r\n", body.len()).into_bytes();
                raw.extend_from_slice(&body);
                raw.extend_from_slice(b")\r\n");

                let response = ResponseParser::parse(&raw).unwrap();
                prop_assert_eq!(
                    response,
                    Response::Untagged(UntaggedResponse::Fetch { seq: 9, message: Some(body) })
                );
            }
        }
    }
}
