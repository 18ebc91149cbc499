//! Folder descriptor parsing.

use crate::{Error, Result};

/// Separator between the attribute list and the folder name.
const SEPARATOR: &str = " \"/\" ";

/// Extracts the folder name from a LIST descriptor.
///
/// The descriptor is split on the first ` "/" ` token; the remainder is the
/// name with surrounding quotes removed and quoted-string escapes undone.
///
/// ```
/// use mailtable_core::parse_folder_descriptor;
///
/// let name = parse_folder_descriptor(r#"(\HasNoChildren) "/" "[Gmail]/Sent Mail""#).unwrap();
/// assert_eq!(name, "[Gmail]/Sent Mail");
/// ```
///
/// # Errors
///
/// Returns [`Error::ProtocolParse`] if the separator is missing or the name
/// is empty.
pub fn parse_folder_descriptor(descriptor: &str) -> Result<String> {
    let (_, raw_name) = descriptor
        .split_once(SEPARATOR)
        .ok_or_else(|| Error::ProtocolParse(format!("malformed folder descriptor: {descriptor}")))?;

    let raw_name = raw_name.trim();
    let name = match raw_name
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(quoted) => unescape(quoted),
        None => raw_name.to_string(),
    };

    if name.is_empty() {
        return Err(Error::ProtocolParse(format!(
            "empty folder name in descriptor: {descriptor}"
        )));
    }
    Ok(name)
}

/// Parses every descriptor, failing on the first malformed one.
///
/// # Errors
///
/// Returns [`Error::ProtocolParse`] for the first malformed descriptor.
pub fn parse_folder_list<I, D>(descriptors: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = D>,
    D: AsRef<str>,
{
    descriptors
        .into_iter()
        .map(|d| parse_folder_descriptor(d.as_ref()))
        .collect()
}

fn unescape(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
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
    fn test_parse_descriptors() {
        let cases = [
            (r#"(\HasNoChildren) "/" "INBOX""#, "INBOX"),
            (r#"(\HasChildren \Noselect) "/" "[Gmail]""#, "[Gmail]"),
            (r#"(\All \HasNoChildren) "/" "[Gmail]/All Mail""#, "[Gmail]/All Mail"),
            (r#"() "/" Archive"#, "Archive"),
            (r#"(\HasNoChildren) "/" "Say \"hi\"""#, r#"Say "hi""#),
            (r#"(\HasNoChildren) "/" "Work/2024/Q1""#, "Work/2024/Q1"),
        ];

        for (descriptor, expected) in cases {
            assert_eq!(
                parse_folder_descriptor(descriptor).unwrap(),
                expected,
                "descriptor: {descriptor}"
            );
        }
    }

    #[test]
    fn test_parse_malformed() {
        for descriptor in [
            r#"(\HasNoChildren) "." "INBOX""#,
            r#"(\Noselect) NIL """#,
            "garbage",
            r#"(\HasNoChildren) "/" """#,
        ] {
            assert!(
                matches!(parse_folder_descriptor(descriptor), Err(Error::ProtocolParse(_))),
                "descriptor: {descriptor}"
            );
        }
    }

    #[test]
    fn test_parse_list_preserves_order() {
        let names = parse_folder_list([
            r#"(\HasNoChildren) "/" "Zeta""#,
            r#"(\HasNoChildren) "/" "INBOX""#,
            r#"(\HasNoChildren) "/" "Alpha""#,
        ])
        .unwrap();
        assert_eq!(names, vec!["Zeta", "INBOX", "Alpha"]);
    }

    #[test]
    fn test_parse_list_fails_fast() {
        let result = parse_folder_list([r#"(\HasNoChildren) "/" "INBOX""#, "broken"]);
        assert!(matches!(result, Err(Error::ProtocolParse(msg)) if msg.contains("broken")));
    }
}
