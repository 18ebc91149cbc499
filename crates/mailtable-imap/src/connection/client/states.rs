//! Type-state markers for IMAP client connection states.

/// Marker type for the not-authenticated state.
///
/// In this state only LOGIN and LOGOUT are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Marker type for the authenticated state.
///
/// In this state mailbox operations (LIST, SELECT) are valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// State for a selected mailbox.
///
/// Unlike the marker types this carries what the server reported when the
/// mailbox was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Creates a new selected state.
    #[must_use]
    pub fn new(mailbox: impl Into<String>, status: MailboxStatus) -> Self {
        Self {
            mailbox: mailbox.into(),
            status,
        }
    }

    /// Returns the name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Returns the mailbox status reported by SELECT.
    #[must_use]
    pub const fn status(&self) -> MailboxStatus {
        self.status
    }
}

/// Mailbox status from a SELECT response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Authenticated {}
    impl Sealed for super::Selected {}
}

/// States in which mailbox commands (LIST, SELECT) are valid.
pub trait Authorized: sealed::Sealed {}

impl Authorized for Authenticated {}
impl Authorized for Selected {}

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

    fn _assert_send<T: Send>() {}
    fn _assert_sync<T: Sync>() {}

    #[test]
    fn test_states_are_send_sync() {
        _assert_send::<NotAuthenticated>();
        _assert_sync::<NotAuthenticated>();
        _assert_send::<Authenticated>();
        _assert_sync::<Authenticated>();
        _assert_send::<Selected>();
        _assert_sync::<Selected>();
    }

    #[test]
    fn test_selected_accessors() {
        let selected = Selected::new("INBOX", MailboxStatus { exists: 3 });
        assert_eq!(selected.mailbox(), "INBOX");
        assert_eq!(selected.status().exists, 3);
    }
}
