//! Command-line arguments.

use clap::{Parser, Subcommand};

use mailtable_core::{ConnectorConfig, HeaderDecoding, ScanPolicy};

/// Read a mailbox as tables of message records.
///
/// Credentials come from `MAILTABLE_EMAIL` and `MAILTABLE_PASSWORD`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// IMAP host (overrides `MAILTABLE_HOST`).
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// IMAP port (overrides `MAILTABLE_PORT`).
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Report undecodable messages and keep scanning.
    #[arg(long, global = true)]
    pub skip_invalid: bool,

    /// Decode every encoded-word of a header, not only the first.
    #[arg(long, global = true)]
    pub full_headers: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Check that the account can log in.
    Check,
    /// List folders, one per line.
    Tables,
    /// Print the column schema as JSON.
    Columns {
        /// Table name. Every table has the same columns.
        table: Option<String>,
    },
    /// Print a folder's records as JSON lines.
    Scan {
        /// Folder to scan, e.g. `INBOX` or `[Gmail]/Sent Mail`.
        folder: String,

        /// Stop after this many records.
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl Cli {
    /// Returns true if the command talks to the server.
    #[must_use]
    pub const fn needs_connection(&self) -> bool {
        !matches!(self.command, Command::Columns { .. })
    }

    /// Applies command-line overrides on top of a base configuration.
    #[must_use]
    pub fn apply(&self, mut config: ConnectorConfig) -> ConnectorConfig {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.skip_invalid {
            config.policy = ScanPolicy::SkipInvalid;
        }
        if self.full_headers {
            config.header_decoding = HeaderDecoding::Full;
        }
        config
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
    fn test_parse_scan() {
        let cli = Cli::try_parse_from(["mailtable", "scan", "[Gmail]/Sent Mail", "--limit", "10"])
            .unwrap();
        assert_eq!(
            cli.command,
            Command::Scan {
                folder: "[Gmail]/Sent Mail".into(),
                limit: Some(10),
            }
        );
        assert!(cli.needs_connection());
    }

    #[test]
    fn test_parse_columns_without_table() {
        let cli = Cli::try_parse_from(["mailtable", "columns"]).unwrap();
        assert_eq!(cli.command, Command::Columns { table: None });
        assert!(!cli.needs_connection());
    }

    #[test]
    fn test_scan_requires_folder() {
        assert!(Cli::try_parse_from(["mailtable", "scan"]).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::try_parse_from([
            "mailtable",
            "tables",
            "--host",
            "localhost",
            "--port",
            "1143",
            "--skip-invalid",
            "--full-headers",
        ])
        .unwrap();

        let config = cli.apply(ConnectorConfig::new("me@example.com", "pw"));
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 1143);
        assert_eq!(config.policy, ScanPolicy::SkipInvalid);
        assert_eq!(config.header_decoding, HeaderDecoding::Full);
    }

    #[test]
    fn test_apply_keeps_defaults() {
        let cli = Cli::try_parse_from(["mailtable", "check"]).unwrap();
        let config = cli.apply(ConnectorConfig::new("me@example.com", "pw"));
        assert_eq!(config, ConnectorConfig::new("me@example.com", "pw"));
    }
}
