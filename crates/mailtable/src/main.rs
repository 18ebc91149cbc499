//! `mailtable` - read a mailbox as tables of message records.
//!
//! Folders are tables; `scan` prints one JSON object per message with the
//! columns `sender`, `receiver`, `day`, `subject` and `message`. Logs go to
//! stderr so stdout stays machine-readable.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailtable_core::{ConnectionStatus, ConnectorConfig, Error, MailConnector, columns};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailtable=info,mailtable_core=info,mailtable_imap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    if !cli.needs_connection() {
        return print_json_line(&columns());
    }

    let config = cli.apply(ConnectorConfig::from_env().context("reading configuration")?);
    let mut connector = MailConnector::new(config);

    let result = connector.connect().await;
    if let Command::Check = cli.command {
        let status = ConnectionStatus::from(&result);
        connector.disconnect().await;
        return print_json_line(&status);
    }
    result.context("connecting")?;

    let outcome = run(&mut connector, &cli.command).await;
    connector.disconnect().await;
    outcome
}

async fn run(connector: &mut MailConnector, command: &Command) -> Result<()> {
    match command {
        Command::Tables => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for table in connector.list_tables().await? {
                writeln!(out, "{table}")?;
            }
            Ok(())
        }
        Command::Scan { folder, limit } => scan(connector, folder, *limit).await,
        Command::Check | Command::Columns { .. } => Ok(()),
    }
}

async fn scan(connector: &mut MailConnector, folder: &str, limit: Option<usize>) -> Result<()> {
    let mut stream = connector.select_and_stream(folder)?;
    let mut out = BufWriter::new(io::stdout().lock());
    let mut written = 0usize;
    let mut skipped = 0usize;

    while limit.is_none_or(|max| written < max) {
        let Some(item) = stream.next().await else {
            break;
        };
        match item {
            Ok(record) => {
                serde_json::to_writer(&mut out, &record)?;
                out.write_all(b"\n")?;
                written += 1;
            }
            Err(e @ Error::Decode { .. }) if !stream.state().is_finished() => {
                warn!(error = %e, "message skipped");
                skipped += 1;
            }
            Err(e) => {
                out.flush()?;
                return Err(e).with_context(|| format!("scanning {folder}"));
            }
        }
    }

    out.flush()?;
    info!(folder, written, skipped, "scan finished");
    Ok(())
}

fn print_json_line<T: serde::Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
