//! docrev - Archive the revision history of Google Docs as plain text.
//!
//! Workflow: authenticate once against the Drive API, list a document's
//! revisions, fetch each revision's plain-text export, and write it under a
//! timestamped filename. Individual revision failures are skipped so the
//! batch keeps going; re-running picks them up (filenames are recomputed
//! identically).

mod archive;
mod auth;
mod cli;
mod config;
mod drive;
mod error;
mod utils;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("docrev={}", log_level).parse().unwrap()),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Revisions { timeout } => cli::commands::revisions(timeout),
        Commands::Export { timeout } => cli::commands::export(timeout),
        Commands::Auth { timeout } => cli::commands::auth_only(timeout),
        Commands::Status => cli::commands::status(),
    }
}
