//! CLI definitions and command implementations.

pub mod commands;

use clap::{Parser, Subcommand};

/// docrev - Archive the revision history of Google Docs as plain text
#[derive(Parser)]
#[command(name = "docrev")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the full revision history of each configured document
    Revisions {
        /// Seconds to wait for OAuth browser authorization
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },

    /// Save the current content of each configured document
    Export {
        /// Seconds to wait for OAuth browser authorization
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },

    /// Authenticate with Google Drive without downloading anything
    Auth {
        /// Seconds to wait for OAuth browser authorization
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },

    /// Show credential state and per-document archive counts
    Status,
}
