//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap. Keeps argument parsing separate
//! from execution logic.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// FriendBot stack operations CLI
#[derive(Parser)]
#[command(name = "friendbotctl")]
#[command(about = "Deploy and operate the FriendBot stack", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./deploy.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Deploy the full stack: containers, readiness, dashboard resources
    Deploy,

    /// Probe every service once and report current health
    Status {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Database backup operations
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },

    /// Replace the database from a backup artifact (destructive)
    Restore {
        /// Pre-select an artifact by its timestamp id
        #[arg(long)]
        backup: Option<String>,

        /// Supply the confirmation token non-interactively
        #[arg(long)]
        yes: bool,
    },
}

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Dump the database to a new verified artifact
    Create,

    /// List artifacts, newest first
    List,
}
