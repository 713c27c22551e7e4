//! CLI - command-line argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Rampart backup manager
#[derive(Parser)]
#[command(name = "rampartd")]
#[command(about = "Rampart - backup status monitor and launcher", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Settings file (defaults to ~/.backup_manager_config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand (if not provided, runs the monitor)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Monitor status and stream the event log until interrupted
    Watch,

    /// Probe once and print the status board
    Status {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Run the backup script now
    Backup,

    /// Mount remote storage
    Mount,

    /// Check remote storage connectivity
    TestConnection,

    /// Change the local backup directory
    SetPath {
        /// Existing directory
        dir: PathBuf,
    },

    /// Print or change settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings (default)
    Show,

    /// Change one setting, e.g. `config set refresh_interval 60`
    Set {
        /// Setting name
        key: String,
        /// New value; commands are split on whitespace
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}
