//! CLI module for AgentForge
//!
//! Command-line interface parsing for the agentforge-server binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AgentForge - workflow configuration reconciliation server
///
/// Applies declarative YAML workflow configurations to the persisted agents,
/// tools and datasources of an API user.
#[derive(Parser, Debug)]
#[command(
    name = "agentforge-server",
    version,
    about = "AgentForge - workflow configuration reconciliation server",
    after_help = "EXAMPLES:\n    \
                  agentforge-server                          # Start the server (reads agentforge.toml)\n    \
                  agentforge-server --config my.toml serve   # Use a custom config file\n    \
                  agentforge-server token --user api-user-1  # Mint a bearer token"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "agentforge.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server
    Serve,

    /// Issue a bearer token for an API user
    Token {
        /// API user id placed in the token subject
        #[arg(short, long)]
        user: String,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn subcommand(&self) -> &Commands {
        static SERVE: Commands = Commands::Serve;
        self.command.as_ref().unwrap_or(&SERVE)
    }
}
