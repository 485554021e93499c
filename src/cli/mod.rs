//! Command-line entry points.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Microblog - a small federated-login microblogging service
#[derive(Parser)]
#[command(name = "microblog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the default search path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the web server (default)
    Serve,

    /// Apply database migrations and exit
    Migrate,

    /// Validate the configuration and print it
    CheckConfig,
}

impl Cli {
    #[must_use]
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Serve)
    }

    pub fn load_config(&self) -> anyhow::Result<crate::Config> {
        match &self.config {
            Some(path) => crate::Config::load_from_path(path),
            None => crate::Config::load(),
        }
    }
}
