//! CLI definition and command handling

pub mod keystore;
pub mod progress;
pub mod sign;

use clap::{Parser, Subcommand};

use keystore::KeystoreCommand;
use sign::SignCommand;

/// Countersign - Code-signing automation CLI
#[derive(Debug, Parser)]
#[command(name = "countersign")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign the artifacts under a path
    Sign(SignCommand),

    /// Credential store management for the embedded backend
    Keystore(KeystoreCommand),
}

impl Cli {
    /// Execute the CLI command, returning the process exit code.
    pub fn execute(self) -> anyhow::Result<i32> {
        match self.command {
            Commands::Sign(ref cmd) => cmd.execute(),
            Commands::Keystore(ref cmd) => cmd.execute(),
        }
    }
}
