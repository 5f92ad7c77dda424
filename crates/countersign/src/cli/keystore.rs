//! Credential store management

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use console::style;
use countersign_core::CredentialStore;
use tracing::info;

/// Credential store management for the embedded backend
#[derive(Debug, Args)]
pub struct KeystoreCommand {
    #[command(subcommand)]
    pub command: KeystoreCommands,
}

#[derive(Debug, Subcommand)]
pub enum KeystoreCommands {
    /// Create a new encrypted store with a generated signing key
    Init(InitCommand),

    /// Open an existing store and list the keys it holds
    List(ListCommand),
}

/// Create a new encrypted credential store
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Path of the store file to create
    #[arg(long)]
    pub store: PathBuf,

    /// Name of the generated key
    #[arg(long)]
    pub alias: String,

    /// Passphrase protecting the store
    #[arg(long)]
    pub store_password: String,

    /// Overwrite an existing store file
    #[arg(long)]
    pub force: bool,
}

/// List the keys in an encrypted credential store
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Path of the store file
    #[arg(long)]
    pub store: PathBuf,

    /// Passphrase protecting the store
    #[arg(long)]
    pub store_password: String,
}

impl KeystoreCommand {
    pub fn execute(&self) -> anyhow::Result<i32> {
        match &self.command {
            KeystoreCommands::Init(cmd) => cmd.execute(),
            KeystoreCommands::List(cmd) => cmd.execute(),
        }
    }
}

impl InitCommand {
    pub fn execute(&self) -> anyhow::Result<i32> {
        if self.store.exists() && !self.force {
            bail!(
                "store {} already exists (use --force to overwrite)",
                self.store.display()
            );
        }

        let mut store = CredentialStore::new();
        store.add_generated_key(&self.alias);
        store
            .save(&self.store, &self.store_password)
            .with_context(|| format!("cannot write store {}", self.store.display()))?;
        info!(store = %self.store.display(), alias = %self.alias, "credential store created");

        println!(
            "{} created {} with key '{}'",
            style("✓").green(),
            style(self.store.display()).bold(),
            self.alias
        );
        Ok(crate::exit_codes::SUCCESS)
    }
}

impl ListCommand {
    pub fn execute(&self) -> anyhow::Result<i32> {
        for alias in self.aliases()? {
            println!("{}", alias);
        }
        Ok(crate::exit_codes::SUCCESS)
    }

    /// Names of the keys in the store, in stored order.
    fn aliases(&self) -> anyhow::Result<Vec<String>> {
        let store = CredentialStore::open(&self.store, &self.store_password)
            .with_context(|| format!("cannot open store {}", self.store.display()))?;
        Ok(store.aliases().into_iter().map(str::to_string).collect())
    }
}
