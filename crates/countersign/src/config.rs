//! Configuration file loading
//!
//! Settings can come from a TOML file, with command-line flags taking
//! precedence over file values and file values over built-in defaults.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "countersign.toml";

/// Optional settings read from the configuration file. Every field has a
/// command-line counterpart that overrides it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub sign_method: Option<String>,
    pub path_to_sign: Option<String>,
    pub java_home: Option<String>,
    pub jar_signer: Option<String>,
    pub key_store: Option<String>,
    pub store_password: Option<String>,
    pub alias: Option<String>,
    pub key_pass: Option<String>,
    pub proxy_host: Option<String>,
    pub proxy_port: Option<String>,
    pub time_stamp_host: Option<String>,
    pub use_timestamp: Option<bool>,
    pub program_name: Option<String>,
    pub program_url: Option<String>,
    pub debug_command: Option<bool>,
    pub debug_signature: Option<bool>,
    pub debug_directory_walk: Option<bool>,
}

/// Load a configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<FileConfig> {
    info!(path = %path.display(), "loading config");
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("cannot parse config file {}", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load the explicit config file if given (missing is then an error),
/// otherwise the default file if present, otherwise empty settings.
pub fn load_config_or_default(explicit: Option<&Path>) -> anyhow::Result<FileConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    let default = Path::new(DEFAULT_CONFIG_FILE);
    if default.exists() {
        return load_config(default);
    }
    debug!("no config file found, using defaults");
    Ok(FileConfig::default())
}
