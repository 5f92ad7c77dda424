//! Sign command

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Args;
use console::style;
use tracing::info;

use countersign_core::{JobOutcome, SignJob, SigningParameters};

use crate::config::{self, FileConfig};
use crate::exit_codes;

use super::progress::ConsoleMonitor;

/// Sign the artifacts under a path
#[derive(Debug, Default, Args)]
pub struct SignCommand {
    /// File or directory to sign
    #[arg(long)]
    pub path: Option<String>,

    /// Sign method (jarsigner, embedded)
    #[arg(long)]
    pub sign_method: Option<String>,

    /// Name of the signing key
    #[arg(long)]
    pub alias: Option<String>,

    /// Path to the key/credential store
    #[arg(long)]
    pub key_store: Option<String>,

    /// Password of the store
    #[arg(long)]
    pub store_password: Option<String>,

    /// Password of the key, when it differs from the store password
    #[arg(long)]
    pub key_pass: Option<String>,

    /// Outbound proxy host
    #[arg(long)]
    pub proxy_host: Option<String>,

    /// Outbound proxy port
    #[arg(long)]
    pub proxy_port: Option<String>,

    /// Timestamp authority URL
    #[arg(long)]
    pub time_stamp_host: Option<String>,

    /// Disable signature timestamping
    #[arg(long)]
    pub no_timestamp: bool,

    /// JDK installation providing jarsigner
    #[arg(long)]
    pub java_home: Option<String>,

    /// Explicit path of the jarsigner executable
    #[arg(long)]
    pub jar_signer: Option<String>,

    /// Program name recorded by the embedded backend
    #[arg(long)]
    pub program_name: Option<String>,

    /// Program URL recorded by the embedded backend
    #[arg(long)]
    pub program_url: Option<String>,

    /// Log external tool command lines (may expose credentials)
    #[arg(long)]
    pub debug_command: bool,

    /// Log per-file signed-state checks
    #[arg(long)]
    pub debug_signature: bool,

    /// Log every path visited during traversal
    #[arg(long)]
    pub debug_directory_walk: bool,

    /// Configuration file (default: countersign.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl SignCommand {
    /// Execute the sign command.
    pub fn execute(&self) -> anyhow::Result<i32> {
        let file = config::load_config_or_default(self.config.as_deref())?;
        let params = build_parameters(self, &file)?;
        info!(
            method = %params.method(),
            path = params.path_to_sign(),
            "starting signing job"
        );

        let cancelled = Arc::new(AtomicBool::new(false));
        let monitor = Arc::new(ConsoleMonitor::new(cancelled.clone()));

        let rt = tokio::runtime::Runtime::new()?;
        let result = rt.block_on(async {
            let flag = cancelled.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    flag.store(true, Ordering::SeqCst);
                }
            });
            SignJob::new(params, monitor.clone()).run().await
        });
        monitor.finish();

        match result {
            Ok(JobOutcome::Completed) => {
                println!("{} signing complete", style("✓").green());
                Ok(exit_codes::SUCCESS)
            }
            Ok(JobOutcome::Cancelled) => {
                println!("{} signing cancelled", style("!").yellow());
                Ok(exit_codes::CANCELLED)
            }
            Err(e) => {
                let err = anyhow::Error::new(e);
                eprintln!("{} {err:#}", style("error:").red().bold());
                Ok(exit_codes::ERROR)
            }
        }
    }
}

/// Merge command-line flags over file settings over defaults into one
/// immutable parameter bundle.
fn build_parameters(cmd: &SignCommand, file: &FileConfig) -> anyhow::Result<SigningParameters> {
    let mut builder = SigningParameters::builder();

    if let Some(method) = cmd.sign_method.as_ref().or(file.sign_method.as_ref()) {
        builder = builder.method(method.parse().map_err(anyhow::Error::msg)?);
    }
    if let Some(path) = cmd.path.as_ref().or(file.path_to_sign.as_ref()) {
        builder = builder.path_to_sign(path);
    }
    if let Some(home) = cmd.java_home.as_ref().or(file.java_home.as_ref()) {
        builder = builder.java_home(home);
    }
    if let Some(tool) = cmd.jar_signer.as_ref().or(file.jar_signer.as_ref()) {
        builder = builder.tool_executable(tool);
    }
    if let Some(store) = cmd.key_store.as_ref().or(file.key_store.as_ref()) {
        builder = builder.key_store(store);
    }
    if let Some(password) = cmd.store_password.as_ref().or(file.store_password.as_ref()) {
        builder = builder.store_password(password);
    }
    if let Some(alias) = cmd.alias.as_ref().or(file.alias.as_ref()) {
        builder = builder.alias(alias);
    }
    if let Some(key_pass) = cmd.key_pass.as_ref().or(file.key_pass.as_ref()) {
        builder = builder.key_password(key_pass);
    }

    let proxy_host = cmd.proxy_host.as_ref().or(file.proxy_host.as_ref());
    let proxy_port = cmd.proxy_port.as_ref().or(file.proxy_port.as_ref());
    if let Some(host) = proxy_host {
        builder = builder.use_proxy(true).proxy_host(host);
    }
    if let Some(port) = proxy_port {
        builder = builder.proxy_port(port);
    }

    if cmd.no_timestamp {
        builder = builder.use_timestamp(false);
    } else if let Some(enabled) = file.use_timestamp {
        builder = builder.use_timestamp(enabled);
    }
    if let Some(host) = cmd.time_stamp_host.as_ref().or(file.time_stamp_host.as_ref()) {
        builder = builder.timestamp_host(host);
    }

    if let Some(name) = cmd.program_name.as_ref().or(file.program_name.as_ref()) {
        builder = builder.program_name(name);
    }
    if let Some(url) = cmd.program_url.as_ref().or(file.program_url.as_ref()) {
        builder = builder.program_url(url);
    }

    builder = builder
        .debug_commands(cmd.debug_command || file.debug_command.unwrap_or(false))
        .debug_signature_checks(cmd.debug_signature || file.debug_signature.unwrap_or(false))
        .debug_traversal(cmd.debug_directory_walk || file.debug_directory_walk.unwrap_or(false));

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use countersign_core::SignMethod;

    #[test]
    fn test_flags_override_file_settings() {
        let cmd = SignCommand {
            alias: Some("from-flag".to_string()),
            ..Default::default()
        };
        let file = FileConfig {
            alias: Some("from-file".to_string()),
            store_password: Some("filepw".to_string()),
            ..Default::default()
        };

        let params = build_parameters(&cmd, &file).unwrap();
        assert_eq!(params.alias(), "from-flag");
        assert_eq!(params.store_password(), "filepw");
    }

    #[test]
    fn test_proxy_enabled_when_host_configured() {
        let cmd = SignCommand {
            proxy_host: Some("proxy.local".to_string()),
            proxy_port: Some("3128".to_string()),
            ..Default::default()
        };
        let params = build_parameters(&cmd, &FileConfig::default()).unwrap();
        assert!(params.use_proxy());
        assert_eq!(params.proxy_host(), "proxy.local");
        assert_eq!(params.proxy_port(), "3128");

        let params = build_parameters(&SignCommand::default(), &FileConfig::default()).unwrap();
        assert!(!params.use_proxy());
    }

    #[test]
    fn test_no_timestamp_flag_wins_over_file() {
        let cmd = SignCommand {
            no_timestamp: true,
            ..Default::default()
        };
        let file = FileConfig {
            use_timestamp: Some(true),
            ..Default::default()
        };
        let params = build_parameters(&cmd, &file).unwrap();
        assert!(!params.use_timestamp());
    }

    #[test]
    fn test_sign_method_from_file() {
        let file = FileConfig {
            sign_method: Some("embedded".to_string()),
            ..Default::default()
        };
        let params = build_parameters(&SignCommand::default(), &file).unwrap();
        assert_eq!(params.method(), SignMethod::Embedded);
    }

    #[test]
    fn test_invalid_sign_method_is_rejected() {
        let cmd = SignCommand {
            sign_method: Some("signtool".to_string()),
            ..Default::default()
        };
        assert!(build_parameters(&cmd, &FileConfig::default()).is_err());
    }
}
