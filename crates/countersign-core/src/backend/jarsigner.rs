//! Archive signing through the JDK's external `jarsigner` tool

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, SignError};
use crate::fsutil;
use crate::params::SigningParameters;
use crate::process::{CollectedOutput, LineSink, ProcessRunner};

use super::SigningBackend;

/// Exact (trimmed) stdout line `jarsigner -verify` prints for a signed jar.
const VERIFIED_OUTPUT: &str = "jar verified.";

/// Suffix of signable archive files. Case-sensitive.
const JAR_SUFFIX: &str = ".jar";

/// Backend that shells out to `jarsigner` for both verification and signing.
pub struct JarSignerBackend {
    params: SigningParameters,
    runner: ProcessRunner,
}

impl JarSignerBackend {
    pub fn new(params: SigningParameters) -> Self {
        let runner = ProcessRunner::new(params.debug_commands());
        Self { params, runner }
    }

    fn verify_args(file: &Path) -> Vec<String> {
        vec!["-verify".to_string(), file.display().to_string()]
    }

    /// Assemble the signing invocation. The order is fixed: timestamp
    /// authority, proxy pass-throughs, keystore, store password, key
    /// password, target file, alias.
    fn sign_args(&self, file: &Path) -> Vec<String> {
        let params = &self.params;
        let mut args = Vec::new();
        if params.use_timestamp() {
            args.push("-tsa".to_string());
            args.push(params.timestamp_host().to_string());
        }
        if params.use_proxy() {
            if !params.proxy_host().is_empty() {
                args.push(format!("-J-Dhttp.proxyHost={}", params.proxy_host()));
            }
            if !params.proxy_port().is_empty() {
                args.push(format!("-J-Dhttp.proxyPort={}", params.proxy_port()));
            }
        }
        if !params.key_store().is_empty() {
            args.push("-keystore".to_string());
            args.push(params.key_store().to_string());
        }
        args.push("-storepass".to_string());
        args.push(params.store_password().to_string());
        // Equal passwords are passed once, through -storepass.
        if params.key_password() != params.store_password() {
            args.push("-keypass".to_string());
            args.push(params.key_password().to_string());
        }
        args.push(file.display().to_string());
        args.push(params.alias().to_string());
        args
    }
}

#[async_trait::async_trait]
impl SigningBackend for JarSignerBackend {
    fn name(&self) -> &str {
        "jarsigner"
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(JAR_SUFFIX))
    }

    async fn is_already_signed(&self, file: &Path) -> Result<bool> {
        let output = CollectedOutput::new();
        let code = self
            .runner
            .run(
                self.params.tool_executable(),
                &Self::verify_args(file),
                Some(output.clone() as Arc<dyn LineSink>),
                None,
            )
            .await?;
        if code != 0 {
            // May be a verify failure distinct from "unsigned"; either way
            // the file is treated as a signing candidate.
            warn!(
                file = %file.display(),
                code,
                "verify command failed, treating file as unsigned"
            );
        }
        let signed = output.text().trim() == VERIFIED_OUTPUT;
        if self.params.debug_signature_checks() {
            debug!(file = %file.display(), signed, "signature check");
        }
        Ok(signed)
    }

    async fn sign(&self, file: &Path) -> Result<()> {
        fsutil::ensure_writable(file)?;
        let code = self
            .runner
            .run(
                self.params.tool_executable(),
                &self.sign_args(file),
                None,
                None,
            )
            .await?;
        if code != 0 {
            return Err(SignError::ToolExit {
                command: self.params.tool_executable().display().to_string(),
                code,
            });
        }
        Ok(())
    }
}
