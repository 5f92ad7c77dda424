//! Signing job parameters
//!
//! A job consumes one immutable [`SigningParameters`] bundle, produced by
//! [`SigningParametersBuilder`]. The bundle is never mutated after
//! `build()`, so the background worker can read it without synchronization.

use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default timestamp authority contacted when timestamping is enabled.
pub const DEFAULT_TIMESTAMP_HOST: &str = "http://timestamp.digicert.com";

/// Name of the external archive-signing tool.
const JARSIGNER_TOOL: &str = "jarsigner";

/// Supported sign methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMethod {
    /// Sign archive files through the JDK's external `jarsigner` tool.
    JarSigner,
    /// Sign native executables in-process from an encrypted credential store.
    Embedded,
}

impl FromStr for SignMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jarsigner" => Ok(Self::JarSigner),
            "embedded" => Ok(Self::Embedded),
            other => Err(format!("unknown sign method: {other}")),
        }
    }
}

impl std::fmt::Display for SignMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JarSigner => write!(f, "jarsigner"),
            Self::Embedded => write!(f, "embedded"),
        }
    }
}

/// Immutable parameter bundle for one signing job.
#[derive(Debug, Clone)]
pub struct SigningParameters {
    method: SignMethod,
    path_to_sign: String,
    tool_executable: PathBuf,
    key_store: String,
    store_password: String,
    alias: String,
    key_password: String,
    use_proxy: bool,
    proxy_host: String,
    proxy_port: String,
    use_timestamp: bool,
    timestamp_host: String,
    program_name: String,
    program_url: String,
    debug_commands: bool,
    debug_signature_checks: bool,
    debug_traversal: bool,
}

impl SigningParameters {
    /// Start building a parameter bundle.
    pub fn builder() -> SigningParametersBuilder {
        SigningParametersBuilder::new()
    }

    /// The active sign method.
    pub fn method(&self) -> SignMethod {
        self.method
    }

    /// Root file or directory to sign. Empty means a no-op job.
    pub fn path_to_sign(&self) -> &str {
        &self.path_to_sign
    }

    /// Resolved path of the external signing tool.
    pub fn tool_executable(&self) -> &Path {
        &self.tool_executable
    }

    /// Path of the key/credential store. Empty means none configured.
    pub fn key_store(&self) -> &str {
        &self.key_store
    }

    pub fn store_password(&self) -> &str {
        &self.store_password
    }

    /// Name of the signing key inside the store.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn key_password(&self) -> &str {
        &self.key_password
    }

    pub fn use_proxy(&self) -> bool {
        self.use_proxy
    }

    pub fn proxy_host(&self) -> &str {
        &self.proxy_host
    }

    pub fn proxy_port(&self) -> &str {
        &self.proxy_port
    }

    /// Whether to timestamp signatures. An empty timestamp host also
    /// disables timestamping.
    pub fn use_timestamp(&self) -> bool {
        self.use_timestamp && !self.timestamp_host.is_empty()
    }

    pub fn timestamp_host(&self) -> &str {
        &self.timestamp_host
    }

    /// Program name recorded in embedded signature metadata.
    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    /// Program URL recorded in embedded signature metadata.
    pub fn program_url(&self) -> &str {
        &self.program_url
    }

    pub fn debug_commands(&self) -> bool {
        self.debug_commands
    }

    pub fn debug_signature_checks(&self) -> bool {
        self.debug_signature_checks
    }

    pub fn debug_traversal(&self) -> bool {
        self.debug_traversal
    }
}

/// Builder for [`SigningParameters`].
#[derive(Debug, Clone, Default)]
pub struct SigningParametersBuilder {
    method: Option<SignMethod>,
    path_to_sign: String,
    java_home: Option<PathBuf>,
    tool_executable: Option<PathBuf>,
    key_store: String,
    store_password: String,
    alias: String,
    key_password: Option<String>,
    use_proxy: bool,
    proxy_host: String,
    proxy_port: String,
    use_timestamp: Option<bool>,
    timestamp_host: Option<String>,
    program_name: String,
    program_url: String,
    debug_commands: bool,
    debug_signature_checks: bool,
    debug_traversal: bool,
}

impl SigningParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, value: SignMethod) -> Self {
        self.method = Some(value);
        self
    }

    pub fn path_to_sign(mut self, value: impl Into<String>) -> Self {
        self.path_to_sign = value.into();
        self
    }

    /// JDK installation whose `bin/jarsigner` should be used when no
    /// explicit tool path is given.
    pub fn java_home(mut self, value: impl Into<PathBuf>) -> Self {
        self.java_home = Some(value.into());
        self
    }

    /// Explicit path of the external signing tool.
    pub fn tool_executable(mut self, value: impl Into<PathBuf>) -> Self {
        self.tool_executable = Some(value.into());
        self
    }

    pub fn key_store(mut self, value: impl Into<String>) -> Self {
        self.key_store = value.into();
        self
    }

    pub fn store_password(mut self, value: impl Into<String>) -> Self {
        self.store_password = value.into();
        self
    }

    pub fn alias(mut self, value: impl Into<String>) -> Self {
        self.alias = value.into();
        self
    }

    pub fn key_password(mut self, value: impl Into<String>) -> Self {
        self.key_password = Some(value.into());
        self
    }

    pub fn use_proxy(mut self, value: bool) -> Self {
        self.use_proxy = value;
        self
    }

    pub fn proxy_host(mut self, value: impl Into<String>) -> Self {
        self.proxy_host = value.into();
        self
    }

    pub fn proxy_port(mut self, value: impl Into<String>) -> Self {
        self.proxy_port = value.into();
        self
    }

    pub fn use_timestamp(mut self, value: bool) -> Self {
        self.use_timestamp = Some(value);
        self
    }

    pub fn timestamp_host(mut self, value: impl Into<String>) -> Self {
        self.timestamp_host = Some(value.into());
        self
    }

    pub fn program_name(mut self, value: impl Into<String>) -> Self {
        self.program_name = value.into();
        self
    }

    pub fn program_url(mut self, value: impl Into<String>) -> Self {
        self.program_url = value.into();
        self
    }

    pub fn debug_commands(mut self, value: bool) -> Self {
        self.debug_commands = value;
        self
    }

    pub fn debug_signature_checks(mut self, value: bool) -> Self {
        self.debug_signature_checks = value;
        self
    }

    pub fn debug_traversal(mut self, value: bool) -> Self {
        self.debug_traversal = value;
        self
    }

    /// Finalize the bundle. The external tool path is resolved here, once,
    /// and never revisited during the job.
    pub fn build(self) -> SigningParameters {
        let store_password = self.store_password;
        // An unset key password means "same as the store password".
        let key_password = self.key_password.unwrap_or_else(|| store_password.clone());
        SigningParameters {
            method: self.method.unwrap_or(SignMethod::JarSigner),
            path_to_sign: self.path_to_sign,
            tool_executable: resolve_tool(self.tool_executable, self.java_home.as_deref()),
            key_store: self.key_store,
            store_password,
            alias: self.alias,
            key_password,
            use_proxy: self.use_proxy,
            proxy_host: self.proxy_host,
            proxy_port: self.proxy_port,
            use_timestamp: self.use_timestamp.unwrap_or(true),
            timestamp_host: self
                .timestamp_host
                .unwrap_or_else(|| DEFAULT_TIMESTAMP_HOST.to_string()),
            program_name: self.program_name,
            program_url: self.program_url,
            debug_commands: self.debug_commands,
            debug_signature_checks: self.debug_signature_checks,
            debug_traversal: self.debug_traversal,
        }
    }
}

/// Resolve the external tool path: explicit path first, then
/// `<java_home>/bin/jarsigner`, then a `PATH` lookup, then the bare name.
fn resolve_tool(explicit: Option<PathBuf>, java_home: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    let tool_name = format!("{}{}", JARSIGNER_TOOL, std::env::consts::EXE_SUFFIX);
    if let Some(home) = java_home {
        return home.join("bin").join(tool_name);
    }
    which::which(JARSIGNER_TOOL).unwrap_or_else(|_| PathBuf::from(tool_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sign_method() {
        assert_eq!("jarsigner".parse::<SignMethod>(), Ok(SignMethod::JarSigner));
        assert_eq!("EMBEDDED".parse::<SignMethod>(), Ok(SignMethod::Embedded));
        assert!("signtool".parse::<SignMethod>().is_err());
    }

    #[test]
    fn test_defaults() {
        let params = SigningParameters::builder().build();
        assert_eq!(params.method(), SignMethod::JarSigner);
        assert_eq!(params.timestamp_host(), DEFAULT_TIMESTAMP_HOST);
        assert!(params.use_timestamp());
        assert!(!params.use_proxy());
        assert!(!params.debug_commands());
        assert!(params.path_to_sign().is_empty());
    }

    #[test]
    fn test_key_password_defaults_to_store_password() {
        let params = SigningParameters::builder()
            .store_password("secret")
            .build();
        assert_eq!(params.key_password(), "secret");

        let params = SigningParameters::builder()
            .store_password("secret")
            .key_password("other")
            .build();
        assert_eq!(params.key_password(), "other");
    }

    #[test]
    fn test_explicit_tool_wins_over_java_home() {
        let params = SigningParameters::builder()
            .java_home("/opt/jdk")
            .tool_executable("/usr/local/bin/jarsigner")
            .build();
        assert_eq!(
            params.tool_executable(),
            Path::new("/usr/local/bin/jarsigner")
        );
    }

    #[test]
    fn test_java_home_tool_resolution() {
        let params = SigningParameters::builder().java_home("/opt/jdk").build();
        let expected = format!("jarsigner{}", std::env::consts::EXE_SUFFIX);
        assert_eq!(
            params.tool_executable(),
            Path::new("/opt/jdk").join("bin").join(expected)
        );
    }

    #[test]
    fn test_empty_timestamp_host_disables_timestamping() {
        let params = SigningParameters::builder().timestamp_host("").build();
        assert!(!params.use_timestamp());
    }
}
