//! Signing backends
//!
//! A backend is an opaque signing capability: it can tell whether a file
//! already carries its kind of signature, and it can sign one. The job
//! driver never looks inside.

pub mod embedded;
pub mod jarsigner;

use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, SignError};
use crate::params::{SignMethod, SigningParameters};

pub use embedded::{CredentialStore, EmbeddedBackend};
pub use jarsigner::JarSignerBackend;

/// A signing capability bound to one job's parameters.
#[async_trait::async_trait]
pub trait SigningBackend: Send + Sync {
    /// Short backend name, for logs and messages.
    fn name(&self) -> &str;

    /// Whether `path` is a signing candidate for this backend.
    fn matches(&self, path: &Path) -> bool;

    /// Whether `file` already carries a signature of the expected kind.
    async fn is_already_signed(&self, file: &Path) -> Result<bool>;

    /// Sign `file`. Must be safe to invoke on an already-signed file;
    /// afterwards the file's signed state reports `true`.
    async fn sign(&self, file: &Path) -> Result<()>;
}

/// Build the backend selected by the parameters, validating that the
/// credential fields it needs are present.
pub fn create_backend(params: &SigningParameters) -> Result<Arc<dyn SigningBackend>> {
    match params.method() {
        SignMethod::JarSigner => {
            require(params.alias(), "alias")?;
            require(params.store_password(), "store-password")?;
            Ok(Arc::new(JarSignerBackend::new(params.clone())))
        }
        SignMethod::Embedded => {
            require(params.key_store(), "key-store")?;
            require(params.store_password(), "store-password")?;
            require(params.alias(), "alias")?;
            Ok(Arc::new(EmbeddedBackend::new(params.clone())))
        }
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.is_empty() {
        return Err(SignError::Config(format!("missing required field: {field}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jarsigner_backend_requires_alias() {
        let params = SigningParameters::builder()
            .method(SignMethod::JarSigner)
            .store_password("pw")
            .build();
        match create_backend(&params) {
            Err(SignError::Config(msg)) => assert!(msg.contains("alias")),
            other => panic!("expected config error, got {:?}", other.map(|b| b.name().to_string())),
        }
    }

    #[test]
    fn test_embedded_backend_requires_key_store() {
        let params = SigningParameters::builder()
            .method(SignMethod::Embedded)
            .store_password("pw")
            .alias("release")
            .build();
        match create_backend(&params) {
            Err(SignError::Config(msg)) => assert!(msg.contains("key-store")),
            other => panic!("expected config error, got {:?}", other.map(|b| b.name().to_string())),
        }
    }

    #[test]
    fn test_complete_parameters_build_backends() {
        let params = SigningParameters::builder()
            .method(SignMethod::JarSigner)
            .alias("release")
            .store_password("pw")
            .build();
        assert_eq!(create_backend(&params).unwrap().name(), "jarsigner");

        let params = SigningParameters::builder()
            .method(SignMethod::Embedded)
            .key_store("/tmp/store.csks")
            .store_password("pw")
            .alias("release")
            .build();
        assert_eq!(create_backend(&params).unwrap().name(), "embedded");
    }
}
