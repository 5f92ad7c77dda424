//! Error types for signing operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for signing operations
pub type Result<T> = std::result::Result<T, SignError>;

/// Signing-related errors
#[derive(Debug, Error)]
pub enum SignError {
    /// Required configuration field is missing or empty
    #[error("configuration error: {0}")]
    Config(String),

    /// A path could not be read during traversal
    #[error("cannot traverse {path}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external signing tool could not be started
    #[error("failed to launch '{command}'")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The external signing tool exited with a non-zero code
    #[error("'{command}' exited with code {code}")]
    ToolExit { command: String, code: i32 },

    /// Bad store passphrase or missing key alias
    #[error("credential store error: {0}")]
    Credentials(String),

    /// The timestamp authority could not be reached
    #[error("timestamp authority unreachable: {0}")]
    Network(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
