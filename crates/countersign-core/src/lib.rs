//! Countersign Core - Code-signing automation engine
//!
//! This crate walks a directory tree, finds signable artifacts, skips the
//! ones that already carry a signature, and drives one of two signing
//! backends over the rest:
//! - `jarsigner`: delegates to the JDK's external `jarsigner` tool
//! - `embedded`: signs binaries in-process from an encrypted credential store
//!
//! A job runs in two phases over the same traversal: a counting pass that
//! fixes the total amount of work, then a signing pass that reports
//! per-file progress to a caller-supplied monitor and honors cooperative
//! cancellation between files.

pub mod backend;
pub mod discover;
pub mod error;
pub mod fsutil;
pub mod job;
pub mod monitor;
pub mod params;
pub mod process;

pub use backend::{create_backend, CredentialStore, SigningBackend};
pub use discover::FileDiscoverer;
pub use error::{Result, SignError};
pub use job::{JobOutcome, SignJob};
pub use monitor::{CollectingMonitor, NullMonitor, ProgressEvent, ProgressMonitor, TracingMonitor};
pub use params::{SignMethod, SigningParameters, SigningParametersBuilder, DEFAULT_TIMESTAMP_HOST};
pub use process::{CollectedOutput, LineSink, ProcessRunner};
