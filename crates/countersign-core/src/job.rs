//! The signing job driver
//!
//! A job runs two passes over the same traversal: a counting pass that
//! fixes the total, then a signing pass that walks the tree again and
//! processes each candidate in order. Progress is pushed to the monitor
//! synchronously after every candidate; cancellation is polled between
//! candidates and at phase boundaries. The first backend or filesystem
//! error aborts the whole job.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::backend::{create_backend, SigningBackend};
use crate::discover::{FileDiscoverer, FileFilter};
use crate::error::{Result, SignError};
use crate::monitor::ProgressMonitor;
use crate::params::SigningParameters;

/// How a job ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// All candidates were processed.
    Completed,
    /// The monitor requested cancellation; processing stopped at a file
    /// boundary and the remaining candidates were left untouched.
    Cancelled,
}

/// One signing job over one parameter bundle.
///
/// Only one job may run at a time per process; callers must not start a
/// second job while one is active.
pub struct SignJob {
    params: SigningParameters,
    backend: Option<Arc<dyn SigningBackend>>,
    monitor: Arc<dyn ProgressMonitor>,
}

impl SignJob {
    /// Job whose backend is built from the parameters when it runs.
    pub fn new(params: SigningParameters, monitor: Arc<dyn ProgressMonitor>) -> Self {
        Self {
            params,
            backend: None,
            monitor,
        }
    }

    /// Job with an explicit backend, bypassing [`create_backend`].
    pub fn with_backend(
        params: SigningParameters,
        backend: Arc<dyn SigningBackend>,
        monitor: Arc<dyn ProgressMonitor>,
    ) -> Self {
        Self {
            params,
            backend: Some(backend),
            monitor,
        }
    }

    /// Run the job to completion, cancellation, or first error.
    pub async fn run(&self) -> Result<JobOutcome> {
        let root = self.params.path_to_sign();
        // An empty root is a no-op job: succeed without notifying anyone.
        if root.is_empty() {
            return Ok(JobOutcome::Completed);
        }
        let root = Path::new(root);
        if !root.exists() {
            return Err(SignError::Traversal {
                path: root.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "path does not exist"),
            });
        }

        self.monitor.update_message("Initializing.");
        let backend = match &self.backend {
            Some(backend) => backend.clone(),
            None => create_backend(&self.params)?,
        };
        let filter: FileFilter = {
            let backend = backend.clone();
            Arc::new(move |path: &Path| backend.matches(path))
        };
        let discoverer = FileDiscoverer::new(root, filter, self.params.debug_traversal());

        // Counting pass: fix the total before any signing happens.
        let mut total: u64 = 0;
        for entry in discoverer.scan() {
            entry?;
            total += 1;
            if self.monitor.is_cancelled() {
                return Ok(JobOutcome::Cancelled);
            }
        }
        self.monitor.update_progress(0, total);
        if self.monitor.is_cancelled() {
            return Ok(JobOutcome::Cancelled);
        }

        // Signing pass: same traversal, same order.
        self.monitor.update_message("Signing files.");
        let mut current: u64 = 0;
        for entry in discoverer.scan() {
            let file = entry?;
            self.monitor.update_message(&file.display().to_string());
            if !backend.is_already_signed(&file).await? {
                backend.sign(&file).await?;
                info!(file = %file.display(), backend = backend.name(), "signed");
            }
            current += 1;
            self.monitor.update_progress(current, total);
            if self.monitor.is_cancelled() {
                return Ok(JobOutcome::Cancelled);
            }
        }
        self.monitor.update_message("Done.");
        Ok(JobOutcome::Completed)
    }

    /// Run the job on its own worker task.
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<JobOutcome>> {
        tokio::spawn(async move { self.run().await })
    }
}
