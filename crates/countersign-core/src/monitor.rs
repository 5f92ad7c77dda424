//! Progress monitoring for signing jobs
//!
//! Monitors are called synchronously from the job's worker, in order.
//! Cancellation is cooperative: the job polls [`ProgressMonitor::is_cancelled`]
//! between files and at phase boundaries, never mid-operation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Events emitted while a signing job runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Progress fraction update. `current` only grows during the signing
    /// phase; `total` is fixed once counting completes.
    Progress { current: u64, total: u64 },
    /// Human-oriented status message
    Message(String),
}

/// Observer interested in the progress of a signing job.
///
/// Implementations must not block indefinitely; a slow monitor stalls
/// signing, since notifications are delivered synchronously.
pub trait ProgressMonitor: Send + Sync {
    /// Progress update: `current` files out of `total` processed.
    fn update_progress(&self, current: u64, total: u64);

    /// Status message update.
    fn update_message(&self, message: &str);

    /// Poll for cancellation. Once this returns `true`, the job finishes
    /// the in-flight operation and stops.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Monitor that ignores everything.
#[derive(Debug, Default)]
pub struct NullMonitor;

impl ProgressMonitor for NullMonitor {
    fn update_progress(&self, _current: u64, _total: u64) {}

    fn update_message(&self, _message: &str) {}
}

/// Monitor that logs to tracing.
#[derive(Debug, Default)]
pub struct TracingMonitor;

impl ProgressMonitor for TracingMonitor {
    fn update_progress(&self, current: u64, total: u64) {
        tracing::info!(current, total, "progress");
    }

    fn update_message(&self, message: &str) {
        tracing::debug!("{message}");
    }
}

/// Monitor that records events for later inspection (useful for testing),
/// with an optional cancellation trigger.
#[derive(Debug, Default)]
pub struct CollectingMonitor {
    events: Mutex<Vec<ProgressEvent>>,
    cancelled: AtomicBool,
    cancel_after_progress: AtomicU64,
    progress_seen: AtomicU64,
}

impl CollectingMonitor {
    pub fn new() -> Self {
        Self {
            cancel_after_progress: AtomicU64::new(u64::MAX),
            ..Self::default()
        }
    }

    /// Request cancellation now.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Request cancellation once `n` progress updates have been observed.
    pub fn cancel_after_progress(&self, n: u64) {
        self.cancel_after_progress.store(n, Ordering::SeqCst);
    }

    /// All recorded events, in delivery order.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("monitor lock poisoned").clone()
    }

    /// Only the progress events, in delivery order.
    pub fn progress_events(&self) -> Vec<(u64, u64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress { current, total } => Some((current, total)),
                ProgressEvent::Message(_) => None,
            })
            .collect()
    }
}

impl ProgressMonitor for CollectingMonitor {
    fn update_progress(&self, current: u64, total: u64) {
        self.events
            .lock()
            .expect("monitor lock poisoned")
            .push(ProgressEvent::Progress { current, total });
        let seen = self.progress_seen.fetch_add(1, Ordering::SeqCst) + 1;
        if seen >= self.cancel_after_progress.load(Ordering::SeqCst) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn update_message(&self, message: &str) {
        self.events
            .lock()
            .expect("monitor lock poisoned")
            .push(ProgressEvent::Message(message.to_string()));
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
