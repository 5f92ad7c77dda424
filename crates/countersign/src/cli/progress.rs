//! Console progress rendering

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use countersign_core::ProgressMonitor;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress monitor that drives an indicatif bar and surfaces a shared
/// cancellation flag (set by the Ctrl-C handler) to the signing job.
pub struct ConsoleMonitor {
    bar: ProgressBar,
    cancelled: Arc<AtomicBool>,
}

impl ConsoleMonitor {
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar, cancelled }
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressMonitor for ConsoleMonitor {
    fn update_progress(&self, current: u64, total: u64) {
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
        }
        self.bar.set_position(current);
    }

    fn update_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
