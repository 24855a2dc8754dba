//! Reporting progress from long-running operations, and cooperative cancellation.
use anyhow::Result;
use log::info;

/// Receives progress from batch and optimisation runs.
///
/// `update` is called at least once per batch row or generation and `finish` exactly once.
/// Long-running operations poll `cancelled` between rows or generations and stop early, keeping
/// what they have done so far, when it returns true.
pub trait ProgressSink: Sync {
    /// Report that `current` of `total` steps are complete
    fn update(&self, current: usize, total: usize, message: &str);

    /// Report that the operation has finished
    fn finish(&self);

    /// Whether the operation should stop at the next opportunity
    fn cancelled(&self) -> bool {
        false
    }
}

/// Run an operation, then report that it has finished whether or not it succeeded
pub fn with_finish<T>(
    progress: &dyn ProgressSink,
    operation: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let result = operation();
    progress.finish();
    result
}

/// Writes progress to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn update(&self, current: usize, total: usize, message: &str) {
        info!("[{current}/{total}] {message}");
    }

    fn finish(&self) {
        info!("Finished");
    }
}
