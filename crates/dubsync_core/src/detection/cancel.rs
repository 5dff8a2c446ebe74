//! Cooperative cancellation for detection runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle for cancelling a running detection.
///
/// Clones share the same flag. Workers check it before each probe and
/// between samples.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create a new, non-cancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the handle can be reused for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
