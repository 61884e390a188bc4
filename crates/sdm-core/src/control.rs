//! Cooperative cancellation for running downloads.
//!
//! Every run of a task owns one `StopToken`. Pause and discard flip it; each
//! segment worker checks it between chunks and winds down without reporting
//! a failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag for one run of a download task. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that every holder of this token stops at its next chunk boundary.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
