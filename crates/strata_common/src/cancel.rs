//! Session-level cooperative cancellation.
//!
//! Workers never block on this flag; it is polled before dispatch and at
//! every batch-flush boundary, so a plain atomic is enough.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a session's control path
/// and the statement it is executing.
#[derive(Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. In-flight workers finish their current call;
    /// no new workers are dispatched afterwards.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
