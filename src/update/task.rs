//! Cancellable background tasks

use crate::error::Result;
use std::panic;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unset token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to an update check or download running on its own thread
///
/// Cancellation is cooperative: it is observed between download chunks and
/// once the current request returns.
pub struct TaskHandle<T> {
    token: CancelToken,
    handle: JoinHandle<Result<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(token: CancelToken, handle: JoinHandle<Result<T>>) -> Self {
        Self { token, handle }
    }

    /// Ask the task to stop; [`TaskHandle::wait`] then yields `Cancelled`
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the task has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the task finishes
    pub fn wait(self) -> Result<T> {
        self.handle
            .join()
            .unwrap_or_else(|payload| panic::resume_unwind(payload))
    }
}
