//! Loop error types.

use crate::message_loop::LoopId;

/// Errors reported by loops and loop threads.
///
/// The lifecycle variants describe programmer errors. The panicking entry
/// points ([`MessageLoop::run`](crate::MessageLoop::run),
/// [`current`](crate::current)) abort the calling thread with these messages;
/// the `try_` variants hand them back instead.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// No loop has been created for the calling thread
    #[error("no message loop is initialized for the current thread; call ensure_initialized_for_current_thread() first")]
    NotInitialized,

    /// `run` was called while the loop was already dispatching
    #[error("message loop {0} is already running")]
    AlreadyRunning(LoopId),

    /// `run` was called after the loop terminated
    #[error("message loop {0} has terminated and cannot be restarted")]
    AlreadyTerminated(LoopId),

    /// The OS refused to spawn a loop thread
    #[error("failed to spawn loop thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    /// A loop thread exited before handing back its task runner, or panicked
    #[error("loop thread '{0}' panicked")]
    ThreadPanicked(String),
}

/// Result alias for loop operations.
pub type Result<T> = std::result::Result<T, LoopError>;
