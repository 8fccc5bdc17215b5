//! Thread registry
//!
//! Each thread owns at most one [`MessageLoop`], created lazily by
//! [`ensure_initialized_for_current_thread`] and dropped when the thread
//! exits, together with its queue and any tasks still pending in it. A loop
//! is only ever reachable from its own thread; other threads hold its
//! [`TaskRunner`](crate::TaskRunner).

use crate::error::LoopError;
use crate::message_loop::MessageLoop;
use log::debug;
use once_cell::unsync::OnceCell;
use std::rc::Rc;
use std::thread;

thread_local! {
    static CURRENT_LOOP: OnceCell<Rc<MessageLoop>> = const { OnceCell::new() };
}

/// Create the calling thread's loop if it does not exist yet.
pub fn ensure_initialized_for_current_thread() {
    CURRENT_LOOP.with(|cell| {
        cell.get_or_init(|| {
            let message_loop = MessageLoop::new();
            debug!(
                "created {} for thread {:?}",
                message_loop.id(),
                thread::current().name().unwrap_or("<unnamed>")
            );
            Rc::new(message_loop)
        });
    });
}

/// Whether the calling thread already has a loop
pub fn is_initialized_for_current_thread() -> bool {
    CURRENT_LOOP
        .try_with(|cell| cell.get().is_some())
        .unwrap_or(false)
}

/// The calling thread's loop, if one was initialized.
pub fn try_current() -> Option<Rc<MessageLoop>> {
    CURRENT_LOOP
        .try_with(|cell| cell.get().cloned())
        .ok()
        .flatten()
}

/// The calling thread's loop.
///
/// # Panics
///
/// Panics if [`ensure_initialized_for_current_thread`] has not been called on
/// this thread.
#[track_caller]
pub fn current() -> Rc<MessageLoop> {
    match try_current() {
        Some(message_loop) => message_loop,
        None => panic!("{}", LoopError::NotInitialized),
    }
}
