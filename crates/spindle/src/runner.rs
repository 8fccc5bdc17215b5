//! Cross-thread task runner
//!
//! [`TaskRunner`] is the only loop-facing type meant to cross threads. It
//! forwards posts to its loop's queue through a weak reference, so holding a
//! runner never keeps a loop alive. Posting after the loop has stopped, or
//! after its thread has exited, drops the task on the spot.

use crate::message_loop::LoopId;
use crate::queue::TaskQueue;
use crate::sync::AutoResetEvent;
use log::{debug, trace};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Shareable handle that enqueues work onto one loop.
#[derive(Clone)]
pub struct TaskRunner {
    queue: Weak<TaskQueue>,
    owner: ThreadId,
    loop_id: LoopId,
}

impl TaskRunner {
    pub(crate) fn new(queue: Weak<TaskQueue>, owner: ThreadId, loop_id: LoopId) -> Self {
        Self {
            queue,
            owner,
            loop_id,
        }
    }

    /// Post a task that is due now.
    pub fn post_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let accepted = match self.queue.upgrade() {
            Some(queue) => queue.post_task(Box::new(task)),
            None => false,
        };
        if !accepted {
            self.dropped();
        }
    }

    /// Post a task that becomes due after `delay`.
    pub fn post_delayed_task<F>(&self, task: F, delay: Duration)
    where
        F: FnOnce() + Send + 'static,
    {
        let accepted = match self.queue.upgrade() {
            Some(queue) => queue.post_delayed_task(Box::new(task), delay),
            None => false,
        };
        if !accepted {
            self.dropped();
        }
    }

    /// Post a task that becomes due at `deadline`.
    pub fn post_task_for_time<F>(&self, task: F, deadline: Instant)
    where
        F: FnOnce() + Send + 'static,
    {
        let accepted = match self.queue.upgrade() {
            Some(queue) => queue.post_task_for_time(Box::new(task), deadline),
            None => false,
        };
        if !accepted {
            self.dropped();
        }
    }

    /// Run `task` on the loop's thread and block until it has finished.
    ///
    /// Called on the loop's own thread, the task runs inline. Returns `false`
    /// if the task was dropped without running because the loop stopped.
    pub fn run_and_wait<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.runs_tasks_on_current_thread() {
            task();
            return true;
        }

        let latch = Arc::new(AutoResetEvent::new());
        let ran = Arc::new(AtomicBool::new(false));
        let signal = SignalOnDrop(Arc::clone(&latch));
        let task_ran = Arc::clone(&ran);
        self.post_task(move || {
            let _signal = signal;
            task();
            task_ran.store(true, Ordering::Release);
        });

        latch.wait();
        ran.load(Ordering::Acquire)
    }

    /// Ask the loop to stop. Callable from any thread.
    ///
    /// The loop finishes the task it is running, if any, and returns from
    /// `run` without taking another entry; a loop sleeping on its queue wakes
    /// up to do so. Tasks still pending are dropped.
    pub fn terminate(&self) {
        if let Some(queue) = self.queue.upgrade() {
            if queue.request_terminate() {
                debug!(
                    "{} termination requested from {:?}",
                    self.loop_id,
                    thread::current().name()
                );
            }
        }
    }

    /// Whether the calling thread is the thread that owns the loop.
    pub fn runs_tasks_on_current_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Whether the loop still accepts tasks.
    ///
    /// Racy while the loop is running; exact once `run` has returned.
    pub fn is_alive(&self) -> bool {
        self.queue.upgrade().is_some_and(|queue| !queue.is_closed())
    }

    /// Identity of the loop this runner posts to
    pub fn loop_id(&self) -> LoopId {
        self.loop_id
    }

    fn dropped(&self) {
        trace!("{} is not accepting tasks; dropping posted task", self.loop_id);
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("loop_id", &self.loop_id)
            .field("owner", &self.owner)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Signals the latch whether the task ran or was dropped unexecuted.
struct SignalOnDrop(Arc<AutoResetEvent>);

impl Drop for SignalOnDrop {
    fn drop(&mut self) {
        self.0.signal();
    }
}
