//! Per-thread message loop
//!
//! A [`MessageLoop`] owns one [`TaskQueue`] and dispatches it on the thread
//! that created it. Loops are obtained through the thread registry
//! ([`ensure_initialized_for_current_thread`](crate::ensure_initialized_for_current_thread)
//! and [`current`](crate::current)) and never leave their thread; other
//! threads talk to a loop through its [`TaskRunner`].

use crate::error::{LoopError, Result};
use crate::observer::{ObserverList, TaskObserver};
use crate::queue::{Task, TaskQueue};
use crate::runner::TaskRunner;
use log::debug;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Unique identifier for a MessageLoop
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LoopId(u64);

static NEXT_LOOP_ID: AtomicU64 = AtomicU64::new(1);

impl LoopId {
    pub(crate) fn next() -> Self {
        LoopId(NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop#{}", self.0)
    }
}

/// Lifecycle of a MessageLoop
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// Created, `run` not called yet
    Idle,
    /// Inside `run`
    Running,
    /// `run` has returned; terminal
    Terminated,
}

/// Loop statistics
#[derive(Debug, Clone, Default)]
pub struct LoopStats {
    /// Tasks executed by this loop so far
    pub tasks_dispatched: u64,

    /// Tasks waiting in the queue, due or not
    pub pending_tasks: usize,
}

/// Per-thread dispatcher owning a task queue.
pub struct MessageLoop {
    id: LoopId,
    queue: Arc<TaskQueue>,
    owner: ThreadId,
    state: Cell<LoopState>,
    /// Set while `run_expired_tasks_now` is dispatching
    draining: Cell<bool>,
    observers: RefCell<ObserverList>,
    tasks_dispatched: Cell<u64>,
}

/// Marks the loop terminated and closes its queue when `run` exits,
/// including by unwinding out of a task.
struct TerminateOnExit<'a> {
    state: &'a Cell<LoopState>,
    queue: &'a TaskQueue,
}

impl Drop for TerminateOnExit<'_> {
    fn drop(&mut self) {
        self.state.set(LoopState::Terminated);
        self.queue.close();
    }
}

/// Clears the draining flag, including on unwind.
struct DrainScope<'a>(&'a Cell<bool>);

impl Drop for DrainScope<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl MessageLoop {
    /// Loops are created by the thread registry only.
    pub(crate) fn new() -> Self {
        Self {
            id: LoopId::next(),
            queue: Arc::new(TaskQueue::new()),
            owner: thread::current().id(),
            state: Cell::new(LoopState::Idle),
            draining: Cell::new(false),
            observers: RefCell::new(ObserverList::new()),
            tasks_dispatched: Cell::new(0),
        }
    }

    /// Identity of this loop
    pub fn id(&self) -> LoopId {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> LoopState {
        self.state.get()
    }

    /// Dispatch tasks until [`terminate`](Self::terminate) is observed.
    ///
    /// Blocks the thread while no task is due. After each task every live
    /// observer is notified in registration order, then the termination flag
    /// is checked. A panic raised by a task propagates out of `run`
    /// unchanged and leaves the loop terminated.
    ///
    /// On return the queue is closed: pending tasks are dropped and later
    /// posts through any [`TaskRunner`] are refused.
    ///
    /// # Panics
    ///
    /// Panics if the loop is already dispatching or has already terminated.
    #[track_caller]
    pub fn run(&self) {
        if let Err(err) = self.try_run() {
            panic!("{err}");
        }
    }

    /// Like [`run`](Self::run), but reports lifecycle misuse as an error.
    pub fn try_run(&self) -> Result<()> {
        match self.state.get() {
            LoopState::Idle if self.draining.get() => {
                return Err(LoopError::AlreadyRunning(self.id))
            }
            LoopState::Idle => {}
            LoopState::Running => return Err(LoopError::AlreadyRunning(self.id)),
            LoopState::Terminated => return Err(LoopError::AlreadyTerminated(self.id)),
        }

        self.state.set(LoopState::Running);
        let _exit = TerminateOnExit {
            state: &self.state,
            queue: &self.queue,
        };
        debug!("{} running on {:?}", self.id, thread::current().name());

        // The queue checks the termination flag before every take.
        while let Some(task) = self.queue.wait_and_take_next() {
            self.dispatch(task);
        }

        debug!(
            "{} terminated after {} tasks, {} left pending",
            self.id,
            self.tasks_dispatched.get(),
            self.queue.len()
        );
        Ok(())
    }

    /// Dispatch every task that is already due, without blocking.
    ///
    /// Stops early if a task requests termination. Returns the number of
    /// tasks executed.
    ///
    /// # Panics
    ///
    /// Panics if called from a task while [`run`](Self::run) or another
    /// `run_expired_tasks_now` is dispatching.
    #[track_caller]
    pub fn run_expired_tasks_now(&self) -> usize {
        if self.state.get() == LoopState::Running || self.draining.get() {
            panic!("{}", LoopError::AlreadyRunning(self.id));
        }

        self.draining.set(true);
        let _scope = DrainScope(&self.draining);

        let mut executed = 0;
        while let Some(task) = self.queue.try_take_due() {
            self.dispatch(task);
            executed += 1;
        }
        executed
    }

    /// Request that `run` return after the current task and its observers.
    ///
    /// Idempotent. Requests from other threads go through
    /// [`TaskRunner::terminate`].
    pub fn terminate(&self) {
        if self.queue.request_terminate() {
            debug!("{} termination requested", self.id);
        }
    }

    /// Whether termination has been requested
    pub fn is_terminate_requested(&self) -> bool {
        self.queue.is_terminate_requested()
    }

    /// Handle for posting tasks to this loop from any thread
    pub fn task_runner(&self) -> TaskRunner {
        TaskRunner::new(Arc::downgrade(&self.queue), self.owner, self.id)
    }

    /// Register an observer, notified after every dispatched task.
    ///
    /// The loop holds only a weak reference. Adding an observer that is
    /// already registered has no effect.
    pub fn add_task_observer(&self, observer: &Rc<dyn TaskObserver>) {
        self.observers.borrow_mut().add(observer);
    }

    /// Deregister an observer. Returns whether it was registered.
    pub fn remove_task_observer(&self, observer: &Rc<dyn TaskObserver>) -> bool {
        self.observers.borrow_mut().remove(observer)
    }

    /// Snapshot of loop counters
    pub fn stats(&self) -> LoopStats {
        LoopStats {
            tasks_dispatched: self.tasks_dispatched.get(),
            pending_tasks: self.queue.len(),
        }
    }

    fn dispatch(&self, task: Task) {
        task();
        self.tasks_dispatched.set(self.tasks_dispatched.get() + 1);

        let observers = self.observers.borrow_mut().snapshot();
        for observer in observers {
            observer.did_process_task();
        }
    }
}

impl fmt::Debug for MessageLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageLoop")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("state", &self.state.get())
            .field("observers", &self.observers.borrow().len())
            .field("queue", &self.queue)
            .finish()
    }
}
