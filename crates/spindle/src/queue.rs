//! Deadline-ordered task queue
//!
//! Every post resolves to a `(deadline, sequence)` pair, so immediate and
//! delayed work share a single total order. Producers on any thread insert
//! under one mutex; the owning loop's thread is the only consumer and sleeps
//! on a condvar bounded by the earliest pending deadline.
//!
//! The queue also carries the loop's termination flag, so a request from any
//! thread wakes a sleeping consumer. Once the loop stops the queue is closed:
//! pending entries are dropped and later posts are refused.

use crate::defaults::DEFAULT_QUEUE_CAPACITY;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// Stand-in deadline for delays that overflow `Instant` (about 136 years).
const FAR_FUTURE: Duration = Duration::from_secs(u32::MAX as u64);

/// A unit of work posted to a loop.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Entry in the queue heap
struct ScheduledEntry {
    /// When the task becomes eligible to run
    deadline: Instant,
    /// Insertion order, breaks deadline ties
    sequence: u64,
    task: Task,
}

impl ScheduledEntry {
    fn key(&self) -> (Instant, u64) {
        (self.deadline, self.sequence)
    }
}

// Reverse ordering for min-heap (earliest deadline, then lowest sequence first)
impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledEntry {}

/// Queue state protected by the mutex
struct QueueState {
    entries: BinaryHeap<ScheduledEntry>,
    /// Sequence handed to the next insertion
    next_sequence: u64,
    terminate_requested: bool,
    closed: bool,
}

/// Thread-safe store of pending tasks ordered by `(deadline, sequence)`.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    /// Wakes the consumer when a new earliest entry arrives
    wakeup: Condvar,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: BinaryHeap::with_capacity(DEFAULT_QUEUE_CAPACITY),
                next_sequence: 0,
                terminate_requested: false,
                closed: false,
            }),
            wakeup: Condvar::new(),
        }
    }

    /// Enqueue a task that is due now.
    ///
    /// Returns `false` and drops the task if the queue is closed.
    pub fn post_task(&self, task: Task) -> bool {
        self.post_task_for_time(task, Instant::now())
    }

    /// Enqueue a task that becomes due after `delay`.
    pub fn post_delayed_task(&self, task: Task, delay: Duration) -> bool {
        let now = Instant::now();
        let deadline = now
            .checked_add(delay)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        self.post_task_for_time(task, deadline)
    }

    /// Enqueue a task that becomes due at `deadline`, which may already be past.
    pub fn post_task_for_time(&self, task: Task, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            // Dropping the task may run arbitrary code; release the lock first.
            drop(state);
            drop(task);
            return false;
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.push(ScheduledEntry {
            deadline,
            sequence,
            task,
        });

        // Only a new head can shorten the consumer's sleep.
        let is_new_head = state
            .entries
            .peek()
            .is_some_and(|head| head.sequence == sequence);
        drop(state);
        if is_new_head {
            self.wakeup.notify_one();
        }
        true
    }

    /// Block until the earliest entry is due, then remove and return it.
    ///
    /// Returns `None` once termination has been requested or the queue is
    /// closed. Only the owning loop's thread may call this.
    pub fn wait_and_take_next(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if state.terminate_requested || state.closed {
                return None;
            }

            let now = Instant::now();
            match state.entries.peek().map(|head| head.deadline) {
                Some(deadline) if deadline <= now => {
                    return state.entries.pop().map(|entry| entry.task);
                }
                Some(deadline) => {
                    // Wakes early if a sooner entry is inserted; the loop re-checks either way.
                    self.wakeup.wait_until(&mut state, deadline);
                }
                None => {
                    self.wakeup.wait(&mut state);
                }
            }
        }
    }

    /// Remove and return the earliest entry if it is already due.
    ///
    /// Returns `None` once termination has been requested or the queue is closed.
    pub fn try_take_due(&self) -> Option<Task> {
        let mut state = self.state.lock();
        if state.terminate_requested || state.closed {
            return None;
        }
        let due = state
            .entries
            .peek()
            .is_some_and(|head| head.deadline <= Instant::now());
        if due {
            state.entries.pop().map(|entry| entry.task)
        } else {
            None
        }
    }

    /// Ask the consumer to stop taking entries. Callable from any thread.
    ///
    /// Returns `true` if this call set the flag.
    pub fn request_terminate(&self) -> bool {
        let mut state = self.state.lock();
        if state.terminate_requested {
            return false;
        }
        state.terminate_requested = true;
        drop(state);
        self.wakeup.notify_all();
        true
    }

    /// Whether termination has been requested
    pub fn is_terminate_requested(&self) -> bool {
        self.state.lock().terminate_requested
    }

    /// Refuse further posts and drop every pending entry.
    ///
    /// Returns the number of entries dropped. Idempotent.
    pub fn close(&self) -> usize {
        let pending = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.entries)
        };
        self.wakeup.notify_all();
        // Dropped outside the lock: a task's captures may post back here.
        pending.len()
    }

    /// Whether the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Deadline of the earliest pending entry
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.lock().entries.peek().map(|head| head.deadline)
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether no entries are pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TaskQueue")
            .field("pending", &state.entries.len())
            .field("next_sequence", &state.next_sequence)
            .field("terminate_requested", &state.terminate_requested)
            .field("closed", &state.closed)
            .finish()
    }
}
