//! Default constants for loop and loop-thread configuration.

/// Name given to loop threads spawned without an explicit name.
pub const DEFAULT_LOOP_THREAD_NAME: &str = "spindle-loop";

/// Initial capacity of a task queue's heap.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Initial capacity of a loop's observer list.
pub const DEFAULT_OBSERVER_CAPACITY: usize = 4;
