//! Spindle
//!
//! Per-thread message loops for cooperative task dispatch:
//! - **Task queue**: thread-safe, ordered by `(deadline, sequence)`
//! - **Thread registry**: at most one loop per thread, created on demand
//! - **Message loop**: runs the dispatch cycle on its owning thread
//! - **Task runner**: cloneable handle for posting to a loop from any thread
//! - **Task observers**: notified after every dispatched task
//! - **Loop threads**: dedicated OS threads that run a loop
//!
//! # Example
//!
//! ```rust,ignore
//! use spindle::{current, ensure_initialized_for_current_thread};
//! use std::time::Duration;
//!
//! ensure_initialized_for_current_thread();
//! let message_loop = current();
//! let runner = message_loop.task_runner();
//!
//! runner.post_task(|| println!("first"));
//! runner.post_delayed_task(|| current().terminate(), Duration::from_millis(5));
//! message_loop.run();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod defaults;
pub mod error;
pub mod message_loop;
pub mod observer;
pub mod queue;
pub mod registry;
pub mod runner;
pub mod sync;
pub mod thread;

pub use error::{LoopError, Result};
pub use message_loop::{LoopId, LoopState, LoopStats, MessageLoop};
pub use observer::TaskObserver;
pub use queue::{Task, TaskQueue};
pub use registry::{
    current, ensure_initialized_for_current_thread, is_initialized_for_current_thread,
    try_current,
};
pub use runner::TaskRunner;
pub use sync::AutoResetEvent;
pub use thread::{LoopThread, LoopThreadConfig};
