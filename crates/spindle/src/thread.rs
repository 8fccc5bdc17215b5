//! Dedicated loop threads
//!
//! [`LoopThread`] spawns a named OS thread, initializes its message loop and
//! runs it, handing the loop's [`TaskRunner`] back to the spawner. Dropping
//! or joining the handle posts a termination task and joins the thread.
//! Tasks already due ahead of that termination task still run; later ones
//! are dropped with the loop. [`TaskRunner::terminate`] stops the loop
//! without draining the due backlog first.

use crate::defaults::DEFAULT_LOOP_THREAD_NAME;
use crate::error::{LoopError, Result};
use crate::registry;
use crate::runner::TaskRunner;
use crossbeam::channel;
use log::{debug, warn};
use std::thread::{self, JoinHandle};

/// Loop thread configuration
#[derive(Debug, Clone)]
pub struct LoopThreadConfig {
    /// OS thread name
    pub name: String,

    /// Stack size in bytes (None = platform default)
    pub stack_size: Option<usize>,
}

impl LoopThreadConfig {
    /// Configuration for a thread called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: None,
        }
    }

    /// Set the thread's stack size
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl Default for LoopThreadConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOOP_THREAD_NAME)
    }
}

/// An OS thread running its own message loop.
pub struct LoopThread {
    name: String,
    runner: TaskRunner,
    handle: Option<JoinHandle<()>>,
}

impl LoopThread {
    /// Spawn the thread and wait until its loop accepts tasks.
    pub fn spawn(config: LoopThreadConfig) -> Result<Self> {
        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(bytes) = config.stack_size {
            builder = builder.stack_size(bytes);
        }

        let (runner_tx, runner_rx) = channel::bounded(1);
        let handle = builder.spawn(move || {
            registry::ensure_initialized_for_current_thread();
            let message_loop = registry::current();
            if runner_tx.send(message_loop.task_runner()).is_err() {
                return;
            }
            message_loop.run();
        })?;

        match runner_rx.recv() {
            Ok(runner) => {
                debug!("spawned loop thread '{}' ({})", config.name, runner.loop_id());
                Ok(Self {
                    name: config.name,
                    runner,
                    handle: Some(handle),
                })
            }
            Err(_) => {
                let _ = handle.join();
                Err(LoopError::ThreadPanicked(config.name))
            }
        }
    }

    /// Spawn a thread with default settings and the given name
    pub fn with_name(name: impl Into<String>) -> Result<Self> {
        Self::spawn(LoopThreadConfig::new(name))
    }

    /// Runner posting to this thread's loop
    pub fn task_runner(&self) -> TaskRunner {
        self.runner.clone()
    }

    /// OS thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Terminate the loop and join the thread.
    ///
    /// Reports a loop whose task panicked as [`LoopError::ThreadPanicked`].
    pub fn join(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.runner.post_task(|| registry::current().terminate());

        if self.runner.runs_tasks_on_current_thread() {
            warn!(
                "loop thread '{}' dropped from its own loop; detaching instead of joining",
                self.name
            );
            return Ok(());
        }

        let joined = handle.join();
        debug!("joined loop thread '{}'", self.name);
        joined.map_err(|_| LoopError::ThreadPanicked(self.name.clone()))
    }
}

impl Drop for LoopThread {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!("{err}");
        }
    }
}

impl std::fmt::Debug for LoopThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopThread")
            .field("name", &self.name)
            .field("runner", &self.runner)
            .field("joined", &self.handle.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_config_defaults() {
        let config = LoopThreadConfig::default();
        assert_eq!(config.name, DEFAULT_LOOP_THREAD_NAME);
        assert_eq!(config.stack_size, None);

        let config = LoopThreadConfig::new("io").stack_size(256 * 1024);
        assert_eq!(config.name, "io");
        assert_eq!(config.stack_size, Some(256 * 1024));
    }

    #[test]
    fn test_spawn_and_join() {
        let loop_thread = LoopThread::with_name("spindle-test").unwrap();
        assert_eq!(loop_thread.name(), "spindle-test");

        let runner = loop_thread.task_runner();
        assert!(!runner.runs_tasks_on_current_thread());

        let name = Arc::new(parking_lot::Mutex::new(None));
        let seen = Arc::clone(&name);
        assert!(runner.run_and_wait(move || {
            *seen.lock() = thread::current().name().map(str::to_owned);
        }));
        assert_eq!(name.lock().as_deref(), Some("spindle-test"));

        loop_thread.join().unwrap();
        assert!(!runner.is_alive());
    }

    #[test]
    fn test_due_tasks_run_before_join_returns() {
        let loop_thread = LoopThread::spawn(LoopThreadConfig::default()).unwrap();
        let runner = loop_thread.task_runner();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let hits = Arc::clone(&hits);
            runner.post_task(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(loop_thread);

        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_far_delayed_tasks_are_dropped_on_join() {
        let loop_thread = LoopThread::with_name("spindle-drop").unwrap();
        let runner = loop_thread.task_runner();
        let witness = Arc::new(());

        let captured = Arc::clone(&witness);
        runner.post_delayed_task(move || drop(captured), Duration::from_secs(60));
        loop_thread.join().unwrap();

        assert_eq!(Arc::strong_count(&witness), 1);
    }

    #[test]
    fn test_panicking_task_is_reported_on_join() {
        let loop_thread = LoopThread::with_name("spindle-panic").unwrap();
        loop_thread.task_runner().post_task(|| panic!("task failure"));

        match loop_thread.join() {
            Err(LoopError::ThreadPanicked(name)) => assert_eq!(name, "spindle-panic"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
