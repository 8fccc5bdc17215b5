//! Integration tests for dedicated loop threads and cross-loop hand-offs

use spindle::{current, AutoResetEvent, LoopThread, LoopThreadConfig, TaskObserver};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_loop_threads_are_distinct() {
    init_logging();
    let ui = LoopThread::with_name("ui").unwrap();
    let gpu = LoopThread::with_name("gpu").unwrap();

    assert_ne!(ui.task_runner().loop_id(), gpu.task_runner().loop_id());

    ui.join().unwrap();
    gpu.join().unwrap();
}

#[test]
fn test_hand_off_between_loops() {
    init_logging();
    let ui = LoopThread::with_name("ui").unwrap();
    let gpu = LoopThread::with_name("gpu").unwrap();
    let trace = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(AutoResetEvent::new());

    // ui -> gpu -> ui continuation, then release the poster.
    {
        let trace = Arc::clone(&trace);
        let done = Arc::clone(&done);
        let ui_runner = ui.task_runner();
        let gpu_runner = gpu.task_runner();
        ui.task_runner().post_task(move || {
            trace.lock().unwrap().push(thread::current().name().map(str::to_owned));
            gpu_runner.post_task(move || {
                trace.lock().unwrap().push(thread::current().name().map(str::to_owned));
                ui_runner.post_task(move || {
                    trace.lock().unwrap().push(thread::current().name().map(str::to_owned));
                    done.signal();
                });
            });
        });
    }

    assert!(!done.wait_with_timeout(Duration::from_secs(5)));
    let trace = trace.lock().unwrap().clone();
    assert_eq!(
        trace,
        vec![
            Some("ui".to_string()),
            Some("gpu".to_string()),
            Some("ui".to_string()),
        ]
    );
}

#[test]
fn test_run_and_wait_blocks_until_done() {
    init_logging();
    let io = LoopThread::spawn(LoopThreadConfig::new("io").stack_size(512 * 1024)).unwrap();
    let runner = io.task_runner();
    let value = Arc::new(AtomicUsize::new(0));

    let slot = Arc::clone(&value);
    let ran = runner.run_and_wait(move || {
        thread::sleep(Duration::from_millis(10));
        slot.store(42, Ordering::SeqCst);
    });

    assert!(ran);
    assert_eq!(value.load(Ordering::SeqCst), 42);
}

#[test]
fn test_run_and_wait_after_join_returns_false() {
    init_logging();
    let loop_thread = LoopThread::with_name("short-lived").unwrap();
    let runner = loop_thread.task_runner();
    loop_thread.join().unwrap();

    assert!(!runner.is_alive());
    assert!(!runner.run_and_wait(|| unreachable!()));
}

thread_local! {
    static INSTALLED: RefCell<Vec<Rc<dyn TaskObserver>>> = const { RefCell::new(Vec::new()) };
}

#[test]
fn test_observer_installed_from_posted_task() {
    init_logging();
    let loop_thread = LoopThread::with_name("observed").unwrap();
    let runner = loop_thread.task_runner();
    let notifications = Arc::new(AtomicUsize::new(0));

    // Observers are thread-confined, so install one from the loop's own thread.
    let counter = Arc::clone(&notifications);
    runner.run_and_wait(move || {
        let observer: Rc<dyn TaskObserver> = Rc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        current().add_task_observer(&observer);
        INSTALLED.with(|installed| installed.borrow_mut().push(observer));
    });

    for _ in 0..5 {
        runner.post_task(|| {});
    }
    loop_thread.join().unwrap();

    // The installing task, five plain tasks and the termination task.
    assert_eq!(notifications.load(Ordering::SeqCst), 7);
}
