//! Task observers
//!
//! An observer is notified on the loop's thread after every task the loop
//! dispatches. The loop only keeps a [`Weak`] reference: the registrant owns
//! the observer and should remove it before dropping it. An observer dropped
//! while still registered is skipped rather than called.

use crate::defaults::DEFAULT_OBSERVER_CAPACITY;
use std::rc::{Rc, Weak};

/// Capability notified once after each dispatched task.
pub trait TaskObserver {
    /// Called after a task body has returned.
    fn did_process_task(&self);
}

impl<F> TaskObserver for F
where
    F: Fn(),
{
    fn did_process_task(&self) {
        self()
    }
}

/// Ordered, non-owning list of observers
pub(crate) struct ObserverList {
    observers: Vec<Weak<dyn TaskObserver>>,
}

impl ObserverList {
    pub(crate) fn new() -> Self {
        Self {
            observers: Vec::with_capacity(DEFAULT_OBSERVER_CAPACITY),
        }
    }

    /// Register `observer` at the end of the list; a duplicate add is ignored.
    pub(crate) fn add(&mut self, observer: &Rc<dyn TaskObserver>) {
        let weak = Rc::downgrade(observer);
        if !self.observers.iter().any(|o| o.ptr_eq(&weak)) {
            self.observers.push(weak);
        }
    }

    /// Returns whether the observer was registered.
    pub(crate) fn remove(&mut self, observer: &Rc<dyn TaskObserver>) -> bool {
        let weak = Rc::downgrade(observer);
        let before = self.observers.len();
        self.observers.retain(|o| !o.ptr_eq(&weak));
        self.observers.len() != before
    }

    /// Observers still alive, in registration order.
    ///
    /// Taking a snapshot lets an observer add or remove observers while being notified.
    pub(crate) fn snapshot(&mut self) -> Vec<Rc<dyn TaskObserver>> {
        self.observers.retain(|o| o.strong_count() > 0);
        self.observers.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_add_and_snapshot_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let first: Rc<dyn TaskObserver> = {
            let calls = Rc::clone(&calls);
            Rc::new(move || calls.borrow_mut().push("first"))
        };
        let second: Rc<dyn TaskObserver> = {
            let calls = Rc::clone(&calls);
            Rc::new(move || calls.borrow_mut().push("second"))
        };

        let mut list = ObserverList::new();
        list.add(&first);
        list.add(&second);

        for observer in list.snapshot() {
            observer.did_process_task();
        }
        assert_eq!(*calls.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_add_is_ignored() {
        let observer: Rc<dyn TaskObserver> = Rc::new(|| {});
        let mut list = ObserverList::new();

        list.add(&observer);
        list.add(&observer);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_remove() {
        let kept: Rc<dyn TaskObserver> = Rc::new(|| {});
        let removed: Rc<dyn TaskObserver> = Rc::new(|| {});
        let mut list = ObserverList::new();
        list.add(&kept);
        list.add(&removed);

        assert!(list.remove(&removed));
        assert!(!list.remove(&removed));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_dropped_observer_is_skipped() {
        let count = Rc::new(Cell::new(0));
        let observer: Rc<dyn TaskObserver> = {
            let count = Rc::clone(&count);
            Rc::new(move || count.set(count.get() + 1))
        };
        let mut list = ObserverList::new();
        list.add(&observer);
        drop(observer);

        assert!(list.snapshot().is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(count.get(), 0);
    }
}
