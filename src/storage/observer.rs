//! Observer registration

use super::change::ChangeEvent;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::error;

/// Callback signature for change observers
pub type ObserverFn = dyn Fn(&ChangeEvent) + Send + Sync;

/// A registered change callback
///
/// Two observers are equal when they share the same callback allocation, so keep a
/// clone of the handle to remove it later.
#[derive(Clone)]
pub struct Observer(Arc<ObserverFn>);

impl Observer {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        Observer(Arc::new(callback))
    }

    pub fn notify(&self, event: &ChangeEvent) {
        (self.0)(event)
    }
}

impl PartialEq for Observer {
    fn eq(&self, other: &Self) -> bool {
        // Compare data pointers only; vtable pointers are not unique.
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl Eq for Observer {}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Observer")
            .field(&(Arc::as_ptr(&self.0) as *const ()))
            .finish()
    }
}

/// Ordered observer list owned by one storage instance
///
/// Cloning shares the list, which is how deferred notification jobs reach it.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Arc<Mutex<Vec<Observer>>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Observer>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an observer; duplicates are kept
    pub fn add(&self, observer: Observer) {
        self.lock().push(observer);
    }

    /// Remove the first registration of `observer`, returns true if one was found
    pub fn remove(&self, observer: &Observer) -> bool {
        let mut observers = self.lock();
        match observers.iter().position(|o| o == observer) {
            Some(index) => {
                observers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current registrations
    pub fn snapshot(&self) -> Vec<Observer> {
        self.lock().clone()
    }

    /// Deliver `event` to every observer, in registration order
    ///
    /// Iterates over a snapshot taken without holding the lock, so observers may add
    /// or remove registrations from inside their callback. A panicking observer is
    /// logged and skipped.
    pub fn notify(&self, event: &ChangeEvent) {
        for observer in self.snapshot() {
            if panic::catch_unwind(AssertUnwindSafe(|| observer.notify(event))).is_err() {
                error!(keys = event.len(), "Observer panicked while handling a change event");
            }
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_observer(counter: &Arc<AtomicUsize>) -> Observer {
        let counter = counter.clone();
        Observer::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_equality_is_identity() {
        let counter = Arc::new(AtomicUsize::new(0));
        let a = counting_observer(&counter);
        let b = counting_observer(&counter);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_first_registration_only() {
        let counter = Arc::new(AtomicUsize::new(0));
        let observer = counting_observer(&counter);
        let set = ObserverSet::new();

        set.add(observer.clone());
        set.add(observer.clone());
        assert!(set.remove(&observer));
        assert_eq!(set.len(), 1);

        set.notify(&ChangeEvent::new());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let set = ObserverSet::new();

        assert!(!set.remove(&counting_observer(&counter)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_notify_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new();

        for i in 0..3 {
            let order = order.clone();
            set.add(Observer::new(move |_| order.lock().unwrap().push(i)));
        }

        set.notify(&ChangeEvent::new());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_observer_is_skipped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let set = ObserverSet::new();

        set.add(Observer::new(|_| panic!("observer failure")));
        set.add(counting_observer(&counter));

        set.notify(&ChangeEvent::new());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_self_removal_during_notify() {
        let set = ObserverSet::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Observer>>> = Arc::new(Mutex::new(None));

        let observer = {
            let set = set.clone();
            let slot = slot.clone();
            let counter = counter.clone();
            Observer::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = slot.lock().unwrap().take() {
                    set.remove(&me);
                }
            })
        };
        *slot.lock().unwrap() = Some(observer.clone());

        let tail = counting_observer(&counter);
        set.add(observer);
        set.add(tail);

        set.notify(&ChangeEvent::new());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(set.len(), 1);

        set.notify(&ChangeEvent::new());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
