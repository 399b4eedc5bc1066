//! Observable value with change notification, plus memoized derivations.
//!
//! # Design
//!
//! [`Observable<T>`] wraps a value in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). When the value changes (determined by `PartialEq`),
//! all live subscribers are notified in registration order.
//!
//! [`Derived<T, U>`] is a pure function over an observable, recomputed only
//! when the source version moves. Active part, resolved capability and
//! blocked-by state are all derivations of the committed layout.
//!
//! # Failure Modes
//!
//! - **Subscriber leak**: If `Subscription` guards are stored indefinitely
//!   without being dropped, callbacks accumulate. Dead weak references are
//!   pruned lazily during `notify()`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct ObservableInner<T> {
    value: T,
    version: u64,
    /// Pruned on notify.
    subscribers: Vec<CallbackWeak<T>>,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** inner state.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing mutation.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Set a new value, notifying subscribers if it differs.
    ///
    /// Subscribers may read the observable and may call `set` again; the
    /// borrow is released before callbacks run.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Modify the value in place via a closure.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value != old {
                inner.version += 1;
                true
            } else {
                false
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Subscribe to value changes.
    ///
    /// Dropping the returned guard unsubscribes the callback.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        let weak = Rc::downgrade(&strong);
        self.inner.borrow_mut().subscribers.push(weak);
        Subscription {
            _guard: Box::new(strong),
        }
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Derive a memoized value from this observable.
    pub fn derive<U: Clone>(&self, compute: impl Fn(&T) -> U + 'static) -> Derived<T, U> {
        Derived {
            source: self.clone(),
            compute: Box::new(compute),
            cache: RefCell::new(None),
        }
    }

    fn notify(&self) {
        // Collect first so no borrow is held while callbacks run.
        let (callbacks, value, version) = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks: Vec<CallbackRc<T>> = inner
                .subscribers
                .iter()
                .filter_map(Weak::upgrade)
                .collect();
            (callbacks, inner.value.clone(), inner.version)
        };
        if callbacks.is_empty() {
            return;
        }
        trace!(version, subscribers = callbacks.len(), "observable changed");
        for callback in &callbacks {
            callback(&value);
        }
    }
}

/// RAII guard for a subscriber callback.
pub struct Subscription {
    /// Keeps the callback `Rc` alive; the observable only holds a `Weak`.
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Memoized pure function over an [`Observable`].
pub struct Derived<T, U> {
    source: Observable<T>,
    compute: Box<dyn Fn(&T) -> U>,
    /// `(source version, value)` of the last computation.
    cache: RefCell<Option<(u64, U)>>,
}

impl<T: Clone + PartialEq + 'static, U: Clone> Derived<T, U> {
    /// Current derived value, recomputed only if the source changed.
    #[must_use]
    pub fn get(&self) -> U {
        let version = self.source.version();
        if let Some((cached_version, value)) = self.cache.borrow().as_ref()
            && *cached_version == version
        {
            return value.clone();
        }
        let value = self.source.with(|source| (self.compute)(source));
        *self.cache.borrow_mut() = Some((version, value.clone()));
        value
    }

    /// Whether the next `get` would recompute.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.cache
            .borrow()
            .as_ref()
            .is_none_or(|(version, _)| *version != self.source.version())
    }
}

impl<T, U> std::fmt::Debug for Derived<T, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derived").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_set_basic() {
        let obs = Observable::new(42);
        assert_eq!(obs.get(), 42);
        assert_eq!(obs.version(), 0);

        obs.set(99);
        assert_eq!(obs.get(), 99);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn no_change_no_version_bump() {
        let obs = Observable::new(42);
        obs.set(42);
        obs.update(|v| *v = 42);
        assert_eq!(obs.version(), 0);
    }

    #[test]
    fn subscribers_run_in_order_until_dropped() {
        let obs = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let first_log = Rc::clone(&log);
        let first = obs.subscribe(move |v| first_log.borrow_mut().push(("first", *v)));
        let second_log = Rc::clone(&log);
        let _second = obs.subscribe(move |v| second_log.borrow_mut().push(("second", *v)));

        obs.set(1);
        drop(first);
        obs.set(2);

        assert_eq!(
            *log.borrow(),
            vec![("first", 1), ("second", 1), ("second", 2)]
        );
        assert_eq!(obs.subscriber_count(), 1);
    }

    #[test]
    fn subscriber_may_read_the_observable() {
        let obs = Observable::new(String::from("a"));
        let seen = Rc::new(RefCell::new(String::new()));
        let reader = obs.clone();
        let seen_clone = Rc::clone(&seen);
        let _sub = obs.subscribe(move |_| *seen_clone.borrow_mut() = reader.get());
        obs.set("b".into());
        assert_eq!(*seen.borrow(), "b");
    }

    #[test]
    fn derived_recomputes_only_on_change() {
        let obs = Observable::new(vec![1, 2, 3]);
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        let sum = obs.derive(move |v: &Vec<i32>| {
            calls_clone.set(calls_clone.get() + 1);
            v.iter().sum::<i32>()
        });

        assert!(sum.is_stale());
        assert_eq!(sum.get(), 6);
        assert_eq!(sum.get(), 6);
        assert_eq!(calls.get(), 1);

        obs.update(|v| v.push(4));
        assert!(sum.is_stale());
        assert_eq!(sum.get(), 10);
        assert_eq!(calls.get(), 2);
    }
}
