//! Single-task executor for read-modify-write sequences.
//!
//! [`SerialExecutor`] owns a piece of state and runs submitted tasks against
//! it strictly one at a time, in submission order. A task that submits
//! another task (directly or through a subscriber it triggers) does not run
//! it inline: the new task is queued and runs after the current one returns.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

type Task<S> = Box<dyn FnOnce(&mut S)>;

struct ExecutorInner<S> {
    state: RefCell<S>,
    queue: RefCell<VecDeque<Task<S>>>,
    running: Cell<bool>,
}

/// Serializes tasks over shared state.
///
/// Cloning creates another handle to the same executor.
pub struct SerialExecutor<S> {
    inner: Rc<ExecutorInner<S>>,
}

impl<S> Clone for SerialExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for SerialExecutor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("queued", &self.inner.queue.borrow().len())
            .field("running", &self.inner.running.get())
            .finish()
    }
}

/// Clears the running flag even if a task panics.
struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<S: 'static> SerialExecutor<S> {
    #[must_use]
    pub fn new(state: S) -> Self {
        Self {
            inner: Rc::new(ExecutorInner {
                state: RefCell::new(state),
                queue: RefCell::new(VecDeque::new()),
                running: Cell::new(false),
            }),
        }
    }

    /// Queue `task`; runs the queue to completion unless already running.
    pub fn submit(&self, task: impl FnOnce(&mut S) + 'static) {
        self.inner.queue.borrow_mut().push_back(Box::new(task));
        if self.inner.running.get() {
            return;
        }
        self.inner.running.set(true);
        let _guard = RunningGuard(&self.inner.running);
        loop {
            let next = self.inner.queue.borrow_mut().pop_front();
            let Some(task) = next else { break };
            let mut state = self.inner.state.borrow_mut();
            task(&mut state);
        }
    }

    /// Read the state between tasks.
    ///
    /// Returns `None` while a task is running.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        let state = self.inner.state.try_borrow().ok()?;
        Some(f(&state))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.queue.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_run_in_submission_order() {
        let executor = SerialExecutor::new(Vec::new());
        executor.submit(|log: &mut Vec<u32>| log.push(1));
        executor.submit(|log| log.push(2));
        assert_eq!(executor.read(Clone::clone), Some(vec![1, 2]));
    }

    #[test]
    fn reentrant_submission_is_deferred() {
        let executor = SerialExecutor::new(Vec::new());
        let handle = executor.clone();
        executor.submit(move |log: &mut Vec<&'static str>| {
            log.push("outer-start");
            handle.submit(|log| log.push("inner"));
            assert_eq!(handle.queued(), 1);
            log.push("outer-end");
        });
        assert_eq!(
            executor.read(Clone::clone),
            Some(vec!["outer-start", "outer-end", "inner"])
        );
        assert!(!executor.is_running());
    }

    #[test]
    fn read_during_task_is_refused() {
        let executor = SerialExecutor::new(0u32);
        let handle = executor.clone();
        let seen = Rc::new(Cell::new(true));
        let seen_clone = Rc::clone(&seen);
        executor.submit(move |value| {
            *value += 1;
            seen_clone.set(handle.read(|v| *v).is_some());
        });
        assert!(!seen.get());
        assert_eq!(executor.read(|v| *v), Some(1));
    }

    #[test]
    fn panicking_task_does_not_wedge_the_executor() {
        let executor = SerialExecutor::new(0u32);
        let handle = executor.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handle.submit(|_| panic!("task failed"));
        }));
        assert!(result.is_err());
        assert!(!executor.is_running());
        executor.submit(|value| *value = 7);
        assert_eq!(executor.read(|v| *v), Some(7));
    }
}
