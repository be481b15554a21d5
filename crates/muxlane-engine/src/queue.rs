use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Unbounded thread-safe queue: push always succeeds, pop blocks on empty.
///
/// Bounding is the protocol's job (credit windows), not the queue's. The
/// engines rely on push never failing so that wakeup sentinels can always
/// be injected, even from a terminal-state transition.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    inner: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append an entry and wake one blocked popper.
    pub fn push(&self, value: T) {
        let mut q = self.inner.lock();
        q.push_back(value);
        self.available.notify_one();
    }

    /// Remove and return the head entry, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        let mut q = self.inner.lock();
        loop {
            if let Some(value) = q.pop_front() {
                return value;
            }
            self.available.wait(&mut q);
        }
    }

    /// True if the queue currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
