//! Microtask scheduling.
//!
//! All continuation dispatch runs through a single FIFO microtask queue.
//! Registering a continuation never runs it inline, even when the value it
//! observes has already settled; it runs when the driver next drains the
//! queue. That is the whole of the concurrency model: single-threaded,
//! cooperative, no implementation-owned threads or timers.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A queued continuation.
pub struct Microtask {
    callback: Box<dyn FnOnce()>,
}

impl Microtask {
    /// Creates a new Microtask from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the microtask, consuming it.
    pub fn run(self) {
        (self.callback)()
    }
}

impl std::fmt::Debug for Microtask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Microtask {{ ... }}")
    }
}

/// A FIFO queue of microtasks.
#[derive(Debug, Default)]
pub struct MicrotaskQueue {
    queue: VecDeque<Microtask>,
}

impl MicrotaskQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Adds a microtask to the end of the queue.
    pub fn enqueue(&mut self, microtask: Microtask) {
        self.queue.push_back(microtask);
    }

    /// Removes and returns the next microtask.
    pub fn dequeue(&mut self) -> Option<Microtask> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of queued microtasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

/// A cloneable handle to a shared microtask queue.
///
/// Every promise and the normalization context hold clones of one
/// scheduler, so all continuations interleave on one queue in
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: Rc<RefCell<MicrotaskQueue>>,
}

impl Scheduler {
    /// Creates a scheduler with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a continuation to run on the next drain.
    pub fn enqueue<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        self.queue.borrow_mut().enqueue(Microtask::new(f));
    }

    /// Returns true if no microtasks are pending.
    pub fn is_idle(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Returns the number of pending microtasks.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Drains the queue until empty.
    ///
    /// Microtasks enqueued while draining are also processed before this
    /// method returns. The borrow is released around each `run` so that
    /// running tasks can enqueue more.
    pub fn run_until_idle(&self) {
        loop {
            let next = self.queue.borrow_mut().dequeue();
            match next {
                Some(task) => task.run(),
                None => break,
            }
        }
    }
}
