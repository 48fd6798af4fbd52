#![forbid(unsafe_code)]

//! The deferred-call port reactions are submitted to.
//!
//! The core never runs a reaction on the stack that caused it. Instead every
//! dispatch is packaged as a [`Task`] and handed to a [`Schedule`]
//! implementation, which must run it after the current synchronous execution
//! completes, in submission order.
//!
//! [`ManualQueue`] is the deterministic binding: nothing runs until the owner
//! drives the queue with [`ManualQueue::run_one`] or
//! [`ManualQueue::run_until_idle`]. Host bindings backed by threads or timers
//! live in `settle-runtime`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A FIFO deferred-call service.
///
/// # Contract
///
/// - `schedule_later` must not run `task` before returning.
/// - Tasks run in the order they were submitted.
pub trait Schedule: Send + Sync {
    fn schedule_later(&self, task: Task);
}

/// Shared handle to a [`Schedule`] implementation.
///
/// Every promise keeps one; derived promises inherit their source's.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<dyn Schedule>,
}

impl Scheduler {
    #[must_use]
    pub fn new(schedule: impl Schedule + 'static) -> Self {
        Self {
            inner: Arc::new(schedule),
        }
    }

    #[must_use]
    pub fn from_arc(schedule: Arc<dyn Schedule>) -> Self {
        Self { inner: schedule }
    }

    pub fn schedule_later(&self, task: Task) {
        self.inner.schedule_later(task);
    }

    /// Whether both handles submit to the same service.
    #[must_use]
    pub fn same_service(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

// ─── ManualQueue ─────────────────────────────────────────────────────────────

/// A deterministic, manually-driven task queue.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct ManualQueue {
    tasks: Arc<Mutex<VecDeque<Task>>>,
}

impl ManualQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`Scheduler`] that submits into this queue.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.clone())
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run the oldest queued task. Returns `false` if the queue was empty.
    pub fn run_one(&self) -> bool {
        // Pop before running so the task can schedule more work.
        let task = self.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks submitted by the
    /// tasks being run. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Schedule for ManualQueue {
    fn schedule_later(&self, task: Task) {
        self.lock().push_back(task);
    }
}

impl fmt::Debug for ManualQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualQueue")
            .field("pending", &self.len())
            .finish()
    }
}
