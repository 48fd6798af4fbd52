#![forbid(unsafe_code)]

//! Dedicated worker thread that runs deferred calls.
//!
//! [`WorkerScheduler`] binds the core's deferred-call port to a single named
//! thread. Every task submitted through [`WorkerScheduler::scheduler`] is sent
//! over an unbounded channel and run on that thread in submission order, so
//! reactions never run on the thread that settled or subscribed.
//!
//! # Shutdown
//!
//! [`WorkerScheduler::shutdown`] closes the channel, lets the thread finish
//! every task already submitted, then joins it. Tasks submitted after that
//! point are dropped with a warning. Dropping the scheduler shuts it down.
//!
//! # Failure Modes
//!
//! - **Task panics**: caught on the worker thread and logged; the thread keeps
//!   serving later tasks. Reaction handler panics never get here, since
//!   dispatch already converts them into failures.
//!
//! # Example
//!
//! ```
//! use settle_core::{Promise, Value};
//! use settle_runtime::config::WorkerConfig;
//! use settle_runtime::worker::WorkerScheduler;
//! use std::sync::mpsc;
//!
//! let worker = WorkerScheduler::start(WorkerConfig::default()).unwrap();
//! let (tx, rx) = mpsc::channel();
//! let p = Promise::resolved(&worker.scheduler(), 21);
//! let _ = p.then(move |v| {
//!     let doubled = v.as_int().unwrap_or(0) * 2;
//!     tx.send(doubled).ok();
//!     Ok(Value::from(doubled))
//! });
//! assert_eq!(rx.recv().unwrap(), 42);
//! worker.shutdown();
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use settle_core::error::panic_message;
use settle_core::{Schedule, Scheduler, Task};
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::error::{Result, RuntimeError};

struct WorkerShared {
    name: String,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    tasks_run: AtomicU64,
    tasks_dropped: AtomicU64,
}

impl WorkerShared {
    fn sender(&self) -> MutexGuard<'_, Option<mpsc::Sender<Task>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn submit(&self, task: Task) -> Result<()> {
        let guard = self.sender();
        let sent = match guard.as_ref() {
            Some(tx) => tx.send(task).is_ok(),
            None => false,
        };
        drop(guard);
        if sent {
            Ok(())
        } else {
            self.tasks_dropped.fetch_add(1, Ordering::Relaxed);
            Err(RuntimeError::ShutDown {
                name: self.name.clone(),
            })
        }
    }
}

/// The [`Schedule`] port handed to promises.
struct WorkerPort {
    shared: Arc<WorkerShared>,
}

impl Schedule for WorkerPort {
    fn schedule_later(&self, task: Task) {
        if let Err(err) = self.shared.submit(task) {
            warn!(worker = %self.shared.name, error = %err, "deferred call dropped");
        }
    }
}

/// Handle to a running worker thread.
pub struct WorkerScheduler {
    shared: Arc<WorkerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerScheduler {
    /// Spawn the worker thread.
    pub fn start(config: WorkerConfig) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Task>();
        let shared = Arc::new(WorkerShared {
            name: config.thread_name.clone(),
            sender: Mutex::new(Some(tx)),
            tasks_run: AtomicU64::new(0),
            tasks_dropped: AtomicU64::new(0),
        });

        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker_loop(&loop_shared, rx))
            .map_err(|source| RuntimeError::Spawn {
                name: config.thread_name.clone(),
                source,
            })?;

        debug!(worker = %config.thread_name, "worker started");
        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// A scheduler that submits onto this worker.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(WorkerPort {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Submit a task directly, reporting whether the worker accepted it.
    pub fn submit(&self, task: Task) -> Result<()> {
        self.shared.submit(task)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Number of tasks the worker has finished running.
    #[must_use]
    pub fn tasks_run(&self) -> u64 {
        self.shared.tasks_run.load(Ordering::Acquire)
    }

    /// Number of tasks refused because the worker had shut down.
    #[must_use]
    pub fn tasks_dropped(&self) -> u64 {
        self.shared.tasks_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.sender().is_some()
    }

    /// Stop accepting tasks, finish the queued ones, and join the thread.
    ///
    /// Idempotent. When called from the worker thread itself the join is
    /// skipped; the thread exits once the current task returns.
    pub fn shutdown(&self) {
        let sender = self.shared.sender().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(worker = %self.shared.name, "worker thread exited abnormally");
            }
        }
        debug!(
            worker = %self.shared.name,
            tasks_run = self.tasks_run(),
            "worker stopped"
        );
    }
}

impl Drop for WorkerScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerScheduler")
            .field("name", &self.shared.name)
            .field("running", &self.is_running())
            .field("tasks_run", &self.tasks_run())
            .finish()
    }
}

fn worker_loop(shared: &WorkerShared, rx: mpsc::Receiver<Task>) {
    // Ends once every sender is gone and the channel is drained.
    for task in rx {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            let message = panic_message(payload.as_ref());
            warn!(worker = %shared.name, %message, "deferred call panicked");
        }
        shared.tasks_run.fetch_add(1, Ordering::Release);
    }
}
