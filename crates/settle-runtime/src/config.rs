#![forbid(unsafe_code)]

//! Configuration for the host bindings.

/// Default name for the worker thread.
pub const DEFAULT_WORKER_THREAD_NAME: &str = "settle-worker";

/// Maximum number of microtasks a single lab-loop drain may run.
///
/// A reaction chain that keeps scheduling itself never goes idle; the budget
/// turns that into an error instead of a hang.
pub const DEFAULT_MICROTASK_BUDGET: usize = 100_000;

/// Maximum number of timers a single lab-loop run may fire.
pub const DEFAULT_TIMER_BUDGET: usize = 100_000;

/// Configuration for [`WorkerScheduler`](crate::worker::WorkerScheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_WORKER_THREAD_NAME.to_string(),
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Configuration for [`LabLoop`](crate::lab::LabLoop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub microtask_budget: usize,
    pub timer_budget: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            microtask_budget: DEFAULT_MICROTASK_BUDGET,
            timer_budget: DEFAULT_TIMER_BUDGET,
        }
    }
}

impl LoopConfig {
    #[must_use]
    pub fn with_microtask_budget(mut self, budget: usize) -> Self {
        self.microtask_budget = budget;
        self
    }

    #[must_use]
    pub fn with_timer_budget(mut self, budget: usize) -> Self {
        self.timer_budget = budget;
        self
    }
}
