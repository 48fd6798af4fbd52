#![forbid(unsafe_code)]

//! Deterministic host event loop for tests and simulations.
//!
//! [`LabLoop`] models a host with two queues:
//!
//! - a **microtask** queue, which is where promise reactions go, drained to
//!   empty after every macrotask;
//! - a **timer** queue driven by a manually-advanced [`LabClock`].
//!
//! Nothing runs on its own. The owner calls [`LabLoop::advance`] or
//! [`LabLoop::run_until_idle`], and every run is reproducible: timers fire in
//! due-time order, ties broken by insertion order.
//!
//! # Example
//!
//! ```
//! use settle_core::{Promise, Status, Value};
//! use settle_runtime::lab::LabLoop;
//! use web_time::Duration;
//!
//! let lab = LabLoop::default();
//! let timers = lab.clone();
//! let p = Promise::new(&lab.scheduler(), move |succeed, _| {
//!     timers.set_timeout(Duration::from_millis(1), move || {
//!         succeed.succeed("late");
//!     });
//!     Ok(())
//! });
//! assert_eq!(p.status(), Status::Unsettled);
//!
//! lab.advance(Duration::from_millis(1)).unwrap();
//! assert_eq!(p.outcome().map(|o| o.into_result()), Some(Ok(Value::from("late"))));
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use settle_core::{ManualQueue, Scheduler, Task};
use tracing::trace;
use web_time::{Duration, Instant};

use crate::config::LoopConfig;
use crate::error::{Result, RuntimeError};

// ─── LabClock ────────────────────────────────────────────────────────────────

/// A manually-advanceable clock.
///
/// All clones share the same time.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Arc<AtomicU64>,
}

impl LabClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_us: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.offset_us
            .fetch_add(duration_us(delta), Ordering::Release);
    }

    /// Microseconds elapsed since the clock was created.
    #[must_use]
    pub fn elapsed_us(&self) -> u64 {
        self.offset_us.load(Ordering::Acquire)
    }

    /// Current lab time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.epoch + Duration::from_micros(self.elapsed_us())
    }

    fn advance_to_us(&self, target_us: u64) {
        self.offset_us.fetch_max(target_us, Ordering::AcqRel);
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_us(d: Duration) -> u64 {
    d.as_micros().min(u64::MAX as u128) as u64
}

// ─── Timers ──────────────────────────────────────────────────────────────────

/// Handle returned by [`LabLoop::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct TimerQueue {
    next_seq: u64,
    /// Keyed by `(due_us, seq)` so iteration order is firing order.
    pending: BTreeMap<(u64, u64), Task>,
}

impl TimerQueue {
    fn insert(&mut self, due_us: u64, task: Task) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert((due_us, seq), task);
        TimerId(seq)
    }

    fn remove(&mut self, id: TimerId) -> bool {
        let key = self.pending.keys().find(|(_, seq)| *seq == id.0).copied();
        key.is_some_and(|k| self.pending.remove(&k).is_some())
    }

    fn next_due(&self) -> Option<u64> {
        self.pending.keys().next().map(|(due, _)| *due)
    }

    fn pop_due(&mut self, up_to_us: u64) -> Option<(u64, u64, Task)> {
        let (&(due, seq), _) = self.pending.first_key_value()?;
        if due > up_to_us {
            return None;
        }
        self.pending.remove(&(due, seq)).map(|task| (due, seq, task))
    }
}

// ─── LabLoop ─────────────────────────────────────────────────────────────────

struct LoopInner {
    config: LoopConfig,
    clock: LabClock,
    microtasks: ManualQueue,
    timers: Mutex<TimerQueue>,
}

/// A deterministic microtask + timer loop.
///
/// Cloning yields another handle to the same loop, so timers can be armed
/// from inside producers and handlers.
#[derive(Clone)]
pub struct LabLoop {
    inner: Arc<LoopInner>,
}

impl Default for LabLoop {
    fn default() -> Self {
        Self::new(LoopConfig::default())
    }
}

impl LabLoop {
    #[must_use]
    pub fn new(config: LoopConfig) -> Self {
        Self::with_clock(config, LabClock::new())
    }

    /// Build a loop on an existing clock (shared with other lab components).
    #[must_use]
    pub fn with_clock(config: LoopConfig, clock: LabClock) -> Self {
        Self {
            inner: Arc::new(LoopInner {
                config,
                clock,
                microtasks: ManualQueue::new(),
                timers: Mutex::new(TimerQueue::default()),
            }),
        }
    }

    /// Scheduler whose deferred calls land on the microtask queue.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        self.inner.microtasks.scheduler()
    }

    #[must_use]
    pub fn clock(&self) -> &LabClock {
        &self.inner.clock
    }

    #[must_use]
    pub fn config(&self) -> LoopConfig {
        self.inner.config
    }

    /// Current lab time in microseconds since the loop's clock started.
    #[must_use]
    pub fn now_us(&self) -> u64 {
        self.inner.clock.elapsed_us()
    }

    #[must_use]
    pub fn pending_microtasks(&self) -> usize {
        self.inner.microtasks.len()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers().pending.len()
    }

    /// Arm a timer that runs `task` once `delay` has elapsed on the lab clock.
    pub fn set_timeout(&self, delay: Duration, task: impl FnOnce() + Send + 'static) -> TimerId {
        let due_us = self.now_us().saturating_add(duration_us(delay));
        let id = self.timers().insert(due_us, Box::new(task));
        trace!(timer_id = id.raw(), due_us, "timer armed");
        id
    }

    /// Disarm a timer. Returns `false` if it already fired or was cleared.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.timers().remove(id)
    }

    /// Drain the microtask queue, including microtasks queued while draining.
    ///
    /// Returns how many ran.
    pub fn run_microtasks(&self) -> Result<usize> {
        let budget = self.inner.config.microtask_budget;
        let mut ran = 0;
        while self.inner.microtasks.run_one() {
            ran += 1;
            if ran >= budget && !self.inner.microtasks.is_empty() {
                return Err(RuntimeError::MicrotaskBudgetExceeded { budget });
            }
        }
        Ok(ran)
    }

    /// Move the clock forward by `delta`, firing every timer that comes due.
    ///
    /// Pending microtasks run first. Each timer runs at its own due time and
    /// is followed by a full microtask drain. Returns the number of timers
    /// fired.
    pub fn advance(&self, delta: Duration) -> Result<usize> {
        let target_us = self.now_us().saturating_add(duration_us(delta));
        self.run_microtasks()?;
        let fired = self.fire_until(target_us)?;
        self.inner.clock.advance_to_us(target_us);
        Ok(fired)
    }

    /// Run until both queues are empty, jumping the clock to each next timer.
    ///
    /// Returns the number of timers fired.
    pub fn run_until_idle(&self) -> Result<usize> {
        self.run_microtasks()?;
        self.fire_until(u64::MAX)
    }

    fn fire_until(&self, up_to_us: u64) -> Result<usize> {
        let budget = self.inner.config.timer_budget;
        let mut fired = 0;
        loop {
            // Release the timer lock before running user code.
            let next = {
                let mut timers = self.timers();
                if fired >= budget && timers.next_due().is_some_and(|due| due <= up_to_us) {
                    return Err(RuntimeError::TimerBudgetExceeded { budget });
                }
                timers.pop_due(up_to_us)
            };
            let Some((due_us, seq, task)) = next else {
                return Ok(fired);
            };
            self.inner.clock.advance_to_us(due_us);
            trace!(timer_id = seq, due_us, "timer fired");
            task();
            fired += 1;
            self.run_microtasks()?;
        }
    }

    /// Due time of the earliest pending timer, in lab microseconds.
    #[must_use]
    pub fn next_timer_due_us(&self) -> Option<u64> {
        self.timers().next_due()
    }

    fn timers(&self) -> MutexGuard<'_, TimerQueue> {
        self.inner
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LabLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabLoop")
            .field("now_us", &self.now_us())
            .field("pending_microtasks", &self.pending_microtasks())
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}
