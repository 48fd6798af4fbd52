#![forbid(unsafe_code)]

//! The public promise handle.
//!
//! A [`Promise`] is a cheap, clonable handle onto one settlement cell. Clones
//! observe and settle the same cell; [`Promise::ptr_eq`] tells handles apart.
//!
//! # Example
//!
//! ```
//! use settle_core::{ManualQueue, Promise, Status, Value};
//!
//! let queue = ManualQueue::new();
//! let p = Promise::new(&queue.scheduler(), |succeed, _fail| {
//!     succeed.succeed(5);
//!     Ok(())
//! });
//! assert_eq!(p.status(), Status::Succeeded);
//!
//! let doubled = p.then(|v| Ok(Value::from(v.as_int().unwrap_or(0) * 2)));
//! // Reactions never run inline.
//! assert_eq!(doubled.status(), Status::Unsettled);
//!
//! queue.run_until_idle();
//! assert_eq!(doubled.outcome().and_then(|o| o.value().as_int()), Some(10));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::cell::Cell;
use crate::executor::{self, Fail, Succeed};
use crate::reaction::{self, Handler, Reaction};
use crate::schedule::Scheduler;
use crate::value::{Outcome, Status, Value};

/// A single-assignment deferred value.
#[derive(Clone)]
pub struct Promise {
    cell: Arc<Cell>,
}

impl Promise {
    // ── Constructors ─────────────────────────────────────────────────

    /// Create a promise and run `producer` before returning.
    ///
    /// The producer gets the one-shot [`Succeed`] / [`Fail`] pair. Returning
    /// `Err(reason)` or panicking fails the promise, unless a capability was
    /// already used.
    pub fn new<F>(scheduler: &Scheduler, producer: F) -> Self
    where
        F: FnOnce(Succeed, Fail) -> Result<(), Value>,
    {
        let cell = Cell::new(scheduler.clone());
        executor::invoke(&cell, producer);
        Self { cell }
    }

    /// Create an unsettled promise and hand its capabilities to the caller.
    #[must_use]
    pub fn deferred(scheduler: &Scheduler) -> (Self, Succeed, Fail) {
        let cell = Cell::new(scheduler.clone());
        let (succeed, fail) = executor::capabilities(&cell);
        (Self { cell }, succeed, fail)
    }

    /// A promise that has already succeeded with `value`.
    #[must_use]
    pub fn resolved(scheduler: &Scheduler, value: impl Into<Value>) -> Self {
        let cell = Cell::new(scheduler.clone());
        cell.request_success(value.into());
        Self { cell }
    }

    /// A promise that has already failed with `reason`.
    #[must_use]
    pub fn rejected(scheduler: &Scheduler, reason: impl Into<Value>) -> Self {
        let cell = Cell::new(scheduler.clone());
        cell.request_failure(reason.into());
        Self { cell }
    }

    #[cfg(test)]
    pub(crate) fn from_cell(cell: Arc<Cell>) -> Self {
        Self { cell }
    }

    pub(crate) fn cell(&self) -> &Arc<Cell> {
        &self.cell
    }

    // ── Subscription ─────────────────────────────────────────────────

    /// Register reactions and return the promise they settle.
    ///
    /// A missing handler passes that outcome through unchanged. Handlers run
    /// on a later scheduler turn, never during this call, even if this
    /// promise has already settled.
    pub fn subscribe(&self, on_success: Option<Handler>, on_failure: Option<Handler>) -> Promise {
        let derived = Cell::new(self.cell.scheduler().clone());
        reaction::route(
            &self.cell,
            Reaction {
                derived: Arc::clone(&derived),
                on_success,
                on_failure,
            },
        );
        Promise { cell: derived }
    }

    /// React to success; failures pass through.
    pub fn then<F>(&self, on_success: F) -> Promise
    where
        F: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
    {
        self.subscribe(Some(Box::new(on_success)), None)
    }

    /// React to failure; successes pass through.
    pub fn catch<G>(&self, on_failure: G) -> Promise
    where
        G: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
    {
        self.subscribe(None, Some(Box::new(on_failure)))
    }

    pub fn then_or_else<F, G>(&self, on_success: F, on_failure: G) -> Promise
    where
        F: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
        G: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
    {
        self.subscribe(Some(Box::new(on_success)), Some(Box::new(on_failure)))
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Process-unique identifier (for logging and error reasons).
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.cell.id()
    }

    /// Current status. Informational only: a pending promise may settle
    /// between this call and the next.
    #[must_use]
    pub fn status(&self) -> Status {
        self.cell.status()
    }

    /// Snapshot of the raw settled state.
    ///
    /// A success value that is another promise is returned as-is; subscribe
    /// to observe the adopted outcome.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.cell.outcome()
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        self.cell.scheduler()
    }

    /// Whether both handles refer to the same promise.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SettleError;
    use crate::schedule::ManualQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, OnceLock};

    fn int(p: &Promise) -> Option<i64> {
        p.outcome().and_then(|o| o.value().as_int())
    }

    #[test]
    fn executor_is_called_once_with_both_capabilities() {
        let queue = ManualQueue::new();
        let calls = AtomicUsize::new(0);
        let p = Promise::new(&queue.scheduler(), |succeed, fail| {
            calls.fetch_add(1, Ordering::SeqCst);
            assert!(!succeed.is_spent());
            assert!(!fail.is_spent());
            Ok(())
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(p.status(), Status::Unsettled);
    }

    #[test]
    fn scenario_sync_success() {
        let queue = ManualQueue::new();
        let p = Promise::new(&queue.scheduler(), |succeed, _| {
            succeed.succeed("v");
            Ok(())
        });
        assert_eq!(p.status(), Status::Succeeded);
        assert_eq!(p.outcome(), Some(Outcome::Succeeded(Value::from("v"))));
    }

    #[test]
    fn scenario_throwing_producer() {
        let queue = ManualQueue::new();
        let p = Promise::new(&queue.scheduler(), |_, _| Err(Value::from("boom")));
        assert_eq!(p.status(), Status::Failed);
        assert_eq!(p.outcome(), Some(Outcome::Failed(Value::from("boom"))));
    }

    #[test]
    fn scenario_map_then_settles_later() {
        let queue = ManualQueue::new();
        let sched = queue.scheduler();
        let p = Promise::new(&sched, |succeed, _| {
            succeed.succeed(5);
            Ok(())
        });
        let q = p.then(|v| Ok(Value::from(v.as_int().unwrap_or(0) * 2)));
        assert_eq!(q.status(), Status::Unsettled);
        queue.run_until_idle();
        assert_eq!(int(&q), Some(10));
    }

    #[test]
    fn pending_subscription_waits_for_settlement() {
        let queue = ManualQueue::new();
        let (p, succeed, _) = Promise::deferred(&queue.scheduler());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _q = p.then(move |v| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(v)
        });

        assert_eq!(queue.run_until_idle(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        succeed.succeed(1);
        // Settlement schedules; it does not dispatch inline.
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        queue.run_until_idle();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn catch_recovers_and_then_passes_failure() {
        let queue = ManualQueue::new();
        let sched = queue.scheduler();
        let failed = Promise::rejected(&sched, "bad");
        let mapped = failed.then(|_| Ok(Value::from("unreachable")));
        let recovered = mapped.catch(|r| {
            let reason = r.as_str().unwrap_or("?").to_string();
            Ok(Value::from(format!("recovered from {reason}")))
        });

        queue.run_until_idle();
        assert_eq!(mapped.outcome(), Some(Outcome::Failed(Value::from("bad"))));
        assert_eq!(
            recovered.outcome(),
            Some(Outcome::Succeeded(Value::from("recovered from bad")))
        );
    }

    #[test]
    fn then_or_else_picks_the_matching_handler() {
        let queue = ManualQueue::new();
        let sched = queue.scheduler();
        let ok = Promise::resolved(&sched, 1)
            .then_or_else(|_| Ok(Value::from("s")), |_| Ok(Value::from("f")));
        let bad = Promise::rejected(&sched, 1)
            .then_or_else(|_| Ok(Value::from("s")), |_| Ok(Value::from("f")));
        queue.run_until_idle();
        assert_eq!(ok.outcome(), Some(Outcome::Succeeded(Value::from("s"))));
        assert_eq!(bad.outcome(), Some(Outcome::Succeeded(Value::from("f"))));
    }

    #[test]
    fn handler_returning_its_own_promise_fails_with_type_error() {
        let queue = ManualQueue::new();
        let sched = queue.scheduler();
        let slot: Arc<OnceLock<Promise>> = Arc::new(OnceLock::new());
        let s = Arc::clone(&slot);
        let q = Promise::resolved(&sched, 1).then(move |_| {
            Ok(Value::Promise(s.get().cloned().expect("slot filled")))
        });
        slot.set(q.clone()).expect("first set");

        queue.run_until_idle();
        let outcome = q.outcome().expect("settled");
        assert_eq!(outcome.status(), Status::Failed);
        assert_eq!(
            outcome.value().as_error(),
            Some(&SettleError::SelfResolution { id: q.id() })
        );
    }

    #[test]
    fn handler_returning_its_own_subscriber_fails_that_subscriber() {
        let queue = ManualQueue::new();
        let sched = queue.scheduler();
        let slot: Arc<OnceLock<Promise>> = Arc::new(OnceLock::new());
        let s = Arc::clone(&slot);
        let q = Promise::resolved(&sched, 1).then(move |_| {
            Ok(Value::Promise(s.get().cloned().expect("slot filled")))
        });
        let r = q.subscribe(None, None);
        slot.set(r.clone()).expect("first set");

        queue.run_until_idle();
        assert_eq!(q.status(), Status::Succeeded);
        let outcome = r.outcome().expect("settled, not parked on itself");
        assert_eq!(outcome.status(), Status::Failed);
        assert_eq!(
            outcome.value().as_error(),
            Some(&SettleError::AdoptionCycle { id: r.id() })
        );
    }

    #[test]
    fn returned_promise_is_adopted_when_it_settles_later() {
        let queue = ManualQueue::new();
        let sched = queue.scheduler();
        let (inner, inner_succeed, _) = Promise::deferred(&sched);

        let inner_clone = inner.clone();
        let outer = Promise::resolved(&sched, 0).then(move |_| Ok(Value::Promise(inner_clone)));
        let observed = outer.then(Ok);

        queue.run_until_idle();
        // `outer` holds the nested promise; `observed` waits on it.
        assert_eq!(outer.status(), Status::Succeeded);
        assert_eq!(observed.status(), Status::Unsettled);

        inner_succeed.succeed("nested");
        queue.run_until_idle();
        assert_eq!(
            observed.outcome(),
            Some(Outcome::Succeeded(Value::from("nested")))
        );
    }

    #[test]
    fn nested_failure_is_adopted() {
        let queue = ManualQueue::new();
        let sched = queue.scheduler();
        let inner = Promise::rejected(&sched, "inner failed");
        let outer = Promise::resolved(&sched, inner);
        let observed = outer.subscribe(None, None);
        queue.run_until_idle();
        assert_eq!(
            observed.outcome(),
            Some(Outcome::Failed(Value::from("inner failed")))
        );
    }

    #[test]
    fn two_subscriptions_after_success_each_dispatch_once() {
        let queue = ManualQueue::new();
        let p = Promise::resolved(&queue.scheduler(), "same");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let s = Arc::clone(&seen);
            let _ = p.then(move |v| {
                s.lock().unwrap().push(v.clone());
                Ok(v)
            });
        }
        queue.run_until_idle();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Value::from("same"), Value::from("same")]
        );
    }

    #[test]
    fn derived_promises_inherit_scheduler() {
        let queue = ManualQueue::new();
        let sched = queue.scheduler();
        let p = Promise::resolved(&sched, 1);
        let q = p.then(Ok);
        assert!(q.scheduler().same_service(&sched));
    }

    #[test]
    fn debug_format() {
        let queue = ManualQueue::new();
        let p = Promise::resolved(&queue.scheduler(), 1);
        let dbg = format!("{p:?}");
        assert!(dbg.contains("Promise"));
        assert!(dbg.contains("Succeeded"));
    }
}
