#![forbid(unsafe_code)]

//! The settlement cell: the once-writable state behind every promise.
//!
//! # Invariants
//!
//! 1. The slot moves from `Unsettled` to `Settled` at most once and never
//!    back.
//! 2. Reactions are only ever appended while the slot is `Unsettled`; the
//!    transition takes the whole queue, so each queued reaction is handed to
//!    routing exactly once.
//! 3. No user code runs while the slot lock is held. Handlers and producers
//!    are only called from [`crate::executor`] and [`crate::reaction`], both
//!    of which release the lock first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::reaction::{self, Reaction};
use crate::resolve;
use crate::schedule::Scheduler;
use crate::value::{Outcome, Status, Value};

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

fn next_promise_id() -> u64 {
    NEXT_PROMISE_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) enum Slot {
    Unsettled(Vec<Reaction>),
    Settled(Outcome),
}

pub(crate) struct Cell {
    id: u64,
    scheduler: Scheduler,
    slot: Mutex<Slot>,
}

impl Cell {
    pub(crate) fn new(scheduler: Scheduler) -> Arc<Self> {
        Arc::new(Self {
            id: next_promise_id(),
            scheduler,
            slot: Mutex::new(Slot::Unsettled(Vec::new())),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn status(&self) -> Status {
        match &*self.lock() {
            Slot::Unsettled(_) => Status::Unsettled,
            Slot::Settled(outcome) => outcome.status(),
        }
    }

    pub(crate) fn outcome(&self) -> Option<Outcome> {
        match &*self.lock() {
            Slot::Unsettled(_) => None,
            Slot::Settled(outcome) => Some(outcome.clone()),
        }
    }

    /// Settle as a success, running the resolution procedure first.
    ///
    /// Returns `false` if the cell had already settled.
    pub(crate) fn request_success(self: &Arc<Self>, value: Value) -> bool {
        resolve::resolve(self, value)
    }

    /// Settle as a failure. Returns `false` if the cell had already settled.
    pub(crate) fn request_failure(self: &Arc<Self>, reason: Value) -> bool {
        self.settle(Outcome::Failed(reason))
    }

    /// Store `outcome` and route every queued reaction.
    pub(crate) fn settle(self: &Arc<Self>, outcome: Outcome) -> bool {
        let status = outcome.status();
        let queued = {
            let mut slot = self.lock();
            if matches!(*slot, Slot::Settled(_)) {
                trace!(promise_id = self.id, "settle ignored, already settled");
                return false;
            }
            let Slot::Unsettled(queued) = std::mem::replace(&mut *slot, Slot::Settled(outcome))
            else {
                return false;
            };
            queued
        };

        trace!(
            promise_id = self.id,
            status = status.as_str(),
            queued = queued.len(),
            "promise settled"
        );

        for reaction in queued {
            reaction::route(self, reaction);
        }
        true
    }
}
