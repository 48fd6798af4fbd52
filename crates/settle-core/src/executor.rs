#![forbid(unsafe_code)]

//! Executor invocation and the one-shot settle capabilities.
//!
//! A producer receives a [`Succeed`] and a [`Fail`] handle. Both share a
//! single "spent" flag: whichever handle is called first consumes it and every
//! later call on either handle (or any clone of them) is a no-op. The cell
//! keeps its own already-settled guard underneath, so a cell that was settled
//! through some other path also ignores the capabilities.
//!
//! # Failure Modes
//!
//! - **Producer returns `Err(reason)`**: treated as a throw; the promise fails
//!   with `reason` unless a capability was already used.
//! - **Producer panics**: the panic is caught and the promise fails with
//!   [`SettleError::ExecutorPanicked`]. The panic never leaves the
//!   constructor.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::cell::Cell;
use crate::error::SettleError;
use crate::value::Value;

/// Capability that settles its promise as a success.
#[derive(Clone)]
pub struct Succeed {
    cell: Arc<Cell>,
    spent: Arc<AtomicBool>,
}

/// Capability that settles its promise as a failure.
#[derive(Clone)]
pub struct Fail {
    cell: Arc<Cell>,
    spent: Arc<AtomicBool>,
}

impl Succeed {
    /// Succeed with `value`.
    ///
    /// Returns `true` only for the call that actually settled the promise.
    /// Succeeding with the promise itself settles it as failed with a type
    /// error, which still counts as the winning call.
    pub fn succeed(&self, value: impl Into<Value>) -> bool {
        if self.spent.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cell.request_success(value.into())
    }

    /// Whether this capability pair has already been used.
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.spent.load(Ordering::Acquire)
    }
}

impl Fail {
    /// Fail with `reason`. Returns `true` only for the winning call.
    pub fn fail(&self, reason: impl Into<Value>) -> bool {
        if self.spent.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cell.request_failure(reason.into())
    }

    /// Whether this capability pair has already been used.
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.spent.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Succeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Succeed")
            .field("promise_id", &self.cell.id())
            .field("spent", &self.is_spent())
            .finish()
    }
}

impl fmt::Debug for Fail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fail")
            .field("promise_id", &self.cell.id())
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// Mint a fresh capability pair for `cell`.
pub(crate) fn capabilities(cell: &Arc<Cell>) -> (Succeed, Fail) {
    let spent = Arc::new(AtomicBool::new(false));
    (
        Succeed {
            cell: Arc::clone(cell),
            spent: Arc::clone(&spent),
        },
        Fail {
            cell: Arc::clone(cell),
            spent,
        },
    )
}

/// Run `producer` once, synchronously, against `cell`.
pub(crate) fn invoke<F>(cell: &Arc<Cell>, producer: F)
where
    F: FnOnce(Succeed, Fail) -> Result<(), Value>,
{
    let (succeed, fail) = capabilities(cell);
    let fallback = fail.clone();

    match panic::catch_unwind(AssertUnwindSafe(move || producer(succeed, fail))) {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => {
            let applied = fallback.fail(reason);
            debug!(promise_id = cell.id(), applied, "executor returned an error");
        }
        Err(payload) => {
            let err = SettleError::executor_panicked(payload.as_ref());
            let applied = fallback.fail(Value::Error(err));
            debug!(promise_id = cell.id(), applied, "executor panicked");
        }
    }
}
