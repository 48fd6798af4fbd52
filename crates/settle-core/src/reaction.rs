#![forbid(unsafe_code)]

//! Reaction registrations, routing, and dispatch.
//!
//! # Routing
//!
//! A registration is routed against its *effective* source: starting at the
//! promise it was registered on, routing follows success values that are
//! themselves promises until it reaches one that is unsettled, failed, or
//! succeeded with a plain value. A failure reason is never unwrapped.
//!
//! - Unsettled: the registration joins that promise's queue and is routed
//!   again when it settles.
//! - Settled: a dispatch task goes to the scheduler. Dispatch never runs on
//!   the routing call stack.
//!
//! If the walk revisits a promise, or reaches the derived promise the
//! registration settles, the nested promises adopt one another in a cycle and
//! can never settle; the derived promise fails with
//! [`SettleError::AdoptionCycle`] instead.
//!
//! # Dispatch
//!
//! The handler matching the outcome kind runs with the payload. Its `Ok`
//! result resolves the derived promise (self-reference check included), its
//! `Err` result or a panic fails it. A missing handler passes the outcome
//! through unchanged.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::cell::{Cell, Slot};
use crate::error::SettleError;
use crate::value::{Outcome, Value};

/// A reaction callback. Runs at most once.
pub type Handler = Box<dyn FnOnce(Value) -> Result<Value, Value> + Send + 'static>;

/// A queued pair of optional handlers plus the promise they settle.
pub(crate) struct Reaction {
    pub(crate) derived: Arc<Cell>,
    pub(crate) on_success: Option<Handler>,
    pub(crate) on_failure: Option<Handler>,
}

enum Step {
    Adopt(Arc<Cell>),
    Ready(Outcome),
}

/// Queue `reaction` on its effective source, or schedule its dispatch if the
/// effective source has settled.
pub(crate) fn route(source: &Arc<Cell>, reaction: Reaction) {
    let derived_id = reaction.derived.id();
    let mut current = Arc::clone(source);
    let mut walked: HashSet<u64> = HashSet::new();

    loop {
        let step = {
            let mut slot = current.lock();
            match &mut *slot {
                Slot::Unsettled(queue) => {
                    queue.push(reaction);
                    trace!(
                        promise_id = current.id(),
                        derived_id,
                        queued = queue.len(),
                        "reaction queued"
                    );
                    return;
                }
                Slot::Settled(Outcome::Succeeded(Value::Promise(nested))) => {
                    Step::Adopt(Arc::clone(nested.cell()))
                }
                Slot::Settled(outcome) => Step::Ready(outcome.clone()),
            }
        };

        match step {
            Step::Adopt(next) => {
                walked.insert(current.id());
                // Queuing on the derived promise itself would park the
                // registration on a cell only it can settle.
                if walked.contains(&next.id()) || Arc::ptr_eq(&next, &reaction.derived) {
                    warn!(
                        promise_id = next.id(),
                        derived_id,
                        depth = walked.len(),
                        "adoption cycle detected"
                    );
                    reaction
                        .derived
                        .request_failure(Value::Error(SettleError::AdoptionCycle { id: next.id() }));
                    return;
                }
                current = next;
            }
            Step::Ready(outcome) => {
                let source_id = current.id();
                let scheduler = reaction.derived.scheduler().clone();
                scheduler.schedule_later(Box::new(move || dispatch(source_id, reaction, outcome)));
                return;
            }
        }
    }
}

/// Run one registration against its effective source's outcome.
fn dispatch(source_id: u64, reaction: Reaction, outcome: Outcome) {
    let Reaction {
        derived,
        on_success,
        on_failure,
    } = reaction;

    let (handler, payload, succeeded) = match outcome {
        Outcome::Succeeded(v) => (on_success, v, true),
        Outcome::Failed(r) => (on_failure, r, false),
    };

    trace!(
        source_id,
        derived_id = derived.id(),
        succeeded,
        has_handler = handler.is_some(),
        "dispatching reaction"
    );

    let Some(handler) = handler else {
        if succeeded {
            derived.request_success(payload);
        } else {
            derived.request_failure(payload);
        }
        return;
    };

    match panic::catch_unwind(AssertUnwindSafe(move || handler(payload))) {
        Ok(Ok(value)) => {
            derived.request_success(value);
        }
        Ok(Err(reason)) => {
            debug!(derived_id = derived.id(), "reaction handler returned an error");
            derived.request_failure(reason);
        }
        Err(panic_payload) => {
            debug!(derived_id = derived.id(), "reaction handler panicked");
            derived.request_failure(Value::Error(SettleError::handler_panicked(
                panic_payload.as_ref(),
            )));
        }
    }
}
