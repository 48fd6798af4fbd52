#![forbid(unsafe_code)]

//! Resolution procedure for success values.
//!
//! A promise may succeed with any value except itself. Succeeding with
//! another promise stores that promise as the payload; adoption of its
//! outcome happens lazily when reactions are routed (see
//! [`crate::reaction::route`]), so this step never recurses into another cell.

use std::sync::Arc;

use tracing::warn;

use crate::cell::Cell;
use crate::error::SettleError;
use crate::value::{Outcome, Value};

/// Settle `target` with `value`, failing it with a type error instead if
/// `value` is `target` itself.
pub(crate) fn resolve(target: &Arc<Cell>, value: Value) -> bool {
    let is_self = matches!(&value, Value::Promise(p) if Arc::ptr_eq(p.cell(), target));
    if is_self {
        let settled = target.settle(Outcome::Failed(Value::Error(
            SettleError::SelfResolution { id: target.id() },
        )));
        if settled {
            warn!(promise_id = target.id(), "promise resolved with itself");
        }
        return settled;
    }
    target.settle(Outcome::Succeeded(value))
}
