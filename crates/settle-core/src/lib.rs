#![forbid(unsafe_code)]

//! Core: single-assignment promises with deferred, chained reactions.
//!
//! A [`Promise`] starts unsettled and settles exactly once, either succeeding
//! with a [`Value`] or failing with a reason (also a [`Value`]). Observers
//! register reactions with [`Promise::subscribe`] (or the `then` / `catch`
//! helpers), each of which returns a derived promise settled by the
//! reaction's result.
//!
//! # Invariants
//!
//! 1. Status moves `Unsettled → Succeeded` or `Unsettled → Failed` once.
//! 2. The capability pair handed to a producer settles at most once in total.
//! 3. A promise resolved with itself fails with a type error.
//! 4. Every reaction is dispatched exactly once, after its effective source
//!    settles.
//! 5. Dispatch always goes through the [`Scheduler`]; it never runs inside the
//!    call that settled or subscribed.
//!
//! Nested promises are adopted lazily: a promise may succeed with another
//! promise, and reactions registered on it wait for the innermost one.

mod cell;
pub mod error;
pub mod executor;
pub mod promise;
mod reaction;
mod resolve;
pub mod schedule;
pub mod value;

pub use error::SettleError;
pub use executor::{Fail, Succeed};
pub use promise::Promise;
pub use reaction::Handler;
pub use schedule::{ManualQueue, Schedule, Scheduler, Task};
pub use value::{Outcome, Status, Value};
