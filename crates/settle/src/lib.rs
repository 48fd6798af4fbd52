#![forbid(unsafe_code)]

//! Settle public facade crate.
//!
//! Re-exports the promise core and, with the default `runtime` feature, the
//! host bindings that drive it.

pub use settle_core::{
    Fail, Handler, ManualQueue, Outcome, Promise, Schedule, Scheduler, SettleError, Status,
    Succeed, Task, Value,
};

#[cfg(feature = "runtime")]
pub use settle_runtime::{LabLoop, LogConfig, RuntimeError, WorkerConfig, WorkerScheduler};

pub mod prelude {
    pub use settle_core as core;
    #[cfg(feature = "runtime")]
    pub use settle_runtime as runtime;

    pub use settle_core::{Fail, Outcome, Promise, Scheduler, Status, Succeed, Value};
}
