#![forbid(unsafe_code)]

//! Host bindings for `settle-core`.
//!
//! The core only needs a FIFO deferred-call service. This crate provides the
//! two bindings the workspace uses:
//!
//! - [`WorkerScheduler`]: a dedicated named thread that runs deferred calls in
//!   submission order.
//! - [`LabLoop`]: a deterministic microtask + timer loop driven by a lab
//!   clock, for tests and simulations.
//!
//! plus [`logging`] setup for binaries that want to see the core's `tracing`
//! events.

pub mod config;
pub mod error;
pub mod lab;
pub mod logging;
pub mod worker;

pub use config::{LoopConfig, WorkerConfig};
pub use error::{Result, RuntimeError};
pub use lab::{LabClock, LabLoop, TimerId};
pub use logging::LogConfig;
pub use worker::WorkerScheduler;
