#![forbid(unsafe_code)]

//! Failure reasons manufactured by the core itself.
//!
//! Producer and handler faults normally carry whatever reason the caller
//! returned. The variants here cover the cases where the core has to invent a
//! reason: a panic that unwound out of user code, or a resolution that would
//! make a promise depend on itself.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError {
    /// A promise was resolved with itself as the success value.
    #[error("TypeError: promise #{id} cannot be resolved with itself")]
    SelfResolution { id: u64 },

    /// Adopting nested promises led back to a promise already being walked.
    #[error("TypeError: promise #{id} adopts itself through a cycle of nested promises")]
    AdoptionCycle { id: u64 },

    #[error("executor panicked: {message}")]
    ExecutorPanicked { message: String },

    #[error("reaction handler panicked: {message}")]
    HandlerPanicked { message: String },
}

impl SettleError {
    /// Whether this reason is one of the type errors raised by the resolution
    /// rules (as opposed to a relayed panic).
    #[must_use]
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            Self::SelfResolution { .. } | Self::AdoptionCycle { .. }
        )
    }

    pub(crate) fn executor_panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        Self::ExecutorPanicked {
            message: panic_message(payload),
        }
    }

    pub(crate) fn handler_panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        Self::HandlerPanicked {
            message: panic_message(payload),
        }
    }
}

/// Extract the human-readable part of a panic payload.
///
/// Handles `&'static str` and `String` payloads; anything else yields a
/// placeholder.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
