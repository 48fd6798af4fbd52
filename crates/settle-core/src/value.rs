#![forbid(unsafe_code)]

//! Payloads carried by settled promises.
//!
//! Success values and failure reasons share one type, [`Value`]. It is a
//! closed sum over the common scalar shapes, plus two variants that make the
//! resolution rules expressible:
//!
//! - [`Value::Promise`] lets a success value be another promise, which
//!   subscribers then adopt. A failure reason may also be a promise; it is
//!   relayed as-is and never unwrapped.
//! - [`Value::Opaque`] carries anything else behind an `Arc<dyn Any>`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::SettleError;
use crate::promise::Promise;

/// Observable settlement status of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Unsettled,
    Succeeded,
    Failed,
}

impl Status {
    #[must_use]
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Unsettled)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unsettled => "unsettled",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A success value or failure reason.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Error(SettleError),
    Promise(Promise),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an arbitrary payload.
    #[must_use]
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::Opaque(Arc::new(value))
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_error(&self) -> Option<&SettleError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_promise(&self) -> Option<&Promise> {
        match self {
            Self::Promise(p) => Some(p),
            _ => None,
        }
    }

    /// Borrow an opaque payload as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Opaque(any) => any.downcast_ref::<T>(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }
}

// Promises and opaque payloads compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Error(a), Self::Error(b)) => a == b,
            (Self::Promise(a), Self::Promise(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("Unit"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Promise(p) => write!(f, "Promise(#{}, {})", p.id(), p.status()),
            Self::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<SettleError> for Value {
    fn from(e: SettleError) -> Self {
        Self::Error(e)
    }
}

impl From<Promise> for Value {
    fn from(p: Promise) -> Self {
        Self::Promise(p)
    }
}

/// The terminal state of a promise: its status together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(Value),
    Failed(Value),
}

impl Outcome {
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::Succeeded(_) => Status::Succeeded,
            Self::Failed(_) => Status::Failed,
        }
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        match self {
            Self::Succeeded(v) | Self::Failed(v) => v,
        }
    }

    #[must_use]
    pub fn into_result(self) -> Result<Value, Value> {
        match self {
            Self::Succeeded(v) => Ok(v),
            Self::Failed(r) => Err(r),
        }
    }
}
