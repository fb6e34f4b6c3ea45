//! Script Exceptions

use crate::value::Value;

/// A thrown script value
///
/// Every fallible operation of the embedding API completes with
/// `Result<T, Throw>`; the carried value is whatever the script threw.
#[derive(Debug, Clone, thiserror::Error)]
#[error("uncaught exception: {0}")]
pub struct Throw(pub Value);

impl Throw {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Completion of a script operation
pub type JsResult<T> = Result<T, Throw>;

/// Built-in error constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    AggregateError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::RangeError => "RangeError",
            Self::AggregateError => "AggregateError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Error" => Some(Self::Error),
            "TypeError" => Some(Self::TypeError),
            "RangeError" => Some(Self::RangeError),
            "AggregateError" => Some(Self::AggregateError),
            _ => None,
        }
    }
}
