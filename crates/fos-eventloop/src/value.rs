//! Promise Values
//!
//! The contract a value type must meet to travel through host promises.

use std::fmt;

use serde_json::{Value as JsonValue, json};

use crate::promise::{Promise, Settled};

/// Value carried by a [`Promise`]
///
/// The library never inspects values except to find nested promises
/// (which are adopted on resolution) and to build the values it
/// synthesises itself.
pub trait PromiseValue: Clone + fmt::Debug + 'static {
    /// The promise this value stands for, if it is one
    fn as_promise(&self) -> Option<Promise<Self>>;

    /// Ordered list, used by `all` and `all_settled`
    fn list(values: Vec<Self>) -> Self;

    /// Outcome descriptor for `all_settled`
    fn settled(outcome: Settled<Self>) -> Self;

    /// Rejection reason of `any` when every input rejected
    fn aggregate_error(errors: Vec<Self>) -> Self;

    /// Type error raised by the library itself
    fn type_error(message: &str) -> Self;

    /// Rejection reason for a handler that panicked
    fn panic_error(message: &str) -> Self {
        Self::type_error(message)
    }
}

impl PromiseValue for JsonValue {
    fn as_promise(&self) -> Option<Promise<Self>> {
        None
    }

    fn list(values: Vec<Self>) -> Self {
        JsonValue::Array(values)
    }

    fn settled(outcome: Settled<Self>) -> Self {
        match outcome {
            Settled::Fulfilled(value) => json!({ "status": "fulfilled", "value": value }),
            Settled::Rejected(reason) => json!({ "status": "rejected", "reason": reason }),
        }
    }

    fn aggregate_error(errors: Vec<Self>) -> Self {
        json!({
            "name": "AggregateError",
            "message": "All promises were rejected",
            "errors": errors,
        })
    }

    fn type_error(message: &str) -> Self {
        json!({ "name": "TypeError", "message": message })
    }

    fn panic_error(message: &str) -> Self {
        json!({ "name": "PanicError", "message": message })
    }
}
