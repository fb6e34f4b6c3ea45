//! Handler Adapter
//!
//! Turns script callbacks into host reaction handlers. A callback that
//! throws rejects the derived promise through the handler's `Err`.

use fos_eventloop::{FinallyHandler, Handler, PromiseValue};
use fos_script::Value;

use crate::bridge::WeakBridge;
use crate::marshal::{HostValue, to_host, to_scripting};
use crate::thenable::{adoption, resolution};

fn shut_down() -> HostValue {
    HostValue::type_error("Promise bridge has been shut down")
}

/// Handler for `callback`; `None` unless it is callable, so the host
/// passes the outcome through
pub(crate) fn adapt(bridge: &WeakBridge, callback: &Value) -> Option<Handler<HostValue>> {
    let callback = callback.as_object().filter(|c| c.is_callable())?.clone();
    let bridge = bridge.clone();
    let handler: Handler<HostValue> = Box::new(move |settled: HostValue| {
        let inner = bridge.upgrade().ok_or_else(shut_down)?;
        let argument = to_scripting(&inner, &settled);
        match inner.realm.call(&Value::Object(callback), &Value::Undefined, &[argument]) {
            Ok(returned) => Ok(resolution(&inner, &returned)),
            Err(thrown) => Err(to_host(&inner, thrown.value())),
        }
    });
    Some(handler)
}

/// `finally` callback for `callback`; called without arguments, only a
/// returned promise or thenable matters
pub(crate) fn adapt_finally(
    bridge: &WeakBridge,
    callback: &Value,
) -> Option<FinallyHandler<HostValue>> {
    let callback = callback.as_object().filter(|c| c.is_callable())?.clone();
    let bridge = bridge.clone();
    let handler: FinallyHandler<HostValue> = Box::new(move || {
        let inner = bridge.upgrade().ok_or_else(shut_down)?;
        match inner.realm.call(&Value::Object(callback), &Value::Undefined, &[]) {
            Ok(returned) => Ok(adoption(&inner, &returned).unwrap_or(HostValue::Undefined)),
            Err(thrown) => Err(to_host(&inner, thrown.value())),
        }
    });
    Some(handler)
}
