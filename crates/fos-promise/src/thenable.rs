//! Thenable Resolution
//!
//! Adoption of foreign objects with a callable `then` (Promise/A+ 2.3.3).

use std::rc::Rc;

use fos_eventloop::Promise;
use fos_script::Value;

use crate::bridge::BridgeInner;
use crate::marshal::{BridgedPromise, HostValue, to_host};
use crate::resolving;
use crate::wrapper;

/// Adopt `value` if it is a thenable
///
/// `then` is read once; a throwing read yields an already-rejected
/// promise. It is then called synchronously with fresh resolving
/// functions; a throw after either of them ran is ignored.
pub(crate) fn resolve_thenable(
    bridge: &Rc<BridgeInner>,
    value: &Value,
) -> Option<Promise<HostValue>> {
    let object = value.as_object()?;
    let then = match object.get(&bridge.realm, "then") {
        Ok(then) => then,
        Err(thrown) => return Some(bridge.event_loop.rejected(to_host(bridge, thrown.value()))),
    };
    if !then.is_callable() {
        return None;
    }

    let (primitive, resolvers) = bridge.event_loop.with_resolvers::<HostValue>();
    let (resolve, reject) = resolving::functions(bridge, resolvers.clone());
    tracing::trace!(promise = primitive.id(), "Adopting thenable");
    if let Err(thrown) = bridge.realm.call(&then, value, &[resolve.into(), reject.into()]) {
        resolvers.reject(to_host(bridge, thrown.value()));
    }
    Some(primitive)
}

/// Host promise `value` settles like, if it is a wrapper or thenable
pub(crate) fn adoption(bridge: &Rc<BridgeInner>, value: &Value) -> Option<HostValue> {
    if wrapper::unwrap(value).is_some() {
        // Keeps the wrapper tag so it converts back to the same object
        return Some(to_host(bridge, value));
    }
    resolve_thenable(bridge, value).map(|adopted| HostValue::Promise(BridgedPromise::new(adopted)))
}

/// What resolving a promise with `value` resolves the host promise with
pub(crate) fn resolution(bridge: &Rc<BridgeInner>, value: &Value) -> HostValue {
    adoption(bridge, value).unwrap_or_else(|| to_host(bridge, value))
}
