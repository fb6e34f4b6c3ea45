//! Resolving Functions
//!
//! The `resolve`/`reject` pair handed to executors, thenables and
//! `Promise.withResolvers()`.

use std::rc::Rc;

use fos_eventloop::Resolvers;
use fos_script::{Object, Value};

use crate::bridge::{BridgeInner, arg, upgrade};
use crate::marshal::{HostValue, to_host};
use crate::thenable::resolution;

/// Resolve with a script value: wrappers and thenables are adopted,
/// anything else is marshalled
///
/// The promise is claimed before a thenable's `then` runs, so resolving
/// functions called from inside it are ignored.
pub(crate) fn resolve_with(
    bridge: &Rc<BridgeInner>,
    resolvers: &Resolvers<HostValue>,
    value: &Value,
) {
    resolvers.settle_with(|| Ok(resolution(bridge, value)));
}

/// Script `resolve` and `reject` functions for `resolvers`
pub(crate) fn functions(
    bridge: &Rc<BridgeInner>,
    resolvers: Resolvers<HostValue>,
) -> (Object, Object) {
    let weak = Rc::downgrade(bridge);

    let resolve = {
        let weak = weak.clone();
        let resolvers = resolvers.clone();
        bridge.realm.function("resolve", move |realm, _, args| {
            let inner = upgrade(&weak, realm)?;
            resolve_with(&inner, &resolvers, &arg(args, 0));
            Ok(Value::Undefined)
        })
    };

    let reject = bridge.realm.function("reject", move |realm, _, args| {
        let inner = upgrade(&weak, realm)?;
        resolvers.reject(to_host(&inner, &arg(args, 0)));
        Ok(Value::Undefined)
    });

    (resolve, reject)
}
