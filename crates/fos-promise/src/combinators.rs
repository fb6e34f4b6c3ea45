//! Promise Constructor and Combinators
//!
//! The script-facing `Promise` constructor and its static methods.

use std::rc::Rc;

use fos_eventloop::{EventLoop, Promise};
use fos_script::{JsResult, Object, Value};

use crate::bridge::{BridgeInner, WeakBridge, arg, upgrade};
use crate::iterable;
use crate::marshal::{HostValue, to_host};
use crate::resolving;
use crate::thenable::resolve_thenable;
use crate::wrapper::{unwrap, wrap};

type Combinator = fn(&EventLoop, Vec<Promise<HostValue>>) -> Promise<HostValue>;

/// Build `Promise` with its statics, linked to the shared prototype
pub(crate) fn create_constructor(bridge: &Rc<BridgeInner>) -> Object {
    let weak = Rc::downgrade(bridge);
    let realm = &bridge.realm;

    let constructor = {
        let weak = weak.clone();
        realm.constructor(
            "Promise",
            |realm, _, _| {
                Err(realm.type_error("Promise constructor cannot be invoked without 'new'"))
            },
            move |realm, args| {
                let inner = upgrade(&weak, realm)?;
                construct(&inner, &arg(args, 0))
            },
        )
    };
    constructor.set("prototype", bridge.prototype.clone());
    bridge.prototype.set("constructor", constructor.clone());

    define_static(bridge, &constructor, &weak, "resolve", |bridge, args| {
        resolve(bridge, &arg(args, 0))
    });
    define_static(bridge, &constructor, &weak, "reject", |bridge, args| {
        let reason = to_host(bridge, &arg(args, 0));
        Ok(wrap(bridge, bridge.event_loop.rejected(reason)).into())
    });
    define_static(bridge, &constructor, &weak, "all", |bridge, args| {
        combine(bridge, &arg(args, 0), EventLoop::all)
    });
    define_static(bridge, &constructor, &weak, "race", |bridge, args| {
        combine(bridge, &arg(args, 0), EventLoop::race)
    });
    define_static(bridge, &constructor, &weak, "allSettled", |bridge, args| {
        combine(bridge, &arg(args, 0), EventLoop::all_settled)
    });
    define_static(bridge, &constructor, &weak, "any", |bridge, args| {
        combine(bridge, &arg(args, 0), EventLoop::any)
    });
    define_static(bridge, &constructor, &weak, "withResolvers", |bridge, _| {
        with_resolvers(bridge)
    });
    define_static(bridge, &constructor, &weak, "try", |bridge, args| {
        try_call(bridge, &arg(args, 0), args.get(1..).unwrap_or_default())
    });

    constructor
}

fn define_static<F>(
    bridge: &BridgeInner,
    constructor: &Object,
    weak: &WeakBridge,
    name: &str,
    body: F,
) where
    F: Fn(&Rc<BridgeInner>, &[Value]) -> JsResult<Value> + 'static,
{
    let weak = weak.clone();
    let function = bridge.realm.function(name, move |realm, _, args| {
        let inner = upgrade(&weak, realm)?;
        body(&inner, args)
    });
    constructor.set(name, function);
}

/// `new Promise(executor)`
fn construct(bridge: &Rc<BridgeInner>, executor: &Value) -> JsResult<Value> {
    if !executor.is_callable() {
        let message = format!("Promise resolver {} is not a function", executor);
        return Err(bridge.realm.type_error(message));
    }
    let (primitive, resolvers) = bridge.event_loop.with_resolvers::<HostValue>();
    let (resolve, reject) = resolving::functions(bridge, resolvers.clone());
    let args = [resolve.into(), reject.into()];
    if let Err(thrown) = bridge.realm.call(executor, &Value::Undefined, &args) {
        resolvers.reject(to_host(bridge, thrown.value()));
    }
    Ok(wrap(bridge, primitive).into())
}

/// `Promise.resolve(value)`; a wrapper comes back unchanged
fn resolve(bridge: &Rc<BridgeInner>, value: &Value) -> JsResult<Value> {
    if unwrap(value).is_some() {
        return Ok(value.clone());
    }
    Ok(wrap(bridge, settled_like(bridge, value)).into())
}

/// Host promise for a non-wrapper value: adopted if thenable, otherwise
/// fulfilled with the marshalled value
fn settled_like(bridge: &Rc<BridgeInner>, value: &Value) -> Promise<HostValue> {
    if let Some(adopted) = resolve_thenable(bridge, value) {
        return adopted;
    }
    bridge.event_loop.resolved(to_host(bridge, value))
}

/// Host promise standing for one combinator input
fn classify(bridge: &Rc<BridgeInner>, item: &Value) -> Promise<HostValue> {
    unwrap(item).unwrap_or_else(|| settled_like(bridge, item))
}

fn combine(bridge: &Rc<BridgeInner>, iterable: &Value, combinator: Combinator) -> JsResult<Value> {
    let limit = bridge.config.max_iterable_length;
    let items = match iterable::consume(&bridge.realm, iterable, limit) {
        Ok(items) => items,
        Err(thrown) => {
            tracing::debug!(reason = %thrown.value(), "Combinator input could not be iterated");
            let reason = to_host(bridge, thrown.value());
            return Ok(wrap(bridge, bridge.event_loop.rejected(reason)).into());
        }
    };
    let promises = items.iter().map(|item| classify(bridge, item)).collect();
    Ok(wrap(bridge, combinator(&bridge.event_loop, promises)).into())
}

/// `Promise.withResolvers()`
fn with_resolvers(bridge: &Rc<BridgeInner>) -> JsResult<Value> {
    let (primitive, resolvers) = bridge.event_loop.with_resolvers::<HostValue>();
    let (resolve, reject) = resolving::functions(bridge, resolvers);
    let result = bridge.realm.object();
    result.set("promise", wrap(bridge, primitive));
    result.set("resolve", resolve);
    result.set("reject", reject);
    Ok(result.into())
}

/// `Promise.try(callback, ...args)`
fn try_call(bridge: &Rc<BridgeInner>, callback: &Value, args: &[Value]) -> JsResult<Value> {
    let (primitive, resolvers) = bridge.event_loop.with_resolvers::<HostValue>();
    match bridge.realm.call(callback, &Value::Undefined, args) {
        Ok(value) => resolving::resolve_with(bridge, &resolvers, &value),
        Err(thrown) => resolvers.reject(to_host(bridge, thrown.value())),
    }
    Ok(wrap(bridge, primitive).into())
}
