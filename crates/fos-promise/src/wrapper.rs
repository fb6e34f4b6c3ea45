//! Promise Wrapper
//!
//! Script objects standing for host promises. A wrapper's only state is
//! its host promise; behaviour comes from the shared prototype.

use std::rc::Rc;

use fos_eventloop::Promise;
use fos_script::{JsResult, Object, Realm, Value};

use crate::bridge::{BridgeInner, WeakBridge, arg, upgrade};
use crate::handler;
use crate::marshal::HostValue;

struct PromiseSlot {
    primitive: Promise<HostValue>,
}

/// New wrapper around `primitive`
pub(crate) fn wrap(bridge: &BridgeInner, primitive: Promise<HostValue>) -> Object {
    bridge
        .realm
        .host_object(Some(bridge.prototype.clone()), Rc::new(PromiseSlot { primitive }))
}

pub(crate) fn unwrap_object(object: &Object) -> Option<Promise<HostValue>> {
    object.host_data::<PromiseSlot>().map(|slot| slot.primitive.clone())
}

/// Host promise behind `value`; `None` for anything that is not a wrapper
pub fn unwrap(value: &Value) -> Option<Promise<HostValue>> {
    value.as_object().and_then(unwrap_object)
}

fn receiver(realm: &Realm, this: &Value, method: &str) -> JsResult<Promise<HostValue>> {
    unwrap(this).ok_or_else(|| {
        realm.type_error(format!(
            "Promise.prototype.{} called on incompatible receiver {}",
            method, this
        ))
    })
}

/// Build the shared prototype with `then`, `catch` and `finally`
pub(crate) fn create_prototype(realm: &Realm, weak: &WeakBridge) -> Object {
    let prototype = realm.object();

    let bridge = weak.clone();
    let then = realm.function("then", move |realm, this, args| {
        let primitive = receiver(realm, this, "then")?;
        let inner = upgrade(&bridge, realm)?;
        let derived = primitive.then(
            handler::adapt(&bridge, &arg(args, 0)),
            handler::adapt(&bridge, &arg(args, 1)),
        );
        Ok(wrap(&inner, derived).into())
    });

    let bridge = weak.clone();
    let catch = realm.function("catch", move |realm, this, args| {
        let primitive = receiver(realm, this, "catch")?;
        let inner = upgrade(&bridge, realm)?;
        let derived = primitive.catch(handler::adapt(&bridge, &arg(args, 0)));
        Ok(wrap(&inner, derived).into())
    });

    let bridge = weak.clone();
    let finally = realm.function("finally", move |realm, this, args| {
        let primitive = receiver(realm, this, "finally")?;
        let inner = upgrade(&bridge, realm)?;
        let derived = primitive.finally(handler::adapt_finally(&bridge, &arg(args, 0)));
        Ok(wrap(&inner, derived).into())
    });

    prototype.set("then", then);
    prototype.set("catch", catch);
    prototype.set("finally", finally);
    prototype.set(&realm.symbols().to_string_tag, "Promise");
    prototype
}
