//! Promise Bridge
//!
//! Installs the global `Promise` into a realm and exposes the bridge's
//! conversions to Rust hosts.

use std::rc::{Rc, Weak};

use fos_eventloop::{EventLoop, Handler, Promise, RemoteSettler, Settled};
use fos_script::{JsResult, Object, Realm, Value};
use serde_json::Value as JsonValue;

use crate::combinators;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::handler;
use crate::marshal::{self, HostValue};
use crate::thenable;
use crate::wrapper;

/// State shared by every function the bridge installs
pub(crate) struct BridgeInner {
    pub(crate) realm: Realm,
    pub(crate) event_loop: EventLoop,
    pub(crate) prototype: Object,
    pub(crate) config: BridgeConfig,
}

pub(crate) type WeakBridge = Weak<BridgeInner>;

/// Live bridge state for a native function; throws once the bridge is gone
pub(crate) fn upgrade(weak: &WeakBridge, realm: &Realm) -> JsResult<Rc<BridgeInner>> {
    weak.upgrade()
        .ok_or_else(|| realm.type_error("Promise bridge has been shut down"))
}

/// Argument `index`, `undefined` when missing
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// State of a promise wrapper as seen from Rust
#[derive(Debug, Clone)]
pub enum Inspection {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

/// Promise bridge installed in a realm
///
/// Script-visible functions hold only weak references to the bridge;
/// once this handle is dropped they throw `TypeError`.
pub struct PromiseBridge {
    inner: Rc<BridgeInner>,
    constructor: Object,
}

impl PromiseBridge {
    /// Install `Promise` into `realm`, driven by `event_loop`
    pub fn install(realm: &Realm, event_loop: &EventLoop) -> Result<Self, BridgeError> {
        Self::install_with_config(realm, event_loop, BridgeConfig::default())
    }

    pub fn install_with_config(
        realm: &Realm,
        event_loop: &EventLoop,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let global = realm.global();
        let name = config.global_name.clone();
        if global.peek(name.as_str()).is_some_and(|existing| !existing.is_undefined()) {
            return Err(BridgeError::GlobalInUse(name));
        }

        let inner = Rc::new_cyclic(|weak| BridgeInner {
            realm: realm.clone(),
            event_loop: event_loop.clone(),
            prototype: wrapper::create_prototype(realm, weak),
            config,
        });
        let constructor = combinators::create_constructor(&inner);
        global.set(name.as_str(), constructor.clone());

        tracing::debug!(global = %name, "Promise bridge installed");
        Ok(Self { inner, constructor })
    }

    pub fn realm(&self) -> &Realm {
        &self.inner.realm
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.inner.event_loop
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// The installed `Promise` constructor
    pub fn constructor(&self) -> &Object {
        &self.constructor
    }

    /// Shared `Promise.prototype`
    pub fn prototype(&self) -> &Object {
        &self.inner.prototype
    }

    /// Run queued reactions until the loop is idle
    pub fn run_until_idle(&self) -> Result<usize, BridgeError> {
        Ok(self.inner.event_loop.run_until_idle()?)
    }

    /// Script wrapper for a host promise
    pub fn wrap(&self, primitive: Promise<HostValue>) -> Object {
        wrapper::wrap(&self.inner, primitive)
    }

    /// Host promise behind a wrapper; `None` for anything else
    pub fn unwrap(&self, value: &Value) -> Option<Promise<HostValue>> {
        wrapper::unwrap(value)
    }

    /// Marshal a script value for the host
    pub fn to_host(&self, value: &Value) -> HostValue {
        marshal::to_host(&self.inner, value)
    }

    /// Marshal a host value back into the realm
    pub fn to_scripting(&self, value: &HostValue) -> Value {
        marshal::to_scripting(&self.inner, value)
    }

    /// Adopt a thenable; `None` when `value` is not one
    pub fn resolve_thenable(&self, value: &Value) -> Option<Promise<HostValue>> {
        thenable::resolve_thenable(&self.inner, value)
    }

    /// Host reaction handler calling a script callback
    pub fn adapt(&self, callback: &Value) -> Option<Handler<HostValue>> {
        handler::adapt(&Rc::downgrade(&self.inner), callback)
    }

    /// Current state of a wrapper; `None` if `value` is not one
    pub fn inspect(&self, value: &Value) -> Option<Inspection> {
        let primitive = wrapper::unwrap(value)?;
        Some(match primitive.outcome() {
            None => Inspection::Pending,
            Some(Settled::Fulfilled(v)) => Inspection::Fulfilled(self.to_scripting(&v)),
            Some(Settled::Rejected(r)) => Inspection::Rejected(self.to_scripting(&r)),
        })
    }

    /// Pending wrapper settled from any thread with JSON data
    pub fn remote_promise(&self) -> (Object, RemoteSettler<JsonValue>) {
        let (primitive, resolvers) = self.inner.event_loop.with_resolvers::<HostValue>();
        let settler = self.inner.event_loop.remote_settler(resolvers);
        (self.wrap(primitive), settler)
    }
}
