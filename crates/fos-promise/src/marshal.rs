//! Value Marshalling
//!
//! Conversion between script values and [`HostValue`], the payload of
//! host promises. Wrappers cross as their host promise, never re-wrapped.
//! Arrays, plain objects and errors cross as a structural snapshot that
//! keeps hold of the object it was taken from; everything else crosses by
//! reference. Marshalling never fails and never runs script code.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use fos_eventloop::{Promise, PromiseValue, Settled};
use fos_script::{Object, Property, PropertyKey, Value, WeakObject};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::bridge::BridgeInner;
use crate::wrapper;

/// Script object behind a structural value
///
/// Set when the value was marshalled from a script object, and on first
/// conversion for values built on the host side. Clones share it, so every
/// conversion of a settled value yields the same object, with identity,
/// later mutations and fields the snapshot leaves out all intact.
#[derive(Clone, Default)]
pub struct Origin(Rc<OnceCell<Object>>);

impl Origin {
    /// Value built on the host side
    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn of(object: &Object) -> Self {
        Self(Rc::new(OnceCell::from(object.clone())))
    }

    /// The script object, once there is one
    pub fn object(&self) -> Option<&Object> {
        self.0.get()
    }

    fn object_or_build(&self, build: impl FnOnce() -> Object) -> Value {
        Value::Object(self.0.get_or_init(build).clone())
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            Some(_) => write!(f, "Origin(object)"),
            None => write!(f, "Origin(-)"),
        }
    }
}

/// Host promise tagged with the wrapper it was unwrapped from
///
/// The tag is weak; wrappers carry no state of their own, so a dropped one
/// is simply re-created.
#[derive(Clone, Debug)]
pub struct BridgedPromise {
    primitive: Promise<HostValue>,
    wrapper: Option<WeakObject>,
}

impl BridgedPromise {
    pub fn new(primitive: Promise<HostValue>) -> Self {
        Self {
            primitive,
            wrapper: None,
        }
    }

    pub fn primitive(&self) -> &Promise<HostValue> {
        &self.primitive
    }
}

/// Structured error data
#[derive(Clone, Debug)]
pub struct HostError {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    /// Constituent reasons of an `AggregateError`
    pub errors: Vec<HostValue>,
    origin: Origin,
}

impl HostError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            errors: Vec::new(),
            origin: Origin::none(),
        }
    }

    pub fn aggregate(errors: Vec<HostValue>) -> Self {
        Self {
            errors,
            ..Self::new("AggregateError", "All promises were rejected")
        }
    }
}

/// Marshalled value carried by host promises
#[derive(Clone, Debug)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>, Origin),
    /// Own enumerable string-keyed properties in insertion order
    Map(Vec<(String, HostValue)>, Origin),
    Error(HostError),
    Promise(BridgedPromise),
    /// Script value passed by reference
    Opaque(Value),
}

impl HostValue {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn array(items: Vec<HostValue>) -> Self {
        Self::Array(items, Origin::none())
    }

    pub fn map(entries: Vec<(String, HostValue)>) -> Self {
        Self::Map(entries, Origin::none())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Property `key` of a map value
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            Self::Map(entries, _) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// JSON rendering; promises, opaque values and `undefined` become `null`
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Undefined | Self::Null | Self::Promise(_) | Self::Opaque(_) => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Number(n) => {
                JsonNumber::from_f64(*n).map(JsonValue::Number).unwrap_or(JsonValue::Null)
            }
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Array(items, _) => {
                JsonValue::Array(items.iter().map(HostValue::to_json).collect())
            }
            Self::Map(entries, _) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<JsonMap<_, _>>(),
            ),
            Self::Error(error) => {
                let mut object = JsonMap::new();
                object.insert("name".into(), JsonValue::String(error.name.clone()));
                object.insert("message".into(), JsonValue::String(error.message.clone()));
                if !error.errors.is_empty() {
                    object.insert(
                        "errors".into(),
                        JsonValue::Array(error.errors.iter().map(HostValue::to_json).collect()),
                    );
                }
                JsonValue::Object(object)
            }
        }
    }
}

impl From<JsonValue> for HostValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => {
                Self::array(items.into_iter().map(HostValue::from).collect())
            }
            JsonValue::Object(entries) => {
                Self::map(entries.into_iter().map(|(k, v)| (k, HostValue::from(v))).collect())
            }
        }
    }
}

impl PromiseValue for HostValue {
    fn as_promise(&self) -> Option<Promise<Self>> {
        match self {
            Self::Promise(bridged) => Some(bridged.primitive.clone()),
            _ => None,
        }
    }

    fn list(values: Vec<Self>) -> Self {
        Self::array(values)
    }

    fn settled(outcome: Settled<Self>) -> Self {
        match outcome {
            Settled::Fulfilled(value) => Self::map(vec![
                ("status".into(), Self::string("fulfilled")),
                ("value".into(), value),
            ]),
            Settled::Rejected(reason) => Self::map(vec![
                ("status".into(), Self::string("rejected")),
                ("reason".into(), reason),
            ]),
        }
    }

    fn aggregate_error(errors: Vec<Self>) -> Self {
        Self::Error(HostError::aggregate(errors))
    }

    fn type_error(message: &str) -> Self {
        Self::Error(HostError::new("TypeError", message))
    }

    fn panic_error(message: &str) -> Self {
        Self::Error(HostError::new("Error", format!("Promise handler panicked: {}", message)))
    }
}

// === Script -> host ===

/// Marshal a script value
pub(crate) fn to_host(bridge: &BridgeInner, value: &Value) -> HostValue {
    marshal(bridge, value, &mut Vec::new())
}

fn is_plain(bridge: &BridgeInner, object: &Object) -> bool {
    object.is_ordinary()
        && object
            .prototype()
            .is_none_or(|proto| proto.ptr_eq(&bridge.realm.intrinsics().object_prototype))
}

/// `path` holds the structural objects currently being snapshotted
fn marshal(bridge: &BridgeInner, value: &Value, path: &mut Vec<Object>) -> HostValue {
    let object = match value {
        Value::Undefined => return HostValue::Undefined,
        Value::Null => return HostValue::Null,
        Value::Bool(b) => return HostValue::Bool(*b),
        Value::Number(n) => return HostValue::Number(*n),
        Value::String(s) => return HostValue::String(s.to_string()),
        Value::Symbol(_) => return HostValue::Opaque(value.clone()),
        Value::Object(object) => object,
    };

    if let Some(primitive) = wrapper::unwrap_object(object) {
        return HostValue::Promise(BridgedPromise {
            primitive,
            wrapper: Some(object.downgrade()),
        });
    }
    let structural = object.is_array() || object.is_error() || is_plain(bridge, object);
    let cyclic = path.iter().any(|seen| seen.ptr_eq(object));
    if !structural || cyclic || path.len() >= bridge.config.max_marshal_depth {
        return HostValue::Opaque(value.clone());
    }

    path.push(object.clone());
    let snapshot = snapshot(bridge, object, path);
    path.pop();
    snapshot
}

/// Structural view of an array, error or plain object; accessor
/// properties are left out rather than invoked
fn snapshot(bridge: &BridgeInner, object: &Object, path: &mut Vec<Object>) -> HostValue {
    if let Some(items) = object.array_elements() {
        let items = items.iter().map(|item| marshal(bridge, item, path)).collect();
        return HostValue::Array(items, Origin::of(object));
    }

    if object.is_error() {
        let text = |key: &str| {
            object.peek(key).filter(|v| !v.is_undefined()).map(|v| v.to_string())
        };
        let listed = object.peek("errors");
        let errors = match listed.as_ref().and_then(Value::as_object) {
            Some(list) => list.array_elements().unwrap_or_default(),
            None => Vec::new(),
        };
        let errors = errors.iter().map(|e| marshal(bridge, e, path)).collect();
        return HostValue::Error(HostError {
            name: text("name").unwrap_or_else(|| "Error".to_string()),
            message: text("message").unwrap_or_default(),
            stack: text("stack"),
            errors,
            origin: Origin::of(object),
        });
    }

    let mut entries = Vec::new();
    for key in object.own_string_keys() {
        if let Some(Property::Data(property)) = object.get_own(&PropertyKey::from(key.clone())) {
            entries.push((key.to_string(), marshal(bridge, &property, path)));
        }
    }
    HostValue::Map(entries, Origin::of(object))
}

// === Host -> script ===

/// Convert a host value into the realm; host promises always come back as
/// wrappers
pub(crate) fn to_scripting(bridge: &BridgeInner, value: &HostValue) -> Value {
    let realm = &bridge.realm;
    match value {
        HostValue::Undefined => Value::Undefined,
        HostValue::Null => Value::Null,
        HostValue::Bool(b) => Value::Bool(*b),
        HostValue::Number(n) => Value::Number(*n),
        HostValue::String(s) => Value::string(s),
        HostValue::Opaque(value) => value.clone(),
        HostValue::Promise(bridged) => {
            let original = bridged
                .wrapper
                .as_ref()
                .and_then(WeakObject::upgrade)
                .filter(|w| {
                    wrapper::unwrap_object(w).is_some_and(|p| p.ptr_eq(&bridged.primitive))
                });
            let object =
                original.unwrap_or_else(|| wrapper::wrap(bridge, bridged.primitive.clone()));
            Value::Object(object)
        }
        HostValue::Array(items, origin) => origin.object_or_build(|| {
            realm.array(items.iter().map(|item| to_scripting(bridge, item)).collect())
        }),
        HostValue::Map(entries, origin) => origin.object_or_build(|| {
            let object = realm.object();
            for (key, item) in entries {
                object.set(key.as_str(), to_scripting(bridge, item));
            }
            object
        }),
        HostValue::Error(error) => error.origin.object_or_build(|| {
            let object = realm.new_named_error(&error.name, &error.message);
            if let Some(stack) = &error.stack {
                object.set("stack", stack.as_str());
            }
            if !error.errors.is_empty() || error.name == "AggregateError" {
                let errors = error.errors.iter().map(|e| to_scripting(bridge, e)).collect();
                object.set("errors", realm.array(errors));
            }
            object
        }),
    }
}
