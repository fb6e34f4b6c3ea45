//! Realm
//!
//! A global environment with its intrinsic prototypes and well-known
//! symbols. All objects are created through a realm.

use std::any::Any;
use std::rc::Rc;

use crate::error::{ErrorKind, JsResult, Throw};
use crate::iterator;
use crate::object::{Function, NativeCall, NativeConstruct, Object, ObjectKind, PropertyKey};
use crate::value::{Symbol, Value};

/// Intrinsic prototypes shared by every object of a realm
pub struct Intrinsics {
    pub object_prototype: Object,
    pub function_prototype: Object,
    pub array_prototype: Object,
    pub string_prototype: Object,
    pub iterator_prototype: Object,
    pub set_prototype: Object,
    pub map_prototype: Object,
    pub error_prototype: Object,
    pub type_error_prototype: Object,
    pub range_error_prototype: Object,
    pub aggregate_error_prototype: Object,
}

/// Well-known symbols
pub struct WellKnownSymbols {
    pub iterator: Symbol,
    pub to_string_tag: Symbol,
}

struct RealmInner {
    global: Object,
    intrinsics: Intrinsics,
    symbols: WellKnownSymbols,
}

/// Script realm
#[derive(Clone)]
pub struct Realm(Rc<RealmInner>);

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Realm {
    /// Create a realm with fresh intrinsics
    pub fn new() -> Self {
        let object_prototype = Object::with_kind(ObjectKind::Ordinary, None);
        let derived = || Object::with_kind(ObjectKind::Ordinary, Some(object_prototype.clone()));

        let error_prototype = derived();
        error_prototype.set("name", "Error");
        error_prototype.set("message", "");
        let error_subclass = |kind: ErrorKind| {
            let proto = Object::with_kind(ObjectKind::Ordinary, Some(error_prototype.clone()));
            proto.set("name", kind.name());
            proto
        };

        let intrinsics = Intrinsics {
            function_prototype: derived(),
            array_prototype: derived(),
            string_prototype: derived(),
            iterator_prototype: derived(),
            set_prototype: derived(),
            map_prototype: derived(),
            type_error_prototype: error_subclass(ErrorKind::TypeError),
            range_error_prototype: error_subclass(ErrorKind::RangeError),
            aggregate_error_prototype: error_subclass(ErrorKind::AggregateError),
            error_prototype,
            object_prototype,
        };

        let realm = Self(Rc::new(RealmInner {
            global: Object::with_kind(
                ObjectKind::Ordinary,
                Some(intrinsics.object_prototype.clone()),
            ),
            intrinsics,
            symbols: WellKnownSymbols {
                iterator: Symbol::new(Some("Symbol.iterator")),
                to_string_tag: Symbol::new(Some("Symbol.toStringTag")),
            },
        }));
        iterator::install(&realm);
        tracing::trace!("Realm created");
        realm
    }

    pub fn global(&self) -> &Object {
        &self.0.global
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.0.intrinsics
    }

    pub fn symbols(&self) -> &WellKnownSymbols {
        &self.0.symbols
    }

    // === Object creation ===

    /// Plain object inheriting from `Object.prototype`
    pub fn object(&self) -> Object {
        Object::with_kind(ObjectKind::Ordinary, Some(self.intrinsics().object_prototype.clone()))
    }

    /// Plain object with the given prototype
    pub fn object_with_prototype(&self, prototype: Option<Object>) -> Object {
        Object::with_kind(ObjectKind::Ordinary, prototype)
    }

    pub fn array(&self, items: Vec<Value>) -> Object {
        Object::with_kind(ObjectKind::Array(items), Some(self.intrinsics().array_prototype.clone()))
    }

    /// Set-like collection; duplicate members are dropped
    pub fn new_set(&self, values: Vec<Value>) -> Object {
        let prototype = self.intrinsics().set_prototype.clone();
        let set = Object::with_kind(ObjectKind::Set(Vec::new()), Some(prototype));
        for value in values {
            set.set_add(value);
        }
        set
    }

    /// Map-like collection; later entries replace earlier ones
    pub fn new_map(&self, entries: Vec<(Value, Value)>) -> Object {
        let prototype = self.intrinsics().map_prototype.clone();
        let map = Object::with_kind(ObjectKind::Map(Vec::new()), Some(prototype));
        for (key, value) in entries {
            map.map_insert(key, value);
        }
        map
    }

    /// Object carrying opaque host data
    pub fn host_object(&self, prototype: Option<Object>, data: Rc<dyn Any>) -> Object {
        Object::with_kind(ObjectKind::Host(data), prototype)
    }

    /// Native function
    pub fn function<F>(&self, name: &str, call: F) -> Object
    where
        F: Fn(&Realm, &Value, &[Value]) -> JsResult<Value> + 'static,
    {
        let call: NativeCall = Rc::new(call);
        Object::with_kind(
            ObjectKind::Function(Function::new(name, Some(call), None)),
            Some(self.intrinsics().function_prototype.clone()),
        )
    }

    /// Native constructor with separate call and construct behaviour
    pub fn constructor<F, C>(&self, name: &str, call: F, construct: C) -> Object
    where
        F: Fn(&Realm, &Value, &[Value]) -> JsResult<Value> + 'static,
        C: Fn(&Realm, &[Value]) -> JsResult<Value> + 'static,
    {
        let call: NativeCall = Rc::new(call);
        let construct: NativeConstruct = Rc::new(construct);
        Object::with_kind(
            ObjectKind::Function(Function::new(name, Some(call), Some(construct))),
            Some(self.intrinsics().function_prototype.clone()),
        )
    }

    // === Errors ===

    /// New error object of a built-in kind
    pub fn new_error(&self, kind: ErrorKind, message: &str) -> Object {
        let intrinsics = self.intrinsics();
        let prototype = match kind {
            ErrorKind::Error => &intrinsics.error_prototype,
            ErrorKind::TypeError => &intrinsics.type_error_prototype,
            ErrorKind::RangeError => &intrinsics.range_error_prototype,
            ErrorKind::AggregateError => &intrinsics.aggregate_error_prototype,
        };
        let error = Object::with_kind(ObjectKind::Error, Some(prototype.clone()));
        error.set("message", message);
        error.set("stack", format!("{}: {}\n    at <native>", kind.name(), message));
        error
    }

    /// New error object with an arbitrary name
    pub fn new_named_error(&self, name: &str, message: &str) -> Object {
        match ErrorKind::from_name(name) {
            Some(kind) => self.new_error(kind, message),
            None => {
                let error = self.new_error(ErrorKind::Error, message);
                error.set("name", name);
                error.set("stack", format!("{}: {}\n    at <native>", name, message));
                error
            }
        }
    }

    /// Exception carrying a new error object
    pub fn throw_error(&self, kind: ErrorKind, message: impl AsRef<str>) -> Throw {
        Throw(Value::Object(self.new_error(kind, message.as_ref())))
    }

    pub fn type_error(&self, message: impl AsRef<str>) -> Throw {
        self.throw_error(ErrorKind::TypeError, message)
    }

    pub fn range_error(&self, message: impl AsRef<str>) -> Throw {
        self.throw_error(ErrorKind::RangeError, message)
    }

    // === Operations ===

    /// `Call(callee, this, args)`
    pub fn call(&self, callee: &Value, this: &Value, args: &[Value]) -> JsResult<Value> {
        match callee.as_object().and_then(Object::call_behavior) {
            Some(call) => call(self, this, args),
            None => Err(self.type_error(format!("{} is not a function", callee))),
        }
    }

    /// `Construct(callee, args)`
    pub fn construct(&self, callee: &Value, args: &[Value]) -> JsResult<Value> {
        match callee.as_object().and_then(Object::construct_behavior) {
            Some(construct) => construct(self, args),
            None => Err(self.type_error(format!("{} is not a constructor", callee))),
        }
    }

    /// Property read on any value; primitives use their realm prototypes
    pub fn get_value(&self, target: &Value, key: impl Into<PropertyKey>) -> JsResult<Value> {
        let key = key.into();
        match target {
            Value::Object(object) => object.get_with_receiver(self, &key, target),
            Value::String(s) => {
                if let Some(name) = key.as_str() {
                    if name == "length" {
                        return Ok(Value::Number(s.chars().count() as f64));
                    }
                    if let Ok(index) = name.parse::<usize>() {
                        let found = s.chars().nth(index);
                        return Ok(found.map(|c| Value::string(c.to_string())).unwrap_or_default());
                    }
                }
                self.intrinsics().string_prototype.get_with_receiver(self, &key, target)
            }
            Value::Undefined | Value::Null => Err(self.type_error(format!(
                "Cannot read properties of {} (reading '{:?}')",
                target, key
            ))),
            _ => Ok(Value::Undefined),
        }
    }

    /// `Invoke(target, key, args)`
    pub fn invoke(
        &self,
        target: &Value,
        key: impl Into<PropertyKey>,
        args: &[Value],
    ) -> JsResult<Value> {
        let method = self.get_value(target, key)?;
        self.call(&method, target, args)
    }
}
