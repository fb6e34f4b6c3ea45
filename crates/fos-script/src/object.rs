//! Script Objects
//!
//! Reference-counted objects with ordered properties and a prototype chain.
//! Arrays, functions, errors, collections and host-backed objects are
//! ordinary objects with an internal kind.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::JsResult;
use crate::realm::Realm;
use crate::value::{Symbol, Value, format_number};

/// Native call behaviour: `(realm, this, args)`
pub type NativeCall = Rc<dyn Fn(&Realm, &Value, &[Value]) -> JsResult<Value>>;

/// Native construct behaviour: `(realm, args)`
pub type NativeConstruct = Rc<dyn Fn(&Realm, &[Value]) -> JsResult<Value>>;

/// Property key
#[derive(Clone, PartialEq)]
pub enum PropertyKey {
    String(Rc<str>),
    Symbol(Symbol),
}

impl PropertyKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Symbol(_) => None,
        }
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Symbol(s) => write!(f, "[{:?}]", s),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Rc<str>> for PropertyKey {
    fn from(s: Rc<str>) -> Self {
        Self::String(s)
    }
}

impl From<usize> for PropertyKey {
    fn from(i: usize) -> Self {
        Self::String(Rc::from(i.to_string()))
    }
}

impl From<Symbol> for PropertyKey {
    fn from(s: Symbol) -> Self {
        Self::Symbol(s)
    }
}

impl From<&Symbol> for PropertyKey {
    fn from(s: &Symbol) -> Self {
        Self::Symbol(s.clone())
    }
}

/// Own property slot
#[derive(Clone)]
pub enum Property {
    Data(Value),
    Accessor {
        get: Option<Object>,
        set: Option<Object>,
    },
}

pub(crate) struct Function {
    name: Rc<str>,
    call: Option<NativeCall>,
    construct: Option<NativeConstruct>,
}

impl Function {
    pub(crate) fn new(
        name: &str,
        call: Option<NativeCall>,
        construct: Option<NativeConstruct>,
    ) -> Self {
        Self {
            name: Rc::from(name),
            call,
            construct,
        }
    }
}

pub(crate) enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(Function),
    Error,
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Host(Rc<dyn Any>),
}

struct ObjectData {
    kind: ObjectKind,
    prototype: Option<Object>,
    properties: Vec<(PropertyKey, Property)>,
}

/// Script object handle
#[derive(Clone)]
pub struct Object(Rc<RefCell<ObjectData>>);

/// Non-owning object handle
#[derive(Clone)]
pub struct WeakObject(Weak<RefCell<ObjectData>>);

impl WeakObject {
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(object) => write!(f, "Weak({:?})", object),
            None => write!(f, "Weak(<dropped>)"),
        }
    }
}

/// Canonical array index of a string key
fn array_index(key: &str) -> Option<usize> {
    let index: usize = key.parse().ok()?;
    (index.to_string() == key).then_some(index)
}

impl Object {
    pub(crate) fn with_kind(kind: ObjectKind, prototype: Option<Object>) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            kind,
            prototype,
            properties: Vec::new(),
        })))
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    pub fn prototype(&self) -> Option<Object> {
        self.0.borrow().prototype.clone()
    }

    pub fn set_prototype(&self, prototype: Option<Object>) {
        self.0.borrow_mut().prototype = prototype;
    }

    // === Kind predicates ===

    /// Ordinary object with no internal kind
    pub fn is_ordinary(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::Ordinary)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::Array(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::Error)
    }

    pub fn is_set(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::Set(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.0.borrow().kind, ObjectKind::Map(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(&self.0.borrow().kind, ObjectKind::Function(f) if f.call.is_some())
    }

    pub fn is_constructor(&self) -> bool {
        matches!(&self.0.borrow().kind, ObjectKind::Function(f) if f.construct.is_some())
    }

    pub fn function_name(&self) -> Option<Rc<str>> {
        match &self.0.borrow().kind {
            ObjectKind::Function(f) => Some(f.name.clone()),
            _ => None,
        }
    }

    pub(crate) fn call_behavior(&self) -> Option<NativeCall> {
        match &self.0.borrow().kind {
            ObjectKind::Function(f) => f.call.clone(),
            _ => None,
        }
    }

    pub(crate) fn construct_behavior(&self) -> Option<NativeConstruct> {
        match &self.0.borrow().kind {
            ObjectKind::Function(f) => f.construct.clone(),
            _ => None,
        }
    }

    /// Host data attached to a host-backed object, if it has type `T`
    pub fn host_data<T: Any>(&self) -> Option<Rc<T>> {
        let data = match &self.0.borrow().kind {
            ObjectKind::Host(data) => data.clone(),
            _ => return None,
        };
        data.downcast::<T>().ok()
    }

    // === Elements ===

    /// Snapshot of an array's elements
    pub fn array_elements(&self) -> Option<Vec<Value>> {
        match &self.0.borrow().kind {
            ObjectKind::Array(items) => Some(items.clone()),
            _ => None,
        }
    }

    /// Element `index` of an array, `None` past the end
    pub fn array_get(&self, index: usize) -> Option<Value> {
        match &self.0.borrow().kind {
            ObjectKind::Array(items) => items.get(index).cloned(),
            _ => None,
        }
    }

    /// Element `index` of a set in insertion order
    pub fn set_value_at(&self, index: usize) -> Option<Value> {
        match &self.0.borrow().kind {
            ObjectKind::Set(values) => values.get(index).cloned(),
            _ => None,
        }
    }

    /// Add a value to a set; existing members are kept in place
    pub fn set_add(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        match &mut self.0.borrow_mut().kind {
            ObjectKind::Set(values) => {
                if !values.iter().any(|v| v.strict_equals(&value)) {
                    values.push(value);
                }
                true
            }
            _ => false,
        }
    }

    /// Entry `index` of a map in insertion order
    pub fn map_entry_at(&self, index: usize) -> Option<(Value, Value)> {
        match &self.0.borrow().kind {
            ObjectKind::Map(entries) => entries.get(index).cloned(),
            _ => None,
        }
    }

    /// Insert or replace a map entry
    pub fn map_insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        let (key, value) = (key.into(), value.into());
        match &mut self.0.borrow_mut().kind {
            ObjectKind::Map(entries) => {
                match entries.iter_mut().find(|(k, _)| k.strict_equals(&key)) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((key, value)),
                }
                true
            }
            _ => false,
        }
    }

    // === Properties ===

    /// Own property, without running accessors
    pub fn get_own(&self, key: &PropertyKey) -> Option<Property> {
        self.0
            .borrow()
            .properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p.clone())
    }

    /// Own keys in insertion order, array indices first
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let data = self.0.borrow();
        let mut keys = Vec::new();
        if let ObjectKind::Array(items) = &data.kind {
            keys.extend((0..items.len()).map(PropertyKey::from));
        }
        keys.extend(data.properties.iter().map(|(k, _)| k.clone()));
        keys
    }

    /// Own string keys in insertion order
    pub fn own_string_keys(&self) -> Vec<Rc<str>> {
        self.own_keys()
            .into_iter()
            .filter_map(|k| match k {
                PropertyKey::String(s) => Some(s),
                PropertyKey::Symbol(_) => None,
            })
            .collect()
    }

    /// Whether `key` is present on the object or its prototype chain
    pub fn has_property(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        let mut current = Some(self.clone());
        while let Some(object) = current {
            if object.exotic_get(&key).is_some() || object.get_own(&key).is_some() {
                return true;
            }
            current = object.prototype();
        }
        false
    }

    /// `[[Get]]`: walks the prototype chain, running getters with this
    /// object as receiver
    pub fn get(&self, realm: &Realm, key: impl Into<PropertyKey>) -> JsResult<Value> {
        let key = key.into();
        self.get_with_receiver(realm, &key, &Value::Object(self.clone()))
    }

    pub(crate) fn get_with_receiver(
        &self,
        realm: &Realm,
        key: &PropertyKey,
        receiver: &Value,
    ) -> JsResult<Value> {
        let mut current = Some(self.clone());
        while let Some(object) = current {
            if let Some(value) = object.exotic_get(key) {
                return Ok(value);
            }
            match object.get_own(key) {
                Some(Property::Data(value)) => return Ok(value),
                Some(Property::Accessor { get: Some(getter), .. }) => {
                    return realm.call(&Value::Object(getter), receiver, &[]);
                }
                Some(Property::Accessor { get: None, .. }) => return Ok(Value::Undefined),
                None => current = object.prototype(),
            }
        }
        Ok(Value::Undefined)
    }

    /// Data-only lookup along the prototype chain; never runs script
    pub fn peek(&self, key: impl Into<PropertyKey>) -> Option<Value> {
        let key = key.into();
        let mut current = Some(self.clone());
        while let Some(object) = current {
            if let Some(value) = object.exotic_get(&key) {
                return Some(value);
            }
            match object.get_own(&key) {
                Some(Property::Data(value)) => return Some(value),
                Some(Property::Accessor { .. }) => return None,
                None => current = object.prototype(),
            }
        }
        None
    }

    fn exotic_get(&self, key: &PropertyKey) -> Option<Value> {
        let name = key.as_str()?;
        match &self.0.borrow().kind {
            ObjectKind::Array(items) => {
                if name == "length" {
                    return Some(Value::Number(items.len() as f64));
                }
                array_index(name).and_then(|i| items.get(i).cloned())
            }
            ObjectKind::Set(values) if name == "size" => Some(Value::Number(values.len() as f64)),
            ObjectKind::Map(entries) if name == "size" => Some(Value::Number(entries.len() as f64)),
            _ => None,
        }
    }

    /// Create or overwrite an own data property
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let mut data = self.0.borrow_mut();

        if let (ObjectKind::Array(items), Some(name)) = (&mut data.kind, key.as_str()) {
            if name == "length" {
                if let Value::Number(n) = value {
                    if n >= 0.0 && n.fract() == 0.0 {
                        items.resize(n as usize, Value::Undefined);
                    }
                }
                return;
            }
            if let Some(index) = array_index(name) {
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                return;
            }
        }

        match data.properties.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = Property::Data(value),
            None => data.properties.push((key, Property::Data(value))),
        }
    }

    /// Define an accessor property
    pub fn define_accessor(
        &self,
        key: impl Into<PropertyKey>,
        get: Option<Object>,
        set: Option<Object>,
    ) {
        let key = key.into();
        let mut data = self.0.borrow_mut();
        let property = Property::Accessor { get, set };
        match data.properties.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = property,
            None => data.properties.push((key, property)),
        }
    }

    /// Short human-readable description, never runs script
    pub fn describe(&self) -> String {
        if let Some(name) = self.function_name() {
            return format!("function {}() {{ [native code] }}", name);
        }
        if self.is_error() {
            let name = self.peek("name").map(|v| v.to_string()).unwrap_or_else(|| "Error".into());
            let message = self.peek("message").map(|v| v.to_string()).unwrap_or_default();
            return if message.is_empty() { name } else { format!("{}: {}", name, message) };
        }
        if let Some(items) = self.array_elements() {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::Object(_) => "[object]".to_string(),
                    Value::Number(n) => format_number(*n),
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect();
            return parts.join(",");
        }
        if self.is_set() {
            return "[object Set]".to_string();
        }
        if self.is_map() {
            return "[object Map]".to_string();
        }
        "[object Object]".to_string()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:p}, {})", Rc::as_ptr(&self.0), self.describe())
    }
}
