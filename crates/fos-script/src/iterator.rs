//! Native Iterators
//!
//! `Symbol.iterator` for arrays, strings, sets and maps, plus helpers for
//! building iterator objects from Rust closures.

use std::cell::{Cell, RefCell};

use crate::error::JsResult;
use crate::object::Object;
use crate::realm::Realm;
use crate::value::Value;

/// Iterator result object `{ value, done }`
pub fn iter_result(realm: &Realm, value: Value, done: bool) -> Object {
    let result = realm.object();
    result.set("value", value);
    result.set("done", done);
    result
}

/// Iterator object whose `next` is driven by `step`
///
/// `step` returns `Ok(None)` once exhausted; the iterator then keeps
/// reporting `done: true`.
pub fn from_fn<F>(realm: &Realm, step: F) -> Object
where
    F: FnMut(&Realm) -> JsResult<Option<Value>> + 'static,
{
    let step = RefCell::new(step);
    let finished = Cell::new(false);
    let next = realm.function("next", move |realm, _, _| {
        if finished.get() {
            return Ok(iter_result(realm, Value::Undefined, true).into());
        }
        let produced = (step.borrow_mut())(realm)?;
        match produced {
            Some(value) => Ok(iter_result(realm, value, false).into()),
            None => {
                finished.set(true);
                Ok(iter_result(realm, Value::Undefined, true).into())
            }
        }
    });
    let iterator = realm.object_with_prototype(Some(realm.intrinsics().iterator_prototype.clone()));
    iterator.set("next", next);
    iterator
}

fn receiver_object(realm: &Realm, this: &Value, what: &str) -> JsResult<Object> {
    this.as_object()
        .cloned()
        .ok_or_else(|| {
            realm.type_error(format!("{} iterator called on incompatible receiver {}", what, this))
        })
}

pub(crate) fn install(realm: &Realm) {
    let symbols = realm.symbols();
    let intrinsics = realm.intrinsics();

    let identity = realm.function("[Symbol.iterator]", |_, this, _| Ok(this.clone()));
    intrinsics.iterator_prototype.set(&symbols.iterator, identity);

    let array_values = realm.function("values", |realm, this, _| {
        let array = receiver_object(realm, this, "Array")?;
        let index = Cell::new(0usize);
        Ok(from_fn(realm, move |_| {
            let i = index.get();
            index.set(i + 1);
            Ok(array.array_get(i))
        })
        .into())
    });
    intrinsics.array_prototype.set(&symbols.iterator, array_values);

    let string_values = realm.function("[Symbol.iterator]", |realm, this, _| {
        let text = this
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| realm.type_error(format!("String iterator called on {}", this)))?;
        let mut chars: Vec<char> = text.chars().collect();
        chars.reverse();
        Ok(from_fn(realm, move |_| Ok(chars.pop().map(|c| Value::string(c.to_string())))).into())
    });
    intrinsics.string_prototype.set(&symbols.iterator, string_values);

    let set_values = realm.function("values", |realm, this, _| {
        let set = receiver_object(realm, this, "Set")?;
        let index = Cell::new(0usize);
        Ok(from_fn(realm, move |_| {
            let i = index.get();
            index.set(i + 1);
            Ok(set.set_value_at(i))
        })
        .into())
    });
    intrinsics.set_prototype.set(&symbols.iterator, set_values);

    let map_entries = realm.function("entries", |realm, this, _| {
        let map = receiver_object(realm, this, "Map")?;
        let index = Cell::new(0usize);
        Ok(from_fn(realm, move |realm| {
            let i = index.get();
            index.set(i + 1);
            Ok(map.map_entry_at(i).map(|(k, v)| Value::Object(realm.array(vec![k, v]))))
        })
        .into())
    });
    intrinsics.map_prototype.set(&symbols.iterator, map_entries);
}
