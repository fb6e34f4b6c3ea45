//! Iterable Consumption
//!
//! Collects combinator input. Native arrays are read directly; everything
//! else goes through the iteration protocol.

use fos_script::{JsResult, Object, Realm, Value};

/// The `Symbol.iterator` method of `value`
///
/// `Ok(None)` when there is none; a present but non-callable method is a
/// `TypeError`. This is the only place iterability is decided.
pub fn get_iterator_method(realm: &Realm, value: &Value) -> JsResult<Option<Value>> {
    if value.is_nullish() {
        return Ok(None);
    }
    let method = realm.get_value(value, &realm.symbols().iterator)?;
    if method.is_nullish() {
        return Ok(None);
    }
    if !method.is_callable() {
        return Err(realm.type_error("Symbol.iterator is not a function"));
    }
    Ok(Some(method))
}

fn not_iterable(realm: &Realm, value: &Value) -> fos_script::Throw {
    match value {
        Value::Undefined | Value::Null => realm.type_error(format!("{} is not iterable", value)),
        Value::Object(_) => realm.type_error(format!("{} is not iterable", value.type_of())),
        _ => realm.type_error(format!("{} {} is not iterable", value.type_of(), value)),
    }
}

/// Every element of `value`, in order
///
/// Errors raised while iterating propagate unchanged. More than `limit`
/// elements is a `RangeError`.
pub fn consume(realm: &Realm, value: &Value, limit: usize) -> JsResult<Vec<Value>> {
    if let Some(items) = value.as_object().and_then(Object::array_elements) {
        if items.len() > limit {
            return Err(realm.range_error(format!("Iterable yielded more than {} elements", limit)));
        }
        return Ok(items);
    }

    let method = get_iterator_method(realm, value)?.ok_or_else(|| not_iterable(realm, value))?;
    let iterator = realm.call(&method, value, &[])?;
    if iterator.as_object().is_none() {
        return Err(realm.type_error("Result of the Symbol.iterator method is not an object"));
    }
    let next = realm.get_value(&iterator, "next")?;
    if !next.is_callable() {
        return Err(realm.type_error("iterator.next is not a function"));
    }

    let mut items = Vec::new();
    loop {
        let result = realm.call(&next, &iterator, &[])?;
        let Some(result) = result.as_object() else {
            return Err(realm.type_error(format!("Iterator result {} is not an object", result)));
        };
        if result.get(realm, "done")?.is_truthy() {
            break;
        }
        if items.len() >= limit {
            return Err(realm.range_error(format!("Iterable yielded more than {} elements", limit)));
        }
        items.push(result.get(realm, "value")?);
    }
    tracing::trace!(count = items.len(), "Iterable consumed");
    Ok(items)
}
