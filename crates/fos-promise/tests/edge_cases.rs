//! Edge case tests for fos-promise
//!
//! Drives the installed `Promise` global the way script code would: through
//! property reads, calls and constructs on the realm.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fos_eventloop::{EventLoop, UnhandledRejection};
use fos_promise::*;
use fos_script::{JsResult, Realm, Throw, Value, iterator};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    realm: Realm,
    event_loop: EventLoop,
    bridge: PromiseBridge,
}

fn setup() -> Harness {
    init_tracing();
    let realm = Realm::new();
    let event_loop = EventLoop::new();
    let bridge = PromiseBridge::install(&realm, &event_loop).unwrap();
    Harness {
        realm,
        event_loop,
        bridge,
    }
}

impl Harness {
    fn promise_global(&self) -> Value {
        self.realm.global().get(&self.realm, "Promise").unwrap()
    }

    /// `Promise[name](...args)`
    fn call(&self, name: &str, args: &[Value]) -> Value {
        self.realm.invoke(&self.promise_global(), name, args).unwrap()
    }

    /// `new Promise(executor)`
    fn construct<F>(&self, executor: F) -> JsResult<Value>
    where
        F: Fn(&Realm, &Value, &[Value]) -> JsResult<Value> + 'static,
    {
        let executor = self.realm.function("executor", executor);
        self.realm.construct(&self.promise_global(), &[executor.into()])
    }

    fn callback<F>(&self, body: F) -> Value
    where
        F: Fn(&Realm, &Value, &[Value]) -> JsResult<Value> + 'static,
    {
        self.realm.function("callback", body).into()
    }

    fn array(&self, items: Vec<Value>) -> Value {
        self.realm.array(items).into()
    }

    fn run(&self) {
        self.bridge.run_until_idle().unwrap();
    }

    fn fulfilled(&self, promise: &Value) -> Value {
        match self.bridge.inspect(promise) {
            Some(Inspection::Fulfilled(value)) => value,
            other => panic!("expected fulfilled promise, got {:?}", other),
        }
    }

    fn rejected(&self, promise: &Value) -> Value {
        match self.bridge.inspect(promise) {
            Some(Inspection::Rejected(reason)) => reason,
            other => panic!("expected rejected promise, got {:?}", other),
        }
    }

    fn is_pending(&self, promise: &Value) -> bool {
        matches!(self.bridge.inspect(promise), Some(Inspection::Pending))
    }

    fn prop(&self, target: &Value, key: &str) -> Value {
        self.realm.get_value(target, key).unwrap()
    }

    /// Element `index` of an array value
    fn at(&self, target: &Value, index: usize) -> Value {
        self.realm.get_value(target, index).unwrap()
    }

    /// Object with a `then` that resolves with `value` synchronously
    fn thenable(&self, value: Value) -> Value {
        let object = self.realm.object();
        object.set(
            "then",
            self.realm.function("then", move |realm, _, args| {
                realm.call(&args[0], &Value::Undefined, &[value.clone()])
            }),
        );
        object.into()
    }
}

// ============================================================================
// CONSTRUCTOR
// ============================================================================

#[test]
fn test_constructor_requires_new() {
    let h = setup();
    let executor = h.callback(|_, _, _| Ok(Value::Undefined));
    let err = h.realm.call(&h.promise_global(), &Value::Undefined, &[executor]).unwrap_err();
    assert!(h.prop(err.value(), "message").as_str().unwrap().contains("without 'new'"));
}

#[test]
fn test_executor_must_be_callable() {
    let h = setup();
    let err = h.realm.construct(&h.promise_global(), &[Value::from(5)]).unwrap_err();
    assert_eq!(h.prop(err.value(), "name").as_str(), Some("TypeError"));
    let message = h.prop(err.value(), "message");
    assert_eq!(message.as_str(), Some("Promise resolver 5 is not a function"));
}

#[test]
fn test_executor_runs_synchronously() {
    let h = setup();
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    let p = h
        .construct(move |realm, _, args| {
            flag.set(true);
            realm.call(&args[0], &Value::Undefined, &[Value::from(42)])
        })
        .unwrap();
    assert!(ran.get());
    h.run();
    assert_eq!(h.fulfilled(&p).as_number(), Some(42.0));
}

#[test]
fn test_executor_throw_rejects() {
    let h = setup();
    let p = h.construct(|_, _, _| Err(Throw::new("boom"))).unwrap();
    h.run();
    assert_eq!(h.rejected(&p).as_str(), Some("boom"));
}

#[test]
fn test_executor_throw_after_resolve_is_ignored() {
    let h = setup();
    let p = h
        .construct(|realm, _, args| {
            realm.call(&args[0], &Value::Undefined, &[Value::from("first")])?;
            Err(Throw::new("late"))
        })
        .unwrap();
    h.run();
    assert_eq!(h.fulfilled(&p).as_str(), Some("first"));
}

#[test]
fn test_first_settlement_wins() {
    let h = setup();
    let p = h
        .construct(|realm, _, args| {
            realm.call(&args[0], &Value::Undefined, &[Value::from(1)])?;
            realm.call(&args[0], &Value::Undefined, &[Value::from(2)])?;
            realm.call(&args[1], &Value::Undefined, &[Value::from(3)])
        })
        .unwrap();
    h.run();
    assert_eq!(h.fulfilled(&p).as_number(), Some(1.0));
}

#[test]
fn test_resolve_with_pending_promise_locks() {
    let h = setup();
    let pending = h.call("withResolvers", &[]);
    let inner = h.prop(&pending, "promise");
    let p = h
        .construct(move |realm, _, args| {
            realm.call(&args[0], &Value::Undefined, &[inner.clone()])?;
            // Locked in to `inner`; this reject is ignored
            realm.call(&args[1], &Value::Undefined, &[Value::from("ignored")])
        })
        .unwrap();
    h.run();
    assert!(h.is_pending(&p));

    h.realm
        .call(&h.prop(&pending, "resolve"), &Value::Undefined, &[Value::from("later")])
        .unwrap();
    h.run();
    assert_eq!(h.fulfilled(&p).as_str(), Some("later"));
}

#[test]
fn test_prototype_links() {
    let h = setup();
    let p = h.call("resolve", &[Value::from(1)]);
    let proto = p.as_object().unwrap().prototype().unwrap();
    let ctor = proto.get(&h.realm, "constructor").unwrap();
    assert!(ctor.strict_equals(&h.promise_global()));

    let tag = h.realm.get_value(&p, &h.realm.symbols().to_string_tag).unwrap();
    assert_eq!(tag.as_str(), Some("Promise"));
}

// ============================================================================
// RESOLVE / REJECT
// ============================================================================

#[test]
fn test_resolve_returns_same_wrapper() {
    let h = setup();
    let p = h.call("resolve", &[Value::from(1)]);
    let again = h.call("resolve", &[p.clone()]);
    assert!(again.strict_equals(&p));

    let (primitive, _resolvers) = h.event_loop.with_resolvers::<HostValue>();
    let wrapped: Value = h.bridge.wrap(primitive).into();
    assert!(h.call("resolve", &[wrapped.clone()]).strict_equals(&wrapped));
}

#[test]
fn test_resolve_adopts_thenable() {
    let h = setup();
    let thenable = h.thenable(Value::from("adopted"));
    let p = h.call("resolve", &[thenable.clone()]);
    assert!(!p.strict_equals(&thenable));
    h.run();
    assert_eq!(h.fulfilled(&p).as_str(), Some("adopted"));
}

#[test]
fn test_nested_thenables_flatten() {
    let h = setup();
    let inner = h.thenable(Value::from("deep"));
    let outer = h.thenable(inner);
    let p = h.call("resolve", &[outer]);
    h.run();
    assert_eq!(h.fulfilled(&p).as_str(), Some("deep"));
}

#[test]
fn test_reject_does_not_adopt() {
    let h = setup();
    let inner = h.call("resolve", &[Value::from(1)]);
    let p = h.call("reject", &[inner.clone()]);
    h.run();
    assert!(h.rejected(&p).strict_equals(&inner));
}

#[test]
fn test_null_and_undefined_stay_distinct() {
    let h = setup();
    let null = h.call("resolve", &[Value::Null]);
    let undefined = h.call("resolve", &[Value::Undefined]);
    h.run();
    assert!(h.fulfilled(&null).is_null());
    assert!(h.fulfilled(&undefined).is_undefined());
}

#[test]
fn test_error_reason_keeps_identity() {
    let h = setup();
    let error = h.realm.type_error("bad").into_value();
    let p = h.call("reject", &[error.clone()]);
    let seen = Rc::new(RefCell::new(Value::Undefined));
    let sink = seen.clone();
    let handler = h.callback(move |_, _, args| {
        *sink.borrow_mut() = args[0].clone();
        Ok(Value::Undefined)
    });
    h.realm.invoke(&p, "catch", &[handler]).unwrap();
    h.run();
    assert!(seen.borrow().strict_equals(&error));
}

#[test]
fn test_class_instance_crosses_by_reference() {
    let h = setup();
    let class_prototype = h.realm.object();
    let instance = h.realm.object_with_prototype(Some(class_prototype));
    instance.set("field", 1);
    let p = h.call("resolve", &[instance.clone().into()]);
    h.run();
    assert!(h.fulfilled(&p).as_object().unwrap().ptr_eq(&instance));
}

#[test]
fn test_reactions_share_object_after_source_dropped() {
    let h = setup();
    let p = {
        let object = h.realm.object();
        object.set("x", 1);
        h.call("resolve", &[object.into()])
    };
    let first = h.callback(|realm, _, args| {
        let x = realm.get_value(&args[0], "x")?;
        if let Some(object) = args[0].as_object() {
            object.set("y", x);
        }
        Ok(args[0].clone())
    });
    let first = h.realm.invoke(&p, "then", &[first]).unwrap();
    let identity = h.callback(|_, _, args| Ok(args[0].clone()));
    let second = h.realm.invoke(&p, "then", &[identity]).unwrap();
    h.run();

    let a = h.fulfilled(&first);
    let b = h.fulfilled(&second);
    assert!(a.strict_equals(&b));
    assert_eq!(h.prop(&b, "y").as_number(), Some(1.0));
}

#[test]
fn test_error_reason_keeps_custom_fields() {
    let h = setup();
    let p = {
        let error = h.realm.new_error(fos_script::ErrorKind::TypeError, "bad");
        error.set("code", 42);
        h.call("reject", &[error.into()])
    };
    let code = h.callback(|realm, _, args| realm.get_value(&args[0], "code"));
    let caught = h.realm.invoke(&p, "catch", &[code]).unwrap();
    h.run();
    assert_eq!(h.fulfilled(&caught).as_number(), Some(42.0));
}

#[test]
fn test_cyclic_object_fulfils() {
    let h = setup();
    let object = h.realm.object();
    object.set("self", object.clone());
    let p = h.call("resolve", &[object.clone().into()]);
    h.run();
    let value = h.fulfilled(&p);
    assert!(value.as_object().unwrap().ptr_eq(&object));
    assert!(h.prop(&value, "self").strict_equals(&value));
}

#[test]
fn test_resolve_does_not_run_getters() {
    let h = setup();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let object = h.realm.object();
    let getter = h.realm.function("get", move |realm, _, _| {
        counter.set(counter.get() + 1);
        Err(realm.type_error("getter ran"))
    });
    object.define_accessor("boom", Some(getter), None);

    let p = h.call("resolve", &[object.clone().into()]);
    h.run();
    assert_eq!(calls.get(), 0);
    assert!(h.fulfilled(&p).as_object().unwrap().ptr_eq(&object));
}

#[test]
fn test_deep_nesting_fulfils() {
    let h = setup();
    let mut value: Value = h.realm.object().into();
    for _ in 0..300 {
        value = h.array(vec![value]);
    }
    let p = h.call("resolve", &[value.clone()]);
    h.run();
    assert!(h.fulfilled(&p).strict_equals(&value));
}

// ============================================================================
// THEN / CATCH / FINALLY
// ============================================================================

#[test]
fn test_then_chain() {
    let h = setup();
    let p = h.call("resolve", &[Value::from(1)]);
    let add = h.callback(|_, _, args| Ok(Value::from(args[0].as_number().unwrap_or(0.0) + 1.0)));
    let p = h.realm.invoke(&p, "then", &[add]).unwrap();
    let times = h.callback(|_, _, args| Ok(Value::from(args[0].as_number().unwrap_or(0.0) * 10.0)));
    let p = h.realm.invoke(&p, "then", &[times]).unwrap();
    h.run();
    assert_eq!(h.fulfilled(&p).as_number(), Some(20.0));
}

#[test]
fn test_handlers_run_as_microtasks() {
    let h = setup();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let p = h.call("resolve", &[Value::from(1)]);
    let handler = h.callback(move |_, _, _| {
        counter.set(counter.get() + 1);
        Ok(Value::Undefined)
    });
    h.realm.invoke(&p, "then", &[handler]).unwrap();
    assert_eq!(calls.get(), 0);
    h.run();
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_then_throw_rejects_derived() {
    let h = setup();
    let p = h.call("resolve", &[Value::from(1)]);
    let thrower = h.callback(|realm, _, _| Err(realm.range_error("out of range")));
    let derived = h.realm.invoke(&p, "then", &[thrower]).unwrap();
    h.run();
    let reason = h.rejected(&derived);
    assert_eq!(h.prop(&reason, "name").as_str(), Some("RangeError"));
}

#[test]
fn test_non_callable_handlers_pass_through() {
    let h = setup();
    let p = h.call("resolve", &[Value::from("kept")]);
    let derived = h.realm.invoke(&p, "then", &[Value::from(5), Value::Null]).unwrap();
    let r = h.call("reject", &[Value::from("reason")]);
    let caught = h.realm.invoke(&r, "then", &[h.callback(|_, _, _| Ok(Value::Undefined))]).unwrap();
    let recovered = h
        .realm
        .invoke(&caught, "catch", &[h.callback(|_, _, args| Ok(args[0].clone()))])
        .unwrap();
    h.run();
    assert_eq!(h.fulfilled(&derived).as_str(), Some("kept"));
    assert_eq!(h.fulfilled(&recovered).as_str(), Some("reason"));
}

#[test]
fn test_then_returning_promise_is_adopted() {
    let h = setup();
    let pending = h.call("withResolvers", &[]);
    let inner = h.prop(&pending, "promise");
    let p = h.call("resolve", &[Value::from(1)]);
    let derived = h
        .realm
        .invoke(&p, "then", &[h.callback(move |_, _, _| Ok(inner.clone()))])
        .unwrap();
    h.run();
    assert!(h.is_pending(&derived));

    h.realm
        .call(&h.prop(&pending, "resolve"), &Value::Undefined, &[Value::from("inner")])
        .unwrap();
    h.run();
    assert_eq!(h.fulfilled(&derived).as_str(), Some("inner"));
}

#[test]
fn test_then_on_incompatible_receiver() {
    let h = setup();
    let p = h.call("resolve", &[Value::from(1)]);
    let then = h.prop(&p, "then");
    let err = h.realm.call(&then, &Value::from(3), &[]).unwrap_err();
    assert_eq!(h.prop(err.value(), "name").as_str(), Some("TypeError"));
}

#[test]
fn test_finally_passes_outcome_through() {
    let h = setup();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let p = h.call("resolve", &[Value::from("value")]);
    let cleanup = h.callback(move |_, _, args| {
        assert!(args.is_empty());
        counter.set(counter.get() + 1);
        Ok(Value::from("ignored"))
    });
    let derived = h.realm.invoke(&p, "finally", &[cleanup]).unwrap();
    h.run();
    assert_eq!(calls.get(), 1);
    assert_eq!(h.fulfilled(&derived).as_str(), Some("value"));

    let r = h.call("reject", &[Value::from("reason")]);
    let cleanup = h.callback(|_, _, _| Ok(Value::Undefined));
    let derived = h.realm.invoke(&r, "finally", &[cleanup]).unwrap();
    h.run();
    assert_eq!(h.rejected(&derived).as_str(), Some("reason"));
}

#[test]
fn test_finally_throw_overrides() {
    let h = setup();
    let p = h.call("resolve", &[Value::from("value")]);
    let derived = h
        .realm
        .invoke(&p, "finally", &[h.callback(|_, _, _| Err(Throw::new("cleanup failed")))])
        .unwrap();
    h.run();
    assert_eq!(h.rejected(&derived).as_str(), Some("cleanup failed"));
}

#[test]
fn test_finally_waits_for_returned_promise() {
    let h = setup();
    let pending = h.call("withResolvers", &[]);
    let inner = h.prop(&pending, "promise");
    let p = h.call("resolve", &[Value::from("original")]);
    let derived = h
        .realm
        .invoke(&p, "finally", &[h.callback(move |_, _, _| Ok(inner.clone()))])
        .unwrap();
    h.run();
    assert!(h.is_pending(&derived));

    h.realm
        .call(&h.prop(&pending, "resolve"), &Value::Undefined, &[Value::from("other")])
        .unwrap();
    h.run();
    assert_eq!(h.fulfilled(&derived).as_str(), Some("original"));
}

// ============================================================================
// COMBINATORS
// ============================================================================

#[test]
fn test_all_keeps_order_and_identity() {
    let h = setup();
    let payload = h.array(vec![Value::from("x")]);
    let items = h.array(vec![
        h.call("resolve", &[payload.clone()]),
        Value::from(2),
        h.thenable(Value::from("t")),
    ]);
    let p = h.call("all", &[items]);
    h.run();
    let result = h.fulfilled(&p);
    assert!(h.at(&result, 0).strict_equals(&payload));
    assert_eq!(h.at(&result, 1).as_number(), Some(2.0));
    assert_eq!(h.at(&result, 2).as_str(), Some("t"));
}

#[test]
fn test_all_rejects_with_first_rejection() {
    let h = setup();
    let pending = h.call("withResolvers", &[]);
    let items = h.array(vec![
        h.prop(&pending, "promise"),
        h.call("reject", &[Value::from("first")]),
        h.call("reject", &[Value::from("second")]),
    ]);
    let p = h.call("all", &[items]);
    h.run();
    assert_eq!(h.rejected(&p).as_str(), Some("first"));
}

#[test]
fn test_empty_inputs() {
    let h = setup();
    let all = h.call("all", &[h.array(vec![])]);
    let settled = h.call("allSettled", &[h.array(vec![])]);
    let race = h.call("race", &[h.array(vec![])]);
    let any = h.call("any", &[h.array(vec![])]);
    h.run();

    assert_eq!(h.prop(&h.fulfilled(&all), "length").as_number(), Some(0.0));
    assert_eq!(h.prop(&h.fulfilled(&settled), "length").as_number(), Some(0.0));
    assert!(h.is_pending(&race));
    let error = h.rejected(&any);
    assert_eq!(h.prop(&error, "name").as_str(), Some("AggregateError"));
    assert_eq!(h.prop(&h.prop(&error, "errors"), "length").as_number(), Some(0.0));
}

#[test]
fn test_all_settled_records() {
    let h = setup();
    let items = h.array(vec![
        Value::from(1),
        h.call("reject", &[Value::from("x")]),
        h.call("resolve", &[Value::from(3)]),
    ]);
    let p = h.call("allSettled", &[items]);
    h.run();
    let result = h.fulfilled(&p);
    assert_eq!(h.prop(&result, "length").as_number(), Some(3.0));

    let first = h.at(&result, 0);
    assert_eq!(h.prop(&first, "status").as_str(), Some("fulfilled"));
    assert_eq!(h.prop(&first, "value").as_number(), Some(1.0));
    let second = h.at(&result, 1);
    assert_eq!(h.prop(&second, "status").as_str(), Some("rejected"));
    assert_eq!(h.prop(&second, "reason").as_str(), Some("x"));
    let third = h.at(&result, 2);
    assert_eq!(h.prop(&third, "status").as_str(), Some("fulfilled"));
    assert_eq!(h.prop(&third, "value").as_number(), Some(3.0));
}

#[test]
fn test_all_result_elements_keep_identity_after_source_dropped() {
    let h = setup();
    let items = {
        let payload = h.realm.object();
        payload.set("n", 1);
        h.array(vec![h.array(vec![payload.into()])])
    };
    let p = h.call("all", &[items]);
    let seen = Rc::new(RefCell::new(Vec::new()));
    for _ in 0..2 {
        let sink = seen.clone();
        let record = h.callback(move |_, _, args| {
            sink.borrow_mut().push(args[0].clone());
            Ok(Value::Undefined)
        });
        h.realm.invoke(&p, "then", &[record]).unwrap();
    }
    h.run();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].strict_equals(&seen[1]));
    let payload = h.at(&h.at(&seen[0], 0), 0);
    assert_eq!(h.prop(&payload, "n").as_number(), Some(1.0));
}

#[test]
fn test_race_settles_with_first() {
    let h = setup();
    let pending = h.call("withResolvers", &[]);
    let fast = h.call("resolve", &[Value::from("fast")]);
    let items = h.array(vec![h.prop(&pending, "promise"), fast]);
    let p = h.call("race", &[items]);
    h.run();
    assert_eq!(h.fulfilled(&p).as_str(), Some("fast"));
}

#[test]
fn test_any_aggregates_rejections_in_order() {
    let h = setup();
    let items = h.array(vec![
        h.call("reject", &[Value::from("a")]),
        h.call("reject", &[Value::from("b")]),
    ]);
    let p = h.call("any", &[items]);
    h.run();
    let error = h.rejected(&p);
    assert_eq!(h.prop(&error, "name").as_str(), Some("AggregateError"));
    let errors = h.prop(&error, "errors");
    assert_eq!(h.at(&errors, 0).as_str(), Some("a"));
    assert_eq!(h.at(&errors, 1).as_str(), Some("b"));

    let items = h.array(vec![h.call("reject", &[Value::from("a")]), Value::from("plain")]);
    let p = h.call("any", &[items]);
    h.run();
    assert_eq!(h.fulfilled(&p).as_str(), Some("plain"));
}

#[test]
fn test_combinators_accept_any_iterable() {
    let h = setup();
    let set = h.realm.new_set(vec![Value::from(1), Value::from(2)]);
    let p = h.call("all", &[set.into()]);
    let chars = h.call("all", &[Value::from("ab")]);
    h.run();
    assert_eq!(h.prop(&h.fulfilled(&p), "length").as_number(), Some(2.0));
    assert_eq!(h.at(&h.fulfilled(&chars), 1).as_str(), Some("b"));
}

#[test]
fn test_iteration_failure_rejects_every_combinator() {
    let h = setup();
    for name in ["all", "race", "allSettled", "any"] {
        let iterable = h.realm.object();
        let method = h.realm.function("[Symbol.iterator]", |realm, _, _| {
            let step = Cell::new(0);
            Ok(iterator::from_fn(realm, move |_| {
                step.set(step.get() + 1);
                if step.get() == 2 {
                    return Err(Throw::new("iteration failed"));
                }
                Ok(Some(Value::from(1)))
            })
            .into())
        });
        iterable.set(&h.realm.symbols().iterator, method);

        let p = h.call(name, &[iterable.into()]);
        h.run();
        assert_eq!(h.rejected(&p).as_str(), Some("iteration failed"), "{}", name);
    }
}

#[test]
fn test_non_iterable_rejects() {
    let h = setup();
    for input in [Value::Undefined, Value::Null, Value::from(5), h.realm.object().into()] {
        let p = h.call("all", &[input]);
        h.run();
        let reason = h.rejected(&p);
        assert_eq!(h.prop(&reason, "name").as_str(), Some("TypeError"));
        assert!(h.prop(&reason, "message").as_str().unwrap().contains("is not iterable"));
    }
}

#[test]
fn test_iterable_length_limit() {
    init_tracing();
    let realm = Realm::new();
    let config = BridgeConfig {
        max_iterable_length: 3,
        ..BridgeConfig::default()
    };
    let bridge = PromiseBridge::install_with_config(&realm, &EventLoop::new(), config).unwrap();
    let items: Value = realm.array((0..4).map(|n: i32| Value::from(n)).collect()).into();
    let p = realm.invoke(&bridge.constructor().clone().into(), "all", &[items]).unwrap();
    bridge.run_until_idle().unwrap();
    let Some(Inspection::Rejected(reason)) = bridge.inspect(&p) else {
        panic!("expected rejection");
    };
    assert_eq!(realm.get_value(&reason, "name").unwrap().as_str(), Some("RangeError"));
}

// ============================================================================
// WITH RESOLVERS / TRY
// ============================================================================

#[test]
fn test_with_resolvers() {
    let h = setup();
    let record = h.call("withResolvers", &[]);
    let p = h.prop(&record, "promise");
    assert!(h.is_pending(&p));

    h.realm.call(&h.prop(&record, "reject"), &Value::Undefined, &[Value::from("r")]).unwrap();
    h.realm.call(&h.prop(&record, "resolve"), &Value::Undefined, &[Value::from("x")]).unwrap();
    h.run();
    assert_eq!(h.rejected(&p).as_str(), Some("r"));
}

#[test]
fn test_try_forwards_arguments() {
    let h = setup();
    let add = h.callback(|_, _, args| {
        let sum: f64 = args.iter().filter_map(Value::as_number).sum();
        Ok(Value::from(sum))
    });
    let p = h.call("try", &[add, Value::from(2), Value::from(3)]);
    h.run();
    assert_eq!(h.fulfilled(&p).as_number(), Some(5.0));
}

#[test]
fn test_try_catches_throw() {
    let h = setup();
    let p = h.call("try", &[h.callback(|_, _, _| Err(Throw::new("sync failure")))]);
    h.run();
    assert_eq!(h.rejected(&p).as_str(), Some("sync failure"));

    let p = h.call("try", &[Value::from("not callable")]);
    h.run();
    assert_eq!(h.prop(&h.rejected(&p), "name").as_str(), Some("TypeError"));
}

// ============================================================================
// HOST SIDE
// ============================================================================

#[test]
fn test_remote_promise_settled_from_thread() {
    let h = setup();
    let (p, settler) = h.bridge.remote_promise();
    let p: Value = p.into();
    let worker =
        std::thread::spawn(move || settler.resolve(json!({ "ok": true, "items": [1, 2] })));
    assert!(worker.join().unwrap());

    h.event_loop.wait_for_ingress().unwrap();
    let value = h.fulfilled(&p);
    assert_eq!(h.prop(&value, "ok").as_bool(), Some(true));
    assert_eq!(h.prop(&h.prop(&value, "items"), "length").as_number(), Some(2.0));
}

#[test]
fn test_dropped_remote_settler_rejects() {
    let h = setup();
    let (p, settler) = h.bridge.remote_promise();
    let p: Value = p.into();
    std::thread::spawn(move || drop(settler)).join().unwrap();
    h.event_loop.wait_for_ingress().unwrap();
    assert_eq!(h.prop(&h.rejected(&p), "name").as_str(), Some("TypeError"));
}

#[test]
fn test_unhandled_rejections_reported() {
    let h = setup();
    let reported: Rc<RefCell<Vec<UnhandledRejection>>> = Rc::default();
    let sink = reported.clone();
    h.event_loop.on_unhandled_rejection(move |rejection| sink.borrow_mut().push(rejection.clone()));

    h.call("reject", &[Value::from("lost")]);
    let handled = h.call("reject", &[Value::from("caught")]);
    h.realm
        .invoke(&handled, "catch", &[h.callback(|_, _, _| Ok(Value::Undefined))])
        .unwrap();
    h.run();

    let reported = reported.borrow();
    assert_eq!(reported.len(), 1);
    assert!(reported[0].reason.contains("lost"));
}

#[test]
fn test_host_promise_visible_to_script() {
    let h = setup();
    let (primitive, resolvers) = h.event_loop.with_resolvers::<HostValue>();
    let wrapped: Value = h.bridge.wrap(primitive.clone()).into();
    let seen = Rc::new(RefCell::new(Value::Undefined));
    let sink = seen.clone();
    h.realm
        .invoke(
            &wrapped,
            "then",
            &[h.callback(move |_, _, args| {
                *sink.borrow_mut() = args[0].clone();
                Ok(Value::Undefined)
            })],
        )
        .unwrap();

    resolvers.resolve(HostValue::map(vec![("id".into(), HostValue::Number(7.0))]));
    h.run();
    assert_eq!(h.prop(&seen.borrow(), "id").as_number(), Some(7.0));
    assert!(fos_promise::unwrap(&wrapped).is_some_and(|p| p.ptr_eq(&primitive)));
}

#[test]
fn test_shut_down_bridge_throws() {
    let realm = Realm::new();
    let event_loop = EventLoop::new();
    let bridge = PromiseBridge::install(&realm, &event_loop).unwrap();
    let ctor: Value = bridge.constructor().clone().into();
    let p = realm.invoke(&ctor, "resolve", &[Value::from(1)]).unwrap();
    drop(bridge);

    let err = realm.invoke(&p, "then", &[]).unwrap_err();
    let message = realm.get_value(err.value(), "message").unwrap();
    assert_eq!(message.as_str(), Some("Promise bridge has been shut down"));
}
