//! Synthesis over the full range of library shapes, driven end to end
//! through the scheduler.

use crate::support::{
    alt_names_lib, callable_promise_lib, capture, defer_lib, factory_lib, nested_lib,
};
use core_types::{arg, Value};
use normalizer::{probe, synthesize, Scheduler};

fn resolve_with(value: Value) -> Value {
    Value::function(move |_this, args| {
        arg(&args, 0).invoke(Value::Undefined, vec![value.clone()])
    })
}

fn reject_with(reason: Value) -> Value {
    Value::function(move |_this, args| {
        arg(&args, 1).invoke(Value::Undefined, vec![reason.clone()])
    })
}

#[test]
fn test_defer_library_roundtrip() {
    let scheduler = Scheduler::new();
    let ctor = synthesize(&defer_lib(&scheduler), false);
    assert!(probe(&ctor).is_fully_conformant);

    let instance = ctor.construct(vec![resolve_with(Value::number(42.0))]).unwrap();
    let (on_fulfilled, seen) = capture();
    instance
        .get("then")
        .unwrap()
        .invoke(instance.clone(), vec![on_fulfilled])
        .unwrap();

    assert!(seen.borrow().is_none());
    scheduler.run_until_idle();
    assert_eq!(*seen.borrow(), Some(Value::number(42.0)));
}

#[test]
fn test_callable_factory_library_roundtrip() {
    let scheduler = Scheduler::new();
    let ctor = synthesize(&factory_lib(&scheduler), false);

    let instance = ctor.construct(vec![resolve_with(Value::string("ok"))]).unwrap();
    let (on_fulfilled, seen) = capture();
    instance
        .get("then")
        .unwrap()
        .invoke(instance.clone(), vec![on_fulfilled])
        .unwrap();

    scheduler.run_until_idle();
    assert_eq!(*seen.borrow(), Some(Value::string("ok")));
}

#[test]
fn test_callable_promise_member_is_invoked() {
    let scheduler = Scheduler::new();
    let ctor = synthesize(&callable_promise_lib(&scheduler), false);

    let instance = ctor.construct(vec![resolve_with(Value::number(7.0))]).unwrap();
    let (on_fulfilled, seen) = capture();
    instance
        .get("then")
        .unwrap()
        .invoke(instance.clone(), vec![on_fulfilled])
        .unwrap();

    scheduler.run_until_idle();
    assert_eq!(*seen.borrow(), Some(Value::number(7.0)));
}

#[test]
fn test_nested_constructor_wins_over_deferred_shape() {
    let scheduler = Scheduler::new();
    let lib = nested_lib(&scheduler);
    // Give the library a defer too; the nested constructor still wins.
    let decoy = defer_lib(&scheduler);
    lib.set("defer", decoy.get("defer").unwrap());

    let ctor = synthesize(&lib, false);
    assert_eq!(ctor, lib.get("Promise").unwrap());
}

#[test]
fn test_resolver_throw_becomes_rejection() {
    let scheduler = Scheduler::new();
    let ctor = synthesize(&defer_lib(&scheduler), false);

    let resolver = Value::function(|_this, _| {
        Err(core_types::JsError::type_error("resolver blew up"))
    });
    let instance = ctor.construct(vec![resolver]).unwrap();

    let (on_rejected, seen) = capture();
    instance
        .get("catch")
        .unwrap()
        .invoke(instance.clone(), vec![on_rejected])
        .unwrap();

    scheduler.run_until_idle();
    assert_eq!(
        *seen.borrow(),
        Some(Value::string("TypeError: resolver blew up"))
    );
}

#[test]
fn test_catch_falls_back_to_then_delegation() {
    let scheduler = Scheduler::new();
    // Deferreds whose stored promise exposes then but no catch.
    let lib = Value::object();
    let sched = scheduler.clone();
    lib.set(
        "defer",
        Value::function(move |_this, _| {
            let deferred = crate::support::make_deferred(&sched);
            let instance = deferred.get("promise").unwrap();
            let stripped = Value::object();
            stripped.set("then", instance.get("then").unwrap());
            deferred.set("promise", stripped);
            Ok(deferred)
        }),
    );

    let ctor = synthesize(&lib, false);
    let instance = ctor.construct(vec![reject_with(Value::string("nope"))]).unwrap();

    let (on_rejected, seen) = capture();
    instance
        .get("catch")
        .unwrap()
        .invoke(instance.clone(), vec![on_rejected])
        .unwrap();

    scheduler.run_until_idle();
    assert_eq!(*seen.borrow(), Some(Value::string("nope")));
}

#[test]
fn test_alternate_static_names_are_adopted() {
    let scheduler = Scheduler::new();
    let lib = alt_names_lib(&scheduler);
    let ctor = synthesize(&lib, false);

    assert_eq!(ctor.get("resolve"), lib.get("when"));
    assert_eq!(ctor.get("race"), lib.get("any"));
    // reject and all had no library counterpart: synthesized.
    assert!(probe(&ctor).is_fully_conformant);
}

#[test]
fn test_synthesized_resolve_and_reject() {
    let scheduler = Scheduler::new();
    let ctor = synthesize(&defer_lib(&scheduler), false);

    let resolved = ctor
        .get("resolve")
        .unwrap()
        .invoke(ctor.clone(), vec![Value::number(5.0)])
        .unwrap();
    let (on_fulfilled, seen) = capture();
    resolved
        .get("then")
        .unwrap()
        .invoke(resolved.clone(), vec![on_fulfilled])
        .unwrap();

    let rejected = ctor
        .get("reject")
        .unwrap()
        .invoke(ctor.clone(), vec![Value::string("bad")])
        .unwrap();
    let (on_rejected, reason) = capture();
    rejected
        .get("catch")
        .unwrap()
        .invoke(rejected.clone(), vec![on_rejected])
        .unwrap();

    scheduler.run_until_idle();
    assert_eq!(*seen.borrow(), Some(Value::number(5.0)));
    assert_eq!(*reason.borrow(), Some(Value::string("bad")));
}

#[test]
fn test_synthesized_all_preserves_input_order() {
    let scheduler = Scheduler::new();
    let ctor = synthesize(&defer_lib(&scheduler), false);

    // Plain values mixed with an already-resolved instance; completion
    // order differs from input order once the queue interleaves.
    let early = ctor.construct(vec![resolve_with(Value::number(2.0))]).unwrap();
    let sequence = Value::array(vec![Value::number(1.0), early, Value::number(3.0)]);

    let composite = ctor
        .get("all")
        .unwrap()
        .invoke(ctor.clone(), vec![sequence])
        .unwrap();
    let (on_fulfilled, seen) = capture();
    composite
        .get("then")
        .unwrap()
        .invoke(composite.clone(), vec![on_fulfilled])
        .unwrap();

    scheduler.run_until_idle();
    let result = seen.borrow().clone().unwrap();
    assert_eq!(
        result.array_elements(),
        Some(vec![
            Value::number(1.0),
            Value::number(2.0),
            Value::number(3.0)
        ])
    );
}

#[test]
fn test_all_counts_a_double_firing_element_once() {
    let scheduler = Scheduler::new();
    let lib = defer_lib(&scheduler);
    // Identity resolve adopted verbatim: elements reach all unwrapped,
    // so their own then implementations drive the callbacks directly.
    lib.set("when", Value::function(|_this, args| Ok(arg(&args, 0))));
    let ctor = synthesize(&lib, false);

    let noisy = Value::object();
    noisy.set(
        "then",
        Value::function(|_this, args| {
            let on_fulfilled = arg(&args, 0);
            on_fulfilled.invoke(Value::Undefined, vec![Value::number(1.0)])?;
            on_fulfilled.invoke(Value::Undefined, vec![Value::number(9.0)])
        }),
    );

    let deferred = crate::support::make_deferred(&scheduler);
    let sequence = Value::array(vec![noisy, deferred.get("promise").unwrap()]);

    let composite = ctor
        .get("all")
        .unwrap()
        .invoke(ctor.clone(), vec![sequence])
        .unwrap();
    let (on_fulfilled, seen) = capture();
    composite
        .get("then")
        .unwrap()
        .invoke(composite.clone(), vec![on_fulfilled])
        .unwrap();

    scheduler.run_until_idle();
    // The second fire must not have completed the countdown early.
    assert!(seen.borrow().is_none());

    deferred
        .get("resolve")
        .unwrap()
        .invoke(deferred.clone(), vec![Value::number(2.0)])
        .unwrap();
    scheduler.run_until_idle();
    assert_eq!(
        seen.borrow().clone().unwrap().array_elements(),
        Some(vec![Value::number(1.0), Value::number(2.0)])
    );
}

#[test]
fn test_all_ignores_rejection_from_an_already_fulfilled_element() {
    let scheduler = Scheduler::new();
    let lib = defer_lib(&scheduler);
    lib.set("when", Value::function(|_this, args| Ok(arg(&args, 0))));
    let ctor = synthesize(&lib, false);

    let fickle = Value::object();
    fickle.set(
        "then",
        Value::function(|_this, args| {
            arg(&args, 0).invoke(Value::Undefined, vec![Value::number(1.0)])?;
            arg(&args, 1).invoke(Value::Undefined, vec![Value::string("late")])
        }),
    );

    let deferred = crate::support::make_deferred(&scheduler);
    let sequence = Value::array(vec![fickle, deferred.get("promise").unwrap()]);

    let composite = ctor
        .get("all")
        .unwrap()
        .invoke(ctor.clone(), vec![sequence])
        .unwrap();
    let (on_fulfilled, value) = capture();
    let (on_rejected, reason) = capture();
    composite
        .get("then")
        .unwrap()
        .invoke(composite.clone(), vec![on_fulfilled, on_rejected])
        .unwrap();

    scheduler.run_until_idle();
    assert!(reason.borrow().is_none());

    deferred
        .get("resolve")
        .unwrap()
        .invoke(deferred.clone(), vec![Value::number(2.0)])
        .unwrap();
    scheduler.run_until_idle();
    assert!(reason.borrow().is_none());
    assert_eq!(
        value.borrow().clone().unwrap().array_elements(),
        Some(vec![Value::number(1.0), Value::number(2.0)])
    );
}

#[test]
fn test_synthesized_race_settles_once() {
    let scheduler = Scheduler::new();
    let ctor = synthesize(&defer_lib(&scheduler), false);

    let winner = ctor.construct(vec![resolve_with(Value::number(2.0))]).unwrap();
    let loser = ctor.construct(vec![reject_with(Value::string("late"))]).unwrap();
    let sequence = Value::array(vec![winner, loser]);

    let composite = ctor
        .get("race")
        .unwrap()
        .invoke(ctor.clone(), vec![sequence])
        .unwrap();
    let (on_fulfilled, value) = capture();
    let (on_rejected, reason) = capture();
    composite
        .get("then")
        .unwrap()
        .invoke(composite.clone(), vec![on_fulfilled, on_rejected])
        .unwrap();

    scheduler.run_until_idle();
    // First registered element won; the later rejection was latched out.
    assert_eq!(*value.borrow(), Some(Value::number(2.0)));
    assert!(reason.borrow().is_none());
}
