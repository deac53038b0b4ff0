//! Every constructor the engine hands out honors one surface:
//! `new C(resolver)` with synchronous resolver invocation, instance
//! `then`/`catch`, the four statics, and the normalization marker.

use core_types::{arg, Value};
use normalizer::{conforming_constructor, synthesize, Promise, Scheduler};
use std::cell::Cell;
use std::rc::Rc;

const STATICS: [&str; 4] = ["resolve", "reject", "all", "race"];

/// Each probed shape a constructor can be synthesized from.
fn shapes(scheduler: &Scheduler) -> Vec<(&'static str, Value)> {
    let nested = Value::object();
    nested.set("Promise", conforming_constructor(scheduler));

    let deferred_factory = {
        let sched = scheduler.clone();
        let lib = Value::object();
        lib.set(
            "defer",
            Value::function(move |_this, _| {
                let promise = Promise::new(&sched);
                let deferred = Value::object();
                deferred.set("promise", promise.to_value());
                let p = promise.clone();
                deferred.set(
                    "resolve",
                    Value::function(move |_this, args| {
                        p.resolve(arg(&args, 0));
                        Ok(Value::Undefined)
                    }),
                );
                deferred.set(
                    "reject",
                    Value::function(move |_this, args| {
                        promise.reject(arg(&args, 0));
                        Ok(Value::Undefined)
                    }),
                );
                Ok(deferred)
            }),
        );
        lib
    };

    vec![
        ("conforming", conforming_constructor(scheduler)),
        ("nested", nested),
        ("deferred-factory", deferred_factory),
    ]
}

#[test]
fn test_surface_is_uniform_across_shapes() {
    let scheduler = Scheduler::new();
    for (shape, lib) in shapes(&scheduler) {
        let ctor = synthesize(&lib, false);
        assert!(ctor.is_normalized(), "{shape}: marker missing");
        for name in STATICS {
            assert!(
                ctor.get(name).map_or(false, |v| v.is_callable()),
                "{shape}: static {name} missing"
            );
        }

        let resolver = Value::function(|_this, _| Ok(Value::Undefined));
        let instance = ctor.construct(vec![resolver]).unwrap();
        for name in ["then", "catch"] {
            assert!(
                instance.get(name).map_or(false, |v| v.is_callable()),
                "{shape}: instance {name} missing"
            );
        }
    }
}

#[test]
fn test_resolver_is_invoked_synchronously() {
    let scheduler = Scheduler::new();
    for (shape, lib) in shapes(&scheduler) {
        let ctor = synthesize(&lib, false);
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let resolver = Value::function(move |_this, args| {
            flag.set(true);
            assert!(arg(&args, 0).is_callable());
            assert!(arg(&args, 1).is_callable());
            Ok(Value::Undefined)
        });
        ctor.construct(vec![resolver]).unwrap();
        assert!(called.get(), "{shape}: resolver not invoked during construction");
    }
}

#[test]
fn test_missing_resolver_raises_synchronously() {
    let scheduler = Scheduler::new();
    for (shape, lib) in shapes(&scheduler) {
        let ctor = synthesize(&lib, false);
        assert!(ctor.construct(vec![]).is_err(), "{shape}: accepted no resolver");
        assert!(
            ctor.construct(vec![Value::string("nope")]).is_err(),
            "{shape}: accepted non-callable resolver"
        );
    }
}

#[test]
fn test_continuations_fire_only_after_the_current_job() {
    let scheduler = Scheduler::new();
    for (shape, lib) in shapes(&scheduler) {
        let ctor = synthesize(&lib, false);
        let resolver = Value::function(|_this, args| {
            arg(&args, 0).invoke(Value::Undefined, vec![Value::number(1.0)])
        });
        let instance = ctor.construct(vec![resolver]).unwrap();

        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let on_fulfilled = Value::function(move |_this, _| {
            flag.set(true);
            Ok(Value::Undefined)
        });
        instance
            .get("then")
            .unwrap()
            .invoke(instance.clone(), vec![on_fulfilled])
            .unwrap();

        assert!(!fired.get(), "{shape}: continuation ran re-entrantly");
        scheduler.run_until_idle();
        assert!(fired.get(), "{shape}: continuation never dispatched");
    }
}
