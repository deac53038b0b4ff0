//! Constructor synthesis and static-method completion.
//!
//! Given a library of unknown shape, obtain a conforming base
//! constructor: prefer a constructor the library already exposes (under
//! one of the conventional nested names, or as the library value itself),
//! and otherwise wrap the library's deferred factory behind a synthesized
//! constructor. Whatever base is obtained, complete the four statics
//! from the library's own entry points where available, falling back to
//! implementations built only from `resolve` and `then`.
//!
//! Adaptation gaps (an operation with nothing underneath to delegate to)
//! are a diagnostic, never an error: the contract is best-effort
//! normalization over an open set of shapes.

use core_types::{arg, ConstructorData, JsError, JsResult, Value};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::probe::probe;

/// Error message for a missing or non-callable resolver argument.
pub(crate) const RESOLVER_REQUIRED: &str =
    "You must pass a resolver function as the first argument to the promise constructor";

// Different ecosystems expose the same entry points under different
// names; each table is tried in order.
const NESTED_CONSTRUCTOR_NAMES: [&str; 2] = ["Promise", "promise"];
const RESOLVE_NAMES: [&str; 2] = ["resolve", "when"];
const REJECT_NAMES: [&str; 1] = ["reject"];
const ALL_NAMES: [&str; 1] = ["all"];
const RACE_NAMES: [&str; 2] = ["race", "any"];

/// Emit an adaptation-gap diagnostic on the logging side channel.
///
/// The `debug` normalization option raises gaps from trace to debug
/// level; they never become errors.
pub(crate) fn gap(debug: bool, message: &str) {
    if debug {
        tracing::debug!(target: "normalizer", "{message}");
    } else {
        tracing::trace!(target: "normalizer", "{message}");
    }
}

/// Builds a conforming constructor around a library of unknown shape.
///
/// The result is marked as normalization-produced. When the library (or
/// a nested member of it) already is a conforming constructor, that
/// exact value is returned after completion and marking, never
/// re-wrapped.
pub fn synthesize(library: &Value, debug: bool) -> Value {
    let ctor = base_constructor(library, debug);
    fill_statics(&ctor, Some(library), debug);
    ctor.mark_normalized();
    ctor
}

fn base_constructor(library: &Value, debug: bool) -> Value {
    for name in NESTED_CONSTRUCTOR_NAMES {
        if let Some(nested) = library.get(name) {
            if probe(&nested).is_constructor {
                return nested;
            }
        }
    }
    if probe(library).is_constructor {
        return library.clone();
    }
    deferred_constructor(library, debug)
}

/// Wraps a deferred-factory library behind a resolver-style constructor.
fn deferred_constructor(library: &Value, debug: bool) -> Value {
    let prototype = Value::object();
    let lib = library.clone();
    let proto = prototype.clone();
    Value::constructor_with_prototype(prototype, move |args| {
        let resolver = arg(&args, 0);
        if !resolver.is_callable() {
            return Err(JsError::type_error(RESOLVER_REQUIRED));
        }

        let deferred = obtain_deferred(&lib, debug);
        let stored = deferred_promise(&deferred, debug);
        let resolve = settle_delegate(&deferred, "resolve", debug);
        let reject = settle_delegate(&deferred, "reject", debug);

        // A synchronous throw out of the resolver becomes a rejection,
        // never an error at the construction site.
        if let Err(err) = resolver.invoke(Value::Undefined, vec![resolve, reject.clone()]) {
            let _ = reject.invoke(Value::Undefined, vec![err.into()]);
        }

        Ok(instance_over(stored, proto.clone(), debug))
    })
}

/// Obtains a deferred from whichever factory shape the library has:
/// a `defer` method, or the library itself as a zero-argument callable.
fn obtain_deferred(library: &Value, debug: bool) -> Value {
    if let Some(defer) = library.get("defer").filter(|d| d.is_callable()) {
        return match defer.invoke(library.clone(), Vec::new()) {
            Ok(deferred) => deferred,
            Err(err) => {
                gap(debug, &format!("defer() failed: {err}"));
                Value::Undefined
            }
        };
    }
    if library.is_callable() {
        return match library.invoke(Value::Undefined, Vec::new()) {
            Ok(deferred) => deferred,
            Err(err) => {
                gap(debug, &format!("deferred factory failed: {err}"));
                Value::Undefined
            }
        };
    }
    gap(debug, "library exposes no deferred factory");
    Value::Undefined
}

/// Extracts the deferred's promise-like value. A callable `promise`
/// member is tried as a zero-argument function; anything else is used as
/// a plain value.
fn deferred_promise(deferred: &Value, debug: bool) -> Value {
    match deferred.get("promise") {
        Some(member) if member.is_callable() => {
            match member.invoke(deferred.clone(), Vec::new()) {
                Ok(promise) => promise,
                Err(err) => {
                    gap(debug, &format!("promise() failed: {err}"));
                    Value::Undefined
                }
            }
        }
        Some(member) => member,
        None => {
            gap(debug, "deferred carries no promise member");
            Value::Undefined
        }
    }
}

/// A settle function delegating to the deferred's `resolve`/`reject`,
/// or a no-op when the deferred lacks the operation.
fn settle_delegate(deferred: &Value, operation: &'static str, debug: bool) -> Value {
    let deferred = deferred.clone();
    Value::function(move |_this, args| {
        match deferred.get(operation).filter(|f| f.is_callable()) {
            Some(f) => {
                if let Err(err) = f.invoke(deferred.clone(), vec![arg(&args, 0)]) {
                    gap(debug, &format!("deferred {operation} failed: {err}"));
                }
            }
            None => gap(debug, &format!("deferred has no {operation}; ignoring")),
        }
        Ok(Value::Undefined)
    })
}

/// Builds the instance object over the stored promise-like value.
fn instance_over(stored: Value, prototype: Value, debug: bool) -> Value {
    let instance = Value::object();
    instance.set_prototype(prototype);
    instance.set("promise", stored.clone());

    let target = stored.clone();
    instance.set(
        "then",
        Value::function(move |_this, args| {
            match target.get("then").filter(|t| t.is_callable()) {
                Some(then) => then.invoke(target.clone(), args),
                None => {
                    gap(debug, "no underlying then to delegate to");
                    Ok(Value::Undefined)
                }
            }
        }),
    );

    let target = stored;
    instance.set(
        "catch",
        Value::function(move |_this, args| {
            if let Some(catch) = target.get("catch").filter(|c| c.is_callable()) {
                return catch.invoke(target.clone(), args);
            }
            if let Some(then) = target.get("then").filter(|t| t.is_callable()) {
                return then.invoke(target.clone(), vec![Value::Undefined, arg(&args, 0)]);
            }
            gap(debug, "no underlying catch or then to delegate to");
            Ok(Value::Undefined)
        }),
    );

    instance
}

/// Completes missing `resolve`/`reject`/`all`/`race` statics on a base
/// constructor.
///
/// Each static is filled only if absent: first from the library's own
/// entry points (under their alternate names), else from a fallback
/// built on the constructor itself. Fallbacks hold the constructor
/// weakly; the static map lives inside the constructor, and a strong
/// capture would never drop.
pub(crate) fn fill_statics(ctor: &Value, library: Option<&Value>, debug: bool) {
    let Value::Constructor(data) = ctor else {
        return;
    };

    let complete = |name: &str, alternates: &[&str], fallback: Value| {
        if ctor.get(name).map_or(false, |v| v.is_callable()) {
            return;
        }
        if let Some(lib) = library {
            for alt in alternates {
                if let Some(f) = lib.get(alt) {
                    if f.is_callable() {
                        ctor.set(name, f);
                        return;
                    }
                }
            }
        }
        ctor.set(name, fallback);
    };

    complete("resolve", &RESOLVE_NAMES, synth_resolve(Rc::downgrade(data)));
    complete("reject", &REJECT_NAMES, synth_reject(Rc::downgrade(data)));
    complete("all", &ALL_NAMES, synth_all(Rc::downgrade(data), debug));
    complete("race", &RACE_NAMES, synth_race(Rc::downgrade(data), debug));
}

pub(crate) fn upgrade(ctor: &Weak<ConstructorData>) -> JsResult<Value> {
    ctor.upgrade()
        .map(Value::Constructor)
        .ok_or_else(|| JsError::internal("constructor was released"))
}

fn synth_resolve(ctor: Weak<ConstructorData>) -> Value {
    Value::function(move |_this, args| {
        let ctor = upgrade(&ctor)?;
        let value = arg(&args, 0);
        let resolver = Value::function(move |_this, rargs| {
            arg(&rargs, 0).invoke(Value::Undefined, vec![value.clone()])
        });
        ctor.construct(vec![resolver])
    })
}

fn synth_reject(ctor: Weak<ConstructorData>) -> Value {
    Value::function(move |_this, args| {
        let ctor = upgrade(&ctor)?;
        let reason = arg(&args, 0);
        let resolver = Value::function(move |_this, rargs| {
            arg(&rargs, 1).invoke(Value::Undefined, vec![reason.clone()])
        });
        ctor.construct(vec![resolver])
    })
}

/// `all` built from `resolve` and `then`: order-preserving result slots,
/// a countdown of outstanding elements, and a single settled-latch so
/// exactly one settlement happens no matter how elements complete.
fn synth_all(ctor: Weak<ConstructorData>, debug: bool) -> Value {
    Value::function(move |_this, args| {
        let ctor = upgrade(&ctor)?;
        let elements = sequence_arg(&args, debug);
        let c = ctor.clone();
        let resolver = Value::function(move |_this, rargs| {
            let res = arg(&rargs, 0);
            let rej = arg(&rargs, 1);

            if elements.is_empty() {
                res.invoke(Value::Undefined, vec![Value::array(Vec::new())])?;
                return Ok(Value::Undefined);
            }

            let results = Rc::new(RefCell::new(vec![Value::Undefined; elements.len()]));
            let remaining = Rc::new(Cell::new(elements.len()));
            let settled = Rc::new(Cell::new(false));

            for (index, element) in elements.iter().enumerate() {
                let wrapped = wrap_resolve(&c, element.clone())?;

                // One counted flag per element, shared by both
                // continuations: an element settles the accounting at
                // most once, however often its thenable fires.
                let counted = Rc::new(Cell::new(false));

                let results = results.clone();
                let remaining = remaining.clone();
                let latch = settled.clone();
                let res = res.clone();
                let flag = counted.clone();
                let on_fulfilled = Value::function(move |_this, cargs| {
                    if flag.replace(true) || latch.get() {
                        return Ok(Value::Undefined);
                    }
                    results.borrow_mut()[index] = arg(&cargs, 0);
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 && !latch.replace(true) {
                        let ordered = results.borrow().clone();
                        res.invoke(Value::Undefined, vec![Value::array(ordered)])?;
                    }
                    Ok(Value::Undefined)
                });

                let latch = settled.clone();
                let rej = rej.clone();
                let on_rejected = Value::function(move |_this, cargs| {
                    if counted.replace(true) {
                        return Ok(Value::Undefined);
                    }
                    if !latch.replace(true) {
                        rej.invoke(Value::Undefined, vec![arg(&cargs, 0)])?;
                    }
                    Ok(Value::Undefined)
                });

                attach_then(&wrapped, on_fulfilled, on_rejected, debug)?;
            }
            Ok(Value::Undefined)
        });
        ctor.construct(vec![resolver])
    })
}

/// `race` built from `resolve` and `then`: the first settlement of any
/// kind wins, under the same latch discipline as `all`.
fn synth_race(ctor: Weak<ConstructorData>, debug: bool) -> Value {
    Value::function(move |_this, args| {
        let ctor = upgrade(&ctor)?;
        let elements = sequence_arg(&args, debug);
        let c = ctor.clone();
        let resolver = Value::function(move |_this, rargs| {
            let res = arg(&rargs, 0);
            let rej = arg(&rargs, 1);
            let settled = Rc::new(Cell::new(false));

            // No per-element accounting here: the shared latch is the
            // only state, so a double-firing element is already inert
            // after its first signal.
            for element in &elements {
                let wrapped = wrap_resolve(&c, element.clone())?;

                let latch = settled.clone();
                let res = res.clone();
                let on_fulfilled = Value::function(move |_this, cargs| {
                    if !latch.replace(true) {
                        res.invoke(Value::Undefined, vec![arg(&cargs, 0)])?;
                    }
                    Ok(Value::Undefined)
                });

                let latch = settled.clone();
                let rej = rej.clone();
                let on_rejected = Value::function(move |_this, cargs| {
                    if !latch.replace(true) {
                        rej.invoke(Value::Undefined, vec![arg(&cargs, 0)])?;
                    }
                    Ok(Value::Undefined)
                });

                attach_then(&wrapped, on_fulfilled, on_rejected, debug)?;
            }
            Ok(Value::Undefined)
        });
        ctor.construct(vec![resolver])
    })
}

/// Wraps a sequence element through the constructor's `resolve` so plain
/// values mix with asynchronous ones.
pub(crate) fn wrap_resolve(ctor: &Value, value: Value) -> JsResult<Value> {
    match ctor.get("resolve").filter(|r| r.is_callable()) {
        Some(resolve) => resolve.invoke(ctor.clone(), vec![value]),
        None => Err(JsError::internal("constructor lost its resolve static")),
    }
}

/// Attaches continuations to a wrapped element. A non-thenable wrap
/// result is treated as an already-settled value.
pub(crate) fn attach_then(
    target: &Value,
    on_fulfilled: Value,
    on_rejected: Value,
    debug: bool,
) -> JsResult<Value> {
    match target.get("then").filter(|t| t.is_callable()) {
        Some(then) => then.invoke(target.clone(), vec![on_fulfilled, on_rejected]),
        None => {
            gap(debug, "wrapped element is not thenable; treating as settled value");
            on_fulfilled.invoke(Value::Undefined, vec![target.clone()])
        }
    }
}

/// The sequence argument of `all`/`race`/`settle`; non-arrays are
/// treated as empty (there is no iterator protocol to fall back to).
pub(crate) fn sequence_arg(args: &[Value], debug: bool) -> Vec<Value> {
    match arg(args, 0).array_elements() {
        Some(elements) => elements,
        None => {
            gap(debug, "expected an array of values; treating as empty");
            Vec::new()
        }
    }
}
