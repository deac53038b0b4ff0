//! Optional, explicitly non-standard constructor extensions.
//!
//! Extensions are callbacks applied to every constructor a context
//! produces. Each one adds a member only when it is absent, so applying
//! the same extension repeatedly (or normalizing the same library twice)
//! never duplicates or replaces anything.

use core_types::{arg, JsResult, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::policy::Settings;
use crate::synthesize::{attach_then, gap, sequence_arg, upgrade, wrap_resolve};

/// An extension callback applied to a freshly normalized constructor.
///
/// Receives the constructor, the library it was normalized from (absent
/// for the built-in conforming constructor), and the effective settings
/// of the normalization call.
pub type Extension = Rc<dyn Fn(&Value, Option<&Value>, &Settings)>;

/// Option key enabling the prototype-level `done` extension.
pub const DONE: &str = "done";

/// Option key enabling the static `settle` extension.
pub const SETTLE: &str = "settle";

/// `done(onFulfilled?, onRejected?)`: like `then`, but a rejection the
/// chain leaves unhandled surfaces on the error log instead of being
/// silently absorbed.
///
/// When the underlying stored promise has its own `done`, delegation is
/// preferred over the aliasing fallback.
pub fn done_extension() -> Extension {
    Rc::new(|ctor: &Value, _library, settings: &Settings| {
        if !settings.extension_enabled(DONE) {
            return;
        }
        let Some(prototype) = ctor.prototype() else {
            gap(settings.debug, "constructor has no prototype to extend");
            return;
        };
        if prototype.get("done").map_or(false, |v| v.is_callable()) {
            return;
        }
        prototype.set(
            "done",
            Value::function(move |this, args| {
                if let Some(stored) = this.get("promise") {
                    if let Some(done) = stored.get("done").filter(|d| d.is_callable()) {
                        return done.invoke(stored.clone(), args);
                    }
                }
                let chained = match this.get("then").filter(|t| t.is_callable()) {
                    Some(then) => then.invoke(this.clone(), args)?,
                    None => return Ok(Value::Undefined),
                };
                let terminal = Value::function(|_this, cargs| {
                    let reason = arg(&cargs, 0);
                    tracing::error!(target: "normalizer", %reason, "unhandled rejection");
                    Ok(Value::Undefined)
                });
                if let Some(then) = chained.get("then").filter(|t| t.is_callable()) {
                    then.invoke(chained.clone(), vec![Value::Undefined, terminal])?;
                }
                // done ends the chain; nothing to return.
                Ok(Value::Undefined)
            }),
        );
    })
}

/// Static `settle(sequence)`: waits for every element to settle and
/// fulfills with per-element outcome records. Never rejects.
pub fn settle_extension() -> Extension {
    Rc::new(|ctor: &Value, _library, settings: &Settings| {
        if !settings.extension_enabled(SETTLE) {
            return;
        }
        if ctor.get("settle").map_or(false, |v| v.is_callable()) {
            return;
        }
        let Value::Constructor(data) = ctor else {
            return;
        };
        let weak = Rc::downgrade(data);
        let debug = settings.debug;
        ctor.set("settle", Value::function(move |_this, args| {
            let ctor = upgrade(&weak)?;
            let elements = sequence_arg(&args, debug);
            let c = ctor.clone();
            let resolver = Value::function(move |_this, rargs| {
                let res = arg(&rargs, 0);

                if elements.is_empty() {
                    res.invoke(Value::Undefined, vec![Value::array(Vec::new())])?;
                    return Ok(Value::Undefined);
                }

                let records = Rc::new(RefCell::new(vec![Value::Undefined; elements.len()]));
                let remaining = Rc::new(Cell::new(elements.len()));

                for (index, element) in elements.iter().enumerate() {
                    let wrapped = wrap_resolve(&c, element.clone())?;

                    // Both continuations share one recorded flag so a
                    // misbehaving element settling twice is counted once.
                    let record_outcome = {
                        let records = records.clone();
                        let remaining = remaining.clone();
                        let res = res.clone();
                        let recorded = Rc::new(Cell::new(false));
                        move |record: Value| -> JsResult<Value> {
                            if recorded.replace(true) {
                                return Ok(Value::Undefined);
                            }
                            records.borrow_mut()[index] = record;
                            remaining.set(remaining.get() - 1);
                            if remaining.get() == 0 {
                                let ordered = records.borrow().clone();
                                res.invoke(Value::Undefined, vec![Value::array(ordered)])?;
                            }
                            Ok(Value::Undefined)
                        }
                    };

                    let on_fulfilled = {
                        let record_outcome = record_outcome.clone();
                        Value::function(move |_this, cargs| {
                            record_outcome(outcome_record(true, arg(&cargs, 0)))
                        })
                    };
                    let on_rejected = Value::function(move |_this, cargs| {
                        record_outcome(outcome_record(false, arg(&cargs, 0)))
                    });

                    attach_then(&wrapped, on_fulfilled, on_rejected, debug)?;
                }
                Ok(Value::Undefined)
            });
            ctor.construct(vec![resolver])
        }));
    })
}

fn outcome_record(fulfilled: bool, payload: Value) -> Value {
    let record = Value::object();
    record.set(
        "status",
        Value::string(if fulfilled { "fulfilled" } else { "rejected" }),
    );
    record.set("fulfilled", Value::boolean(fulfilled));
    record.set("rejected", Value::boolean(!fulfilled));
    record.set(if fulfilled { "value" } else { "reason" }, payload);
    record
}
