//! Capability probing.
//!
//! Classification is behavioral, never nominal: the only way to know
//! whether an unknown value acts as a resolver-style constructor is to
//! construct it and watch what it hands the resolver. Probing therefore
//! runs the candidate's construction path, including whatever side
//! effects that entails.

use core_types::{arg, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Static members a fully conformant constructor must expose.
pub(crate) const REQUIRED_STATICS: [&str; 4] = ["resolve", "reject", "all", "race"];

/// The probed capabilities of a candidate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    /// Constructing the candidate with a resolver hands the resolver two
    /// callable arguments
    pub is_constructor: bool,
    /// `is_constructor` plus callable `resolve`, `reject`, `all`, `race`
    /// statics
    pub is_fully_conformant: bool,
}

/// Probes a candidate for resolver-constructor shape and full
/// conformance.
///
/// A candidate whose construction fails, or whose resolver is never
/// called, or is called with non-callable arguments, reports false for
/// both capabilities; the failure never propagates to the caller.
pub fn probe(candidate: &Value) -> ProbeReport {
    let is_constructor = probes_as_constructor(candidate);
    let is_fully_conformant = is_constructor
        && REQUIRED_STATICS
            .iter()
            .all(|name| candidate.get(name).map_or(false, |v| v.is_callable()));
    ProbeReport {
        is_constructor,
        is_fully_conformant,
    }
}

fn probes_as_constructor(candidate: &Value) -> bool {
    if !candidate.is_constructor_value() {
        return false;
    }

    let captured: Rc<RefCell<(Value, Value)>> =
        Rc::new(RefCell::new((Value::Undefined, Value::Undefined)));
    let slots = captured.clone();
    let resolver = Value::function(move |_this, args| {
        let mut slots = slots.borrow_mut();
        slots.0 = arg(&args, 0);
        slots.1 = arg(&args, 1);
        Ok(Value::Undefined)
    });

    // A throwing constructor (or resolver) is non-conformant, not an error.
    if candidate.construct(vec![resolver]).is_err() {
        return false;
    }

    let slots = captured.borrow();
    slots.0.is_callable() && slots.1.is_callable()
}
