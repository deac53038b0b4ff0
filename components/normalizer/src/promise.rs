//! Asynchronous-value state machine.
//!
//! This is the conforming implementation the rest of the engine falls
//! back on: a value that settles exactly once, notifies continuations
//! through the shared microtask queue, and chains through `then` with
//! thenable adoption. [`conforming_constructor`] wraps the state machine
//! in a dynamic constructor [`Value`] so it can stand in for a
//! host-native asynchronous-value implementation.

use core_types::{arg, JsError, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::scheduler::Scheduler;
use crate::synthesize;

/// The settlement state of a promise.
///
/// Settlement is monotonic: once Fulfilled or Rejected, the state never
/// changes again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromiseState {
    /// Neither fulfilled nor rejected yet
    Pending,
    /// Settled with a value
    Fulfilled,
    /// Settled with a failure reason
    Rejected,
}

/// A continuation registered via `then`, together with the promise it
/// settles.
struct Reaction {
    on_fulfilled: Option<Value>,
    on_rejected: Option<Value>,
    next: Promise,
}

struct Inner {
    state: PromiseState,
    outcome: Option<Value>,
    reactions: Vec<Reaction>,
}

/// A promise over dynamic [`Value`]s.
///
/// Cloning yields another handle to the same underlying state. All
/// continuation dispatch goes through the scheduler the promise was
/// created with; handlers registered on an already-settled promise still
/// fire asynchronously.
#[derive(Clone)]
pub struct Promise {
    inner: Rc<RefCell<Inner>>,
    scheduler: Scheduler,
}

impl Promise {
    /// Creates a new pending promise on the given scheduler.
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: PromiseState::Pending,
                outcome: None,
                reactions: Vec::new(),
            })),
            scheduler: scheduler.clone(),
        }
    }

    /// Returns the current settlement state.
    pub fn state(&self) -> PromiseState {
        self.inner.borrow().state.clone()
    }

    /// Returns the settled value or rejection reason, if settled.
    pub fn outcome(&self) -> Option<Value> {
        self.inner.borrow().outcome.clone()
    }

    /// Resolves the promise.
    ///
    /// A value carrying a callable `then` is adopted: this promise
    /// eventually mirrors the thenable's outcome instead of fulfilling
    /// with the thenable itself. A latch guards against thenables that
    /// call both of their callbacks. No-op once settled.
    pub fn resolve(&self, value: Value) {
        if self.state() != PromiseState::Pending {
            return;
        }
        let thenable = value.get("then").filter(|t| t.is_callable());
        if let Some(then) = thenable {
            let settled = Rc::new(Cell::new(false));

            let target = self.clone();
            let flag = settled.clone();
            let on_fulfilled = Value::function(move |_this, args| {
                if !flag.replace(true) {
                    target.resolve(arg(&args, 0));
                }
                Ok(Value::Undefined)
            });

            let target = self.clone();
            let flag = settled.clone();
            let on_rejected = Value::function(move |_this, args| {
                if !flag.replace(true) {
                    target.reject(arg(&args, 0));
                }
                Ok(Value::Undefined)
            });

            if let Err(err) = then.invoke(value, vec![on_fulfilled, on_rejected]) {
                if !settled.replace(true) {
                    self.reject(err.into());
                }
            }
            return;
        }
        self.settle(PromiseState::Fulfilled, value);
    }

    /// Rejects the promise with a reason. No-op once settled.
    pub fn reject(&self, reason: Value) {
        self.settle(PromiseState::Rejected, reason);
    }

    /// Registers continuations and returns the chained promise.
    ///
    /// Missing (or non-callable) handlers pass the outcome through to the
    /// chained promise. A handler's `Ok` return resolves the chained
    /// promise (with thenable adoption); an `Err` rejects it.
    pub fn then(&self, on_fulfilled: Option<Value>, on_rejected: Option<Value>) -> Promise {
        let next = Promise::new(&self.scheduler);
        let reaction = Reaction {
            on_fulfilled,
            on_rejected,
            next: next.clone(),
        };
        let is_pending = self.inner.borrow().state == PromiseState::Pending;
        if is_pending {
            self.inner.borrow_mut().reactions.push(reaction);
        } else {
            self.dispatch(reaction);
        }
        next
    }

    /// Registers a rejection continuation only.
    pub fn catch(&self, on_rejected: Option<Value>) -> Promise {
        self.then(None, on_rejected)
    }

    fn settle(&self, state: PromiseState, outcome: Value) {
        let reactions = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != PromiseState::Pending {
                return;
            }
            inner.state = state;
            inner.outcome = Some(outcome);
            std::mem::take(&mut inner.reactions)
        };
        for reaction in reactions {
            self.dispatch(reaction);
        }
    }

    /// Enqueues a settled reaction. Never runs the handler inline.
    fn dispatch(&self, reaction: Reaction) {
        let (state, outcome) = {
            let inner = self.inner.borrow();
            (
                inner.state.clone(),
                inner.outcome.clone().unwrap_or(Value::Undefined),
            )
        };
        self.scheduler.enqueue(move || {
            let handler = match state {
                PromiseState::Fulfilled => reaction.on_fulfilled.clone(),
                PromiseState::Rejected => reaction.on_rejected.clone(),
                PromiseState::Pending => None,
            };
            match handler {
                Some(h) if h.is_callable() => {
                    match h.invoke(Value::Undefined, vec![outcome]) {
                        Ok(v) => reaction.next.resolve(v),
                        Err(err) => reaction.next.reject(err.into()),
                    }
                }
                _ => match state {
                    PromiseState::Fulfilled => reaction.next.resolve(outcome),
                    PromiseState::Rejected => reaction.next.reject(outcome),
                    PromiseState::Pending => {}
                },
            }
        });
    }

    /// Wraps the promise as a dynamic instance object.
    ///
    /// The instance exposes callable `then` and `catch` members whose
    /// returns are themselves wrapped instances, so engine promises are
    /// indistinguishable from library-produced promise-likes.
    pub fn to_value(&self) -> Value {
        let instance = Value::object();

        let p = self.clone();
        instance.set(
            "then",
            Value::function(move |_this, args| {
                Ok(p.then(handler(&args, 0), handler(&args, 1)).to_value())
            }),
        );

        let p = self.clone();
        instance.set(
            "catch",
            Value::function(move |_this, args| {
                Ok(p.then(None, handler(&args, 0)).to_value())
            }),
        );

        instance
    }
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.inner.borrow().state)
            .finish()
    }
}

/// Optional handler argument: undefined and null count as absent.
fn handler(args: &[Value], index: usize) -> Option<Value> {
    args.get(index)
        .cloned()
        .filter(|v| !matches!(v, Value::Undefined | Value::Null))
}

/// Builds a fully conformant constructor over the engine.
///
/// The result validates its resolver argument, invokes it synchronously
/// with resolve/reject functions, routes a synchronous resolver error
/// into rejection, and carries the four statics (completed by the
/// synthesizer's static fallbacks, with no backing library). It does NOT
/// carry the normalization marker: it stands in for a host-native
/// implementation.
pub fn conforming_constructor(scheduler: &Scheduler) -> Value {
    let prototype = Value::object();
    let sched = scheduler.clone();
    let proto = prototype.clone();
    let ctor = Value::constructor_with_prototype(prototype, move |args| {
        let resolver = arg(&args, 0);
        if !resolver.is_callable() {
            return Err(JsError::type_error(synthesize::RESOLVER_REQUIRED));
        }

        let promise = Promise::new(&sched);

        let p = promise.clone();
        let resolve = Value::function(move |_this, args| {
            p.resolve(arg(&args, 0));
            Ok(Value::Undefined)
        });
        let p = promise.clone();
        let reject = Value::function(move |_this, args| {
            p.reject(arg(&args, 0));
            Ok(Value::Undefined)
        });

        if let Err(err) = resolver.invoke(Value::Undefined, vec![resolve, reject]) {
            promise.reject(err.into());
        }

        let instance = promise.to_value();
        instance.set_prototype(proto.clone());
        Ok(instance)
    });
    synthesize::fill_statics(&ctor, None, false);
    ctor
}
