//! Dynamic value representation for third-party library shapes.
//!
//! The set of shapes a wrapped asynchronous-value library can take is open
//! and only known at runtime, so libraries, deferreds, promise-like
//! instances and constructors are all modeled as one dynamic [`Value`]
//! type. Capability checks are behavioral (call it and see), not nominal.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::{JsError, JsResult};

/// Internal object data: a property map plus an optional prototype link.
#[derive(Debug, Default)]
pub struct ObjectData {
    /// Object properties map
    pub properties: HashMap<String, Value>,
    /// Optional prototype object consulted on property misses
    pub prototype: Option<Value>,
}

/// Internal array data.
#[derive(Debug, Default)]
pub struct ArrayData {
    /// Array elements
    pub elements: Vec<Value>,
}

/// Internal function data.
///
/// The closure receives the `this` value and the argument list, mirroring
/// how a method call carries its receiver.
pub struct FunctionData {
    func: Box<dyn Fn(Value, Vec<Value>) -> JsResult<Value>>,
}

impl fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionData").finish()
    }
}

/// Internal constructor data.
///
/// A constructor is a construct closure plus an interior-mutable static
/// member map, a prototype object shared with the instances it creates,
/// and the normalization marker. The marker is a struct field rather than
/// a member-map entry, so member enumeration never observes it.
pub struct ConstructorData {
    construct: Box<dyn Fn(Vec<Value>) -> JsResult<Value>>,
    statics: RefCell<HashMap<String, Value>>,
    prototype: Value,
    normalized: Cell<bool>,
}

impl fmt::Debug for ConstructorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorData")
            .field("normalized", &self.normalized.get())
            .finish()
    }
}

/// Dynamic value.
///
/// Primitives are stored inline; objects, arrays, functions and
/// constructors are reference types behind `Rc`, so cloning a `Value` is
/// cheap and clones alias the same underlying data. Equality on reference
/// variants is pointer identity.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value
    Undefined,
    /// Explicit null
    Null,
    /// Boolean value
    Boolean(bool),
    /// IEEE 754 double
    Number(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Rc<RefCell<ArrayData>>),
    /// Object with properties
    Object(Rc<RefCell<ObjectData>>),
    /// Callable function
    Function(Rc<FunctionData>),
    /// Constructible value with static members
    Constructor(Rc<ConstructorData>),
}

impl Value {
    /// Create an empty object.
    pub fn object() -> Self {
        Value::Object(Rc::new(RefCell::new(ObjectData::default())))
    }

    /// Create a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create a number value.
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    /// Create a boolean value.
    pub fn boolean(b: bool) -> Self {
        Value::Boolean(b)
    }

    /// Create an array from values.
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(ArrayData { elements })))
    }

    /// Create a function value from a closure taking `(this, args)`.
    pub fn function<F>(func: F) -> Self
    where
        F: Fn(Value, Vec<Value>) -> JsResult<Value> + 'static,
    {
        Value::Function(Rc::new(FunctionData {
            func: Box::new(func),
        }))
    }

    /// Create a constructor value with a fresh prototype object.
    pub fn constructor<F>(construct: F) -> Self
    where
        F: Fn(Vec<Value>) -> JsResult<Value> + 'static,
    {
        Self::constructor_with_prototype(Value::object(), construct)
    }

    /// Create a constructor value sharing the given prototype object.
    ///
    /// The construct closure typically captures a clone of `prototype` and
    /// links it into the instances it returns.
    pub fn constructor_with_prototype<F>(prototype: Value, construct: F) -> Self
    where
        F: Fn(Vec<Value>) -> JsResult<Value> + 'static,
    {
        Value::Constructor(Rc::new(ConstructorData {
            construct: Box::new(construct),
            statics: RefCell::new(HashMap::new()),
            prototype,
            normalized: Cell::new(false),
        }))
    }

    /// Get a property.
    ///
    /// Objects consult own properties first, then walk the prototype
    /// chain. Constructors read their static member map. Other values have
    /// no properties.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => {
                if let Some(v) = obj.borrow().properties.get(key) {
                    return Some(v.clone());
                }
                let proto = obj.borrow().prototype.clone();
                proto.and_then(|p| p.get(key))
            }
            Value::Constructor(ctor) => ctor.statics.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// Set a property on an object or a static member on a constructor.
    ///
    /// Silently ignored on values that carry no properties.
    pub fn set(&self, key: &str, value: Value) {
        match self {
            Value::Object(obj) => {
                obj.borrow_mut().properties.insert(key.to_string(), value);
            }
            Value::Constructor(ctor) => {
                ctor.statics.borrow_mut().insert(key.to_string(), value);
            }
            _ => {}
        }
    }

    /// Set an object's prototype link. Ignored on non-objects.
    pub fn set_prototype(&self, prototype: Value) {
        if let Value::Object(obj) = self {
            obj.borrow_mut().prototype = Some(prototype);
        }
    }

    /// Get an object's prototype, or a constructor's shared prototype
    /// object.
    pub fn prototype(&self) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.borrow().prototype.clone(),
            Value::Constructor(ctor) => Some(ctor.prototype.clone()),
            _ => None,
        }
    }

    /// Call the value as a function with the given receiver and arguments.
    pub fn invoke(&self, this: Value, args: Vec<Value>) -> JsResult<Value> {
        match self {
            Value::Function(f) => (f.func)(this, args),
            _ => Err(JsError::type_error(format!("{} is not a function", self))),
        }
    }

    /// Construct an instance with the given arguments.
    pub fn construct(&self, args: Vec<Value>) -> JsResult<Value> {
        match self {
            Value::Constructor(ctor) => (ctor.construct)(args),
            _ => Err(JsError::type_error(format!(
                "{} is not a constructor",
                self
            ))),
        }
    }

    /// Check if the value can be called as a function.
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Check if the value is a constructor.
    pub fn is_constructor_value(&self) -> bool {
        matches!(self, Value::Constructor(_))
    }

    /// Check if the value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if the value is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Clone out an array's elements, if this is an array.
    pub fn array_elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr.borrow().elements.clone()),
            _ => None,
        }
    }

    /// Check whether a constructor carries the normalization marker.
    ///
    /// False for every non-constructor value.
    pub fn is_normalized(&self) -> bool {
        match self {
            Value::Constructor(ctor) => ctor.normalized.get(),
            _ => false,
        }
    }

    /// Set the normalization marker on a constructor. Ignored otherwise.
    pub fn mark_normalized(&self) {
        if let Value::Constructor(ctor) = self {
            ctor.normalized.set(true);
        }
    }

    /// JS-style truthiness: undefined, null, false, 0, NaN and the empty
    /// string are falsy; every reference value is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Constructor(_) => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Constructor(a), Value::Constructor(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if *n == n.trunc() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Array(arr) => {
                let rendered: Vec<String> = arr
                    .borrow()
                    .elements
                    .iter()
                    .map(|e| e.to_string())
                    .collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(_) => write!(f, "function () {{ [native code] }}"),
            Value::Constructor(_) => write!(f, "function () {{ [native constructor] }}"),
        }
    }
}

impl From<JsError> for Value {
    fn from(err: JsError) -> Self {
        Value::String(err.to_string())
    }
}

/// Get the `index`-th argument of a native call, or undefined.
///
/// Convenience for the bodies of [`Value::function`] closures.
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}
