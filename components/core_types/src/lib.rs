//! Core dynamic value types and error handling.
//!
//! This crate provides the foundational types for normalizing third-party
//! asynchronous-value libraries: a dynamic [`Value`] representation for
//! the open set of library shapes, and the error types for the narrow
//! synchronous failure surface.
//!
//! # Overview
//!
//! - [`Value`] - Dynamic representation of libraries, deferreds, instances
//!   and constructors
//! - [`JsError`] - Synchronous operation errors
//! - [`ErrorKind`] - Error discriminant
//!
//! # Examples
//!
//! ```
//! use core_types::{arg, Value};
//!
//! let lib = Value::object();
//! lib.set("resolve", Value::function(|_this, args| Ok(arg(&args, 0))));
//!
//! let resolve = lib.get("resolve").unwrap();
//! let out = resolve.invoke(lib.clone(), vec![Value::number(42.0)]).unwrap();
//! assert_eq!(out, Value::number(42.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod value;

pub use error::{ErrorKind, JsError, JsResult};
pub use value::{arg, ArrayData, ConstructorData, FunctionData, ObjectData, Value};
