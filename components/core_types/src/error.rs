//! Error types for dynamic value operations.
//!
//! Synchronous failures are deliberately narrow: a construction with a
//! missing or non-callable resolver, and internal plumbing errors
//! (invoking a non-callable, constructing a non-constructor). Everything
//! asynchronous travels as a rejection reason `Value`, never as a
//! [`JsError`].

use thiserror::Error;

/// The kind of error raised by a dynamic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value did not have the required callable/constructible shape
    TypeError,
    /// Engine invariant violation
    InternalError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::TypeError => write!(f, "TypeError"),
            ErrorKind::InternalError => write!(f, "InternalError"),
        }
    }
}

/// An error raised synchronously by a dynamic operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct JsError {
    /// The kind of error
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
}

impl JsError {
    /// Create a TypeError.
    pub fn type_error(message: impl Into<String>) -> Self {
        JsError {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create an InternalError.
    pub fn internal(message: impl Into<String>) -> Self {
        JsError {
            kind: ErrorKind::InternalError,
            message: message.into(),
        }
    }
}

/// Result type for dynamic value operations.
pub type JsResult<T> = Result<T, JsError>;
