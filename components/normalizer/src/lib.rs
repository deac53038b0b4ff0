//! Promise-library normalization engine.
//!
//! Takes a third-party asynchronous-value library of unknown shape and
//! produces a constructor with a uniform surface: `new C(resolver)`,
//! instance `then`/`catch`, and the `resolve`/`reject`/`all`/`race`
//! statics. Libraries that already conform pass through untouched;
//! everything else is completed or wrapped, best-effort, without ever
//! failing the caller over a missing capability.
//!
//! The policy layer decides between the supplied library and the
//! context's ambient constructor, and optionally installs the result
//! into the ambient slot. All state lives in an explicit [`Context`],
//! so independent contexts never interfere.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod extensions;
pub mod policy;
pub mod probe;
pub mod promise;
pub mod scheduler;
pub mod synthesize;

pub use extensions::{done_extension, settle_extension, Extension, DONE, SETTLE};
pub use policy::{Context, NormalizationOptions, Settings};
pub use probe::{probe, ProbeReport};
pub use promise::{conforming_constructor, Promise, PromiseState};
pub use scheduler::Scheduler;
pub use synthesize::synthesize;
