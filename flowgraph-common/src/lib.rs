//! Shared error and diagnostic types for the `flowgraph` fixpoint engine.
//!
//! Kept separate from the engine crate so that future embedders (a CLI,
//! a language binding) can depend on the error taxonomy without pulling
//! in the solver itself.

pub mod error;

pub use error::{invariant_failure, ContextError, ContextId};
