//! Error taxonomy for the fixpoint engine (spec: "ERROR HANDLING DESIGN").
//!
//! The engine recognizes three classes of failure. Only the middle one —
//! usage violations the library can actually detect — surfaces as a
//! `Result`. Non-termination of a user's update function is undetectable
//! by design and never becomes an error value; internal invariants are
//! `fatal_assert!` panics, not recoverable errors.

use std::fmt;

use thiserror::Error;

/// Identifies a single solver [`Context`](https://docs.rs/flowgraph) so
/// cross-context misuse can be caught instead of silently corrupting
/// unrelated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub(crate) u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

/// Usage violations the engine can detect at the API boundary (spec §7.2).
///
/// Everything else in that category (mutating cells mid-solve from
/// another thread, for instance) is genuinely undefined behavior and has
/// no corresponding variant here — there is nothing a single-threaded,
/// synchronous engine can check for it short of unsound runtime cost.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextError {
    /// `get()` was called on a cell that was constructed by a different
    /// [`Context`](https://docs.rs/flowgraph).
    #[error("cell belongs to {found}, not the owning context {expected}")]
    ForeignContext {
        expected: ContextId,
        found: ContextId,
    },

    /// `get()` was re-entered on the same context while a solve was
    /// already in progress on the call stack (e.g. from inside a
    /// combiner closure).
    #[error("get() called reentrantly on {0} while a solve was already in progress")]
    ReentrantSolve(ContextId),
}

/// Panics with a stable identifier so the panic message doubles as a bug
/// report key (spec §7.3: "each such assertion carries a stable
/// identifier for bug reports").
#[track_caller]
pub fn invariant_failure(id: &'static str, detail: impl fmt::Display) -> ! {
    panic!("flowgraph internal invariant [{id}] violated: {detail}");
}

/// Asserts an internal, cannot-happen invariant. Fatal in debug builds,
/// compiled out entirely in release (spec §7.3), exactly like
/// `debug_assert!`; on failure panics through [`invariant_failure`] so
/// every cannot-happen panic in this crate carries the same stable-id
/// message shape.
#[macro_export]
macro_rules! fatal_assert {
    ($id:expr, $cond:expr) => {
        if cfg!(debug_assertions) && !($cond) {
            $crate::invariant_failure($id, "condition false");
        }
    };
    ($id:expr, $cond:expr, $($detail:tt)+) => {
        if cfg!(debug_assertions) && !($cond) {
            $crate::invariant_failure($id, format!($($detail)+));
        }
    };
}
