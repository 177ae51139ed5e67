//! A single-threaded dataflow fixpoint engine.
//!
//! Declare a network of cells — some constant, some derived by `map`
//! and `zip`, some stateful `accumulator`s that fold their changed
//! inputs — and call [`Cell::get`] on any of them. The network may be
//! cyclic: cycles are resolved by chaotic iteration, re-running each
//! accumulator's combiner until every value in the cycle stops
//! changing (equality-gated, see [`reactive_cell::ReactiveCell`]).
//!
//! Two contexts never interact; a cell built under one [`Context`]
//! cannot be wired into another (panics via
//! [`flowgraph_common::ContextError::ForeignContext`] if you try).
//!
//! ```
//! use flowgraph::Context;
//!
//! let ctx = Context::new();
//! let a = ctx.pure(3);
//! let b = ctx.pure(4);
//! let sum = flowgraph::map2(&a, &b, |x, y| x + y);
//! assert_eq!(sum.get(), 7);
//! ```

pub mod cell;
pub mod combinators;
pub mod dfs;
pub mod engine;
pub mod reactive_cell;
pub mod worklist;

pub use cell::Cell;
pub use combinators::{ap, ap2, map2, sequence, traverse};
pub use engine::{Context, SolveObserver};
