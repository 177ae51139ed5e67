//! The public `Cell<A>` handle and the internal node kinds it can wrap.
//!
//! Every `Cell<A>` is a thin, cheaply-`Clone`-able reference (an `Rc`
//! underneath) to one of five node kinds: a constant, a mapper, a zip,
//! a delay, or an accumulator (the only stateful one, defined in
//! [`crate::engine`]). `CellNode<A>` is the object-safe seam between
//! them — it is never implemented outside this crate.

use std::rc::Rc;

use once_cell::unsync::OnceCell;
use rustc_hash::FxHashSet;

use crate::engine::{AccHandle, Context};

/// A handle to one cell in a [`Context`]'s declared network. Cheap to
/// clone; cloning a `Cell` never clones the value it denotes, only the
/// reference to its node.
pub struct Cell<A> {
    pub(crate) ctx: Context,
    pub(crate) node: Rc<dyn CellNode<A>>,
}

impl<A> Clone for Cell<A> {
    fn clone(&self) -> Self {
        Cell {
            ctx: self.ctx.clone(),
            node: self.node.clone(),
        }
    }
}

/// What every cell kind must supply: a current value, and the set of
/// accumulators (if any) that must be solved before that value is
/// trustworthy. Stateless kinds (`Constant`, `Mapper`, `Zip`, `Delay`)
/// delegate the second half to whatever they're built from.
pub(crate) trait CellNode<A> {
    fn current_value(&self) -> A;
    fn upstream_accumulators(&self) -> Vec<AccHandle>;

    /// `Some` only for the accumulator kind; used by [`Cell::named`].
    fn as_accumulator(&self) -> Option<AccHandle> {
        None
    }
}

impl<A> Cell<A>
where
    A: Clone + 'static,
{
    /// Force this cell's upstream accumulators to fixpoint, then read
    /// the current value. Idempotent: a second call with no
    /// intervening mutation re-runs discovery (cheaply short-circuited,
    /// since every upstream is already marked discovered) and returns
    /// the same value.
    pub fn get(&self) -> A {
        for upstream in self.node.upstream_accumulators() {
            self.ctx.0.solve(&upstream);
        }
        self.node.current_value()
    }

    /// Attach a human-readable name, surfaced in [`std::fmt::Debug`]
    /// output and passed to a [`crate::engine::SolveObserver`]. A no-op
    /// on cells with no accumulator identity of their own (constants,
    /// mappers, zips, delays all borrow their upstream's identity).
    pub fn named(self, name: impl Into<String>) -> Self {
        if let Some(acc) = self.node.as_accumulator() {
            acc.set_name(name.into());
        }
        self
    }

    pub fn map<B>(&self, f: impl Fn(A) -> B + 'static) -> Cell<B>
    where
        B: Clone + 'static,
    {
        Cell {
            ctx: self.ctx.clone(),
            node: Rc::new(MapperNode {
                inner: self.clone(),
                f: Box::new(f),
            }),
        }
    }

    pub fn zip<B>(&self, other: &Cell<B>) -> Cell<(A, B)>
    where
        B: Clone + 'static,
    {
        self.ctx.0.assert_same_context(&other.ctx.0);
        Cell {
            ctx: self.ctx.clone(),
            node: Rc::new(ZipNode {
                a: self.clone(),
                b: other.clone(),
            }),
        }
    }

    pub fn zip3<B, C>(&self, b: &Cell<B>, c: &Cell<C>) -> Cell<(A, B, C)>
    where
        B: Clone + 'static,
        C: Clone + 'static,
    {
        self.zip(b).zip(c).map(|((x, y), z)| (x, y, z))
    }
}

struct ConstantNode<A> {
    value: A,
}

impl<A: Clone> CellNode<A> for ConstantNode<A> {
    fn current_value(&self) -> A {
        self.value.clone()
    }
    fn upstream_accumulators(&self) -> Vec<AccHandle> {
        Vec::new()
    }
}

struct MapperNode<A, B> {
    inner: Cell<A>,
    f: Box<dyn Fn(A) -> B>,
}

impl<A, B> CellNode<B> for MapperNode<A, B>
where
    A: Clone + 'static,
{
    fn current_value(&self) -> B {
        (self.f)(self.inner.node.current_value())
    }
    fn upstream_accumulators(&self) -> Vec<AccHandle> {
        self.inner.node.upstream_accumulators()
    }
}

struct ZipNode<A, B> {
    a: Cell<A>,
    b: Cell<B>,
}

impl<A, B> CellNode<(A, B)> for ZipNode<A, B>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    fn current_value(&self) -> (A, B) {
        (self.a.node.current_value(), self.b.node.current_value())
    }

    fn upstream_accumulators(&self) -> Vec<AccHandle> {
        let mut seen = FxHashSet::default();
        let mut result = Vec::new();
        for handle in self
            .a
            .node
            .upstream_accumulators()
            .into_iter()
            .chain(self.b.node.upstream_accumulators())
        {
            if seen.insert(handle.node_id()) {
                result.push(handle);
            }
        }
        result
    }
}

/// Wraps a thunk that builds a cell lazily, forced on first use and
/// memoized forever after — the mechanism that lets a declaration
/// reference a cell that doesn't exist yet (spec §4, `delay`).
struct DelayNode<A> {
    thunk: std::cell::RefCell<Option<Box<dyn FnOnce() -> Cell<A>>>>,
    resolved: OnceCell<Cell<A>>,
}

impl<A> DelayNode<A>
where
    A: Clone + 'static,
{
    fn force(&self) -> &Cell<A> {
        self.resolved.get_or_init(|| {
            let thunk = self
                .thunk
                .borrow_mut()
                .take()
                .expect("delay thunk forced more than once concurrently, or self-referentially");
            thunk()
        })
    }
}

impl<A> CellNode<A> for DelayNode<A>
where
    A: Clone + 'static,
{
    fn current_value(&self) -> A {
        self.force().node.current_value()
    }
    fn upstream_accumulators(&self) -> Vec<AccHandle> {
        self.force().node.upstream_accumulators()
    }
}

impl Context {
    pub fn pure<A>(&self, value: A) -> Cell<A>
    where
        A: Clone + 'static,
    {
        Cell {
            ctx: self.clone(),
            node: Rc::new(ConstantNode { value }),
        }
    }

    pub fn unit(&self) -> Cell<()> {
        self.pure(())
    }

    pub fn delay<A>(&self, thunk: impl FnOnce() -> Cell<A> + 'static) -> Cell<A>
    where
        A: Clone + 'static,
    {
        Cell {
            ctx: self.clone(),
            node: Rc::new(DelayNode {
                thunk: std::cell::RefCell::new(Some(Box::new(thunk))),
                resolved: OnceCell::new(),
            }),
        }
    }

    /// A cell whose state `B` is folded from the subset of `inputs`
    /// that actually changed since the last combine (spec §4,
    /// `accumulator`). `combine` receives the current state and the
    /// changed inputs' current values; it must not assume every input
    /// is represented on every call.
    pub fn accumulator<A, B>(
        &self,
        inputs: Vec<Cell<A>>,
        init: B,
        combine: impl Fn(&B, &[A]) -> B + 'static,
    ) -> Cell<B>
    where
        A: Clone + 'static,
        B: Clone + PartialEq + 'static,
    {
        self.accumulator_raw(inputs, init, combine)
    }

    /// Sugar for the single-input case (spec §4, `accumulator`'s other
    /// overload): `combine` is called with the one input's new value
    /// directly rather than a singleton slice.
    pub fn accumulator1<A, B>(
        &self,
        input: Cell<A>,
        init: B,
        combine: impl Fn(&B, &A) -> B + 'static,
    ) -> Cell<B>
    where
        A: Clone + 'static,
        B: Clone + PartialEq + 'static,
    {
        self.accumulator_raw(vec![input], init, move |state, changed| {
            flowgraph_common::fatal_assert!(
                "E-SINGLETON-ARITY",
                changed.len() == 1,
                "accumulator1's sole input delivered {} changed values",
                changed.len()
            );
            combine(state, &changed[0])
        })
    }
}
