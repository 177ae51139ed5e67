//! Derived combinators (spec §9 "supplemented features"): applicative
//! and traversal helpers built entirely on top of [`Cell::zip`] and
//! [`Cell::map`], never touching [`crate::engine`] directly.

use std::rc::Rc;

use crate::cell::Cell;
use crate::engine::Context;

/// `map2(a, b, f) == a.zip(b).map(|(x, y)| f(x, y))`, spelled out as
/// its own entry point because it is the combinator most call sites
/// reach for directly.
pub fn map2<A, B, C>(a: &Cell<A>, b: &Cell<B>, f: impl Fn(A, B) -> C + 'static) -> Cell<C>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
{
    a.zip(b).map(move |(x, y)| f(x, y))
}

/// Applicative apply: thread a cell of functions through a cell of
/// arguments. The function payload is `Rc<dyn Fn>` rather than a bare
/// `F: Fn + Clone` bound — `Rc` (unlike `Box`) has no blanket `Fn` impl
/// in `std`, so a generic callable bound can never be satisfied by one;
/// fixing the cell's element type to the trait object sidesteps that.
pub fn ap<A, B>(ff: &Cell<Rc<dyn Fn(A) -> B>>, fa: &Cell<A>) -> Cell<B>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    ff.zip(fa).map(|(f, a)| f(a))
}

/// Two-argument applicative apply, built on [`Cell::zip3`].
pub fn ap2<A, B, C>(
    ff: &Cell<Rc<dyn Fn(A, B) -> C>>,
    fa: &Cell<A>,
    fb: &Cell<B>,
) -> Cell<C>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
{
    ff.zip3(fa, fb).map(|(f, a, b)| f(a, b))
}

/// Map `f` over each cell in `cells` and collect the results into one
/// cell of a vector, preserving order. `ctx` must be the context that
/// owns every cell in `cells` (checked transitively by each fold step's
/// `zip`, which panics on a foreign cell).
pub fn traverse<A, B>(
    ctx: &Context,
    cells: &[Cell<A>],
    f: impl Fn(A) -> B + 'static,
) -> Cell<Vec<B>>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    let f = Rc::new(f);
    cells.iter().fold(ctx.pure(Vec::new()), |acc, cell| {
        let f = f.clone();
        acc.zip(cell).map(move |(mut collected, value)| {
            collected.push(f(value));
            collected
        })
    })
}

/// `sequence(ctx, cells) == traverse(ctx, cells, identity)`.
pub fn sequence<A>(ctx: &Context, cells: &[Cell<A>]) -> Cell<Vec<A>>
where
    A: Clone + 'static,
{
    traverse(ctx, cells, |a| a)
}
