//! Heron's method for square roots, expressed as a single self-referential
//! accumulator: `a = (a + 1764 / a) / 2`, starting from `a = 1.0`.
//!
//! The self-reference is tied with `delay`: the thunk passed to `delay`
//! captures a slot that is filled in with the accumulator's own `Cell`
//! right after it is constructed.

use std::cell::RefCell;
use std::rc::Rc;

use flowgraph::{Cell, Context};

fn heron_sqrt(ctx: &Context, radicand: f64, guess: f64) -> Cell<f64> {
    let slot: Rc<RefCell<Option<Cell<f64>>>> = Rc::new(RefCell::new(None));
    let slot_for_delay = slot.clone();
    let fed_back = ctx.delay(move || {
        slot_for_delay
            .borrow()
            .clone()
            .expect("heron_sqrt: accumulator bound before its own delay is ever forced")
    });

    let a = ctx.accumulator1(fed_back, guess, move |current: &f64, _last: &f64| {
        (current + radicand / current) / 2.0
    });
    *slot.borrow_mut() = Some(a.clone());
    a
}

#[cfg(feature = "tracing")]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn main() {
    #[cfg(feature = "tracing")]
    init_tracing();

    let ctx = Context::new();
    let a = heron_sqrt(&ctx, 1764.0, 1.0);

    let first = a.get();
    println!("sqrt(1764) = {first}");
    assert_eq!(first, 42.0);

    let second = a.get();
    assert_eq!(second, 42.0);
    println!("second get() is idempotent: {second}");
}
