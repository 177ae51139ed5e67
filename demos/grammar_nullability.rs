//! Nullability analysis for a small left-recursive grammar:
//!
//! ```text
//! S -> S A | B
//! A -> ('a')? | C
//! B -> ('b')?
//! C -> 'c' | 'C'
//! ```
//!
//! `nullable(X)` is true if `X` can derive the empty string. `S` is
//! left-recursive, so its nullability cell is a self-referential
//! accumulator over the boolean-OR semilattice; `A`, `B`, and `C` are
//! not recursive here and need no accumulator at all.

use std::cell::RefCell;
use std::rc::Rc;

use flowgraph::{map2, Cell, Context};

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

    // An optional terminal, `('x')?`, is nullable unconditionally.
    let optional_a = ctx.pure(true);
    let optional_b = ctx.pure(true);
    // Bare terminals never derive the empty string.
    let terminal_c_lower = ctx.pure(false);
    let terminal_c_upper = ctx.pure(false);

    // C -> 'c' | 'C'
    let nullable_c = map2(&terminal_c_lower, &terminal_c_upper, |a, b| a || b);
    // A -> ('a')? | C
    let nullable_a = map2(&optional_a, &nullable_c, |a, b| a || b);
    // B -> ('b')?
    let nullable_b = optional_b.clone();

    // S -> S A | B, tied with `delay` since the "S A" alternative
    // refers back to S's own (not-yet-constructed) accumulator.
    let s_slot: Rc<RefCell<Option<Cell<bool>>>> = Rc::new(RefCell::new(None));
    let s_slot_for_delay = s_slot.clone();
    let s_feedback = ctx.delay(move || {
        s_slot_for_delay
            .borrow()
            .clone()
            .expect("S bound before its own delay is ever forced")
    });
    let s_then_a = map2(&s_feedback, &nullable_a, |s, a| s && a);

    let nullable_s = ctx.accumulator(vec![s_then_a, nullable_b.clone()], false, |state, changed| {
        changed.iter().fold(*state, |acc, &alt| acc || alt)
    });
    *s_slot.borrow_mut() = Some(nullable_s.clone());

    println!("nullable(S) = {}", nullable_s.get());
    println!("nullable(A) = {}", nullable_a.get());
    println!("nullable(B) = {}", nullable_b.get());
    println!("nullable(C) = {}", nullable_c.get());

    assert!(nullable_s.get());
    assert!(nullable_a.get());
    assert!(nullable_b.get());
    assert!(!nullable_c.get());
}
