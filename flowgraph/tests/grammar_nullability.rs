//! Nullability of the left-recursive grammar `S -> S A | B`,
//! `A -> ('a')? | C`, `B -> ('b')?`, `C -> 'c' | 'C'`, expressed as a
//! network of cells over the boolean-OR semilattice. `S`'s own
//! left recursion is tied with `delay`.

use std::cell::RefCell;
use std::rc::Rc;

use flowgraph::{map2, Cell, Context};

#[test]
fn left_recursive_nullability_matches_expected_set() {
    let ctx = Context::new();

    let optional_a = ctx.pure(true);
    let optional_b = ctx.pure(true);
    let terminal_c_lower = ctx.pure(false);
    let terminal_c_upper = ctx.pure(false);

    let nullable_c = map2(&terminal_c_lower, &terminal_c_upper, |a, b| a || b);
    let nullable_a = map2(&optional_a, &nullable_c, |a, b| a || b);
    let nullable_b = optional_b.clone();

    let s_slot: Rc<RefCell<Option<Cell<bool>>>> = Rc::new(RefCell::new(None));
    let s_slot_for_delay = s_slot.clone();
    let s_feedback = ctx.delay(move || s_slot_for_delay.borrow().clone().unwrap());
    let s_then_a = map2(&s_feedback, &nullable_a, |s, a| s && a);

    let nullable_s = ctx.accumulator(vec![s_then_a, nullable_b.clone()], false, |state, changed| {
        changed.iter().fold(*state, |acc, &alt| acc || alt)
    });
    *s_slot.borrow_mut() = Some(nullable_s.clone());

    assert!(nullable_s.get());
    assert!(nullable_a.get());
    assert!(nullable_b.get());
    assert!(!nullable_c.get());
}
