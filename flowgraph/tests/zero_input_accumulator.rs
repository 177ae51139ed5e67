//! An accumulator with no inputs is never scheduled onto the worklist
//! (there is nothing that could ever change it) — it keeps its initial
//! value forever, and `get()` on it still terminates instead of waiting
//! on a combine call that would never come.

use std::collections::BTreeSet;

use flowgraph::{Cell, Context};

#[test]
fn zero_input_accumulator_keeps_its_initial_value() {
    let ctx = Context::new();
    let initial: BTreeSet<i32> = [1, 2, 3].into_iter().collect();

    let c: Cell<BTreeSet<i32>> = ctx.accumulator(
        Vec::<Cell<i32>>::new(),
        initial.clone(),
        |_state: &BTreeSet<i32>, _changed: &[i32]| {
            panic!("combine must never run: there are no inputs to change it")
        },
    );

    assert_eq!(c.get(), initial);
    assert_eq!(c.get(), initial);
}

#[test]
fn zero_input_accumulator_is_inert_downstream_too() {
    let ctx = Context::new();
    let c = ctx.accumulator(Vec::<Cell<i32>>::new(), 7i32, |_state: &i32, _changed: &[i32]| {
        unreachable!()
    });
    let doubled = c.map(|x| x * 2);

    assert_eq!(doubled.get(), 14);
}
