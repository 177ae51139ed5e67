//! Property-based checks of the applicative laws and of order-independent
//! forcing (spec.md §8), run over many random inputs rather than the one
//! or two values the worked-example tests fix by hand.

use proptest::prelude::*;

use flowgraph::Context;

proptest! {
    /// `pure(a).get() == a` for any `a`.
    #[test]
    fn pure_get_returns_the_value(a: i64) {
        let ctx = Context::new();
        prop_assert_eq!(ctx.pure(a).get(), a);
    }

    /// `c.map(id).get() == c.get()`.
    #[test]
    fn map_identity_is_a_no_op(a: i64) {
        let ctx = Context::new();
        let c = ctx.pure(a);
        prop_assert_eq!(c.map(|x| x).get(), c.get());
    }

    /// `c.map(g).map(f).get() == c.map(f . g).get()`.
    #[test]
    fn map_composition_matches_fused_map(a: i64, shift: i64, scale in 1i64..100) {
        let ctx = Context::new();
        let c = ctx.pure(a);
        let g = move |x: i64| x.wrapping_add(shift);
        let f = move |x: i64| x.wrapping_mul(scale);

        let separately = c.map(g).map(f).get();
        let fused = c.map(move |x| f(g(x))).get();
        prop_assert_eq!(separately, fused);
    }

    /// `map2(pure(f), c, apply) == c.map(f)`.
    #[test]
    fn map2_over_a_constant_matches_map(a: i64, shift: i64) {
        let ctx = Context::new();
        let c = ctx.pure(a);
        let f = move |x: i64| x.wrapping_add(shift);

        let via_map2 = flowgraph::map2(&ctx.pure(shift), &c, |s, x: i64| x.wrapping_add(s));
        let via_map = c.map(f);
        prop_assert_eq!(via_map2.get(), via_map.get());
    }

    /// Forcing two independent accumulators in either order yields the
    /// same pair of values (spec.md §8, "Independent cell forcing").
    #[test]
    fn independent_accumulators_are_order_independent(seed_a: i32, seed_b: i32, bumps in 0u8..8) {
        let forward = {
            let ctx = Context::new();
            let a = ctx.accumulator1(ctx.pure(seed_a), 0i32, |_s, i| *i);
            let b = ctx.accumulator1(ctx.pure(seed_b.wrapping_add(bumps as i32)), 0i32, |_s, i| *i);
            (a.get(), b.get())
        };
        let reversed = {
            let ctx = Context::new();
            let a = ctx.accumulator1(ctx.pure(seed_a), 0i32, |_s, i| *i);
            let b = ctx.accumulator1(ctx.pure(seed_b.wrapping_add(bumps as i32)), 0i32, |_s, i| *i);
            let b_value = b.get();
            let a_value = a.get();
            (a_value, b_value)
        };
        prop_assert_eq!(forward, reversed);
    }

    /// A zero-input accumulator never runs its combiner and always
    /// returns its initial value, for any initial value.
    #[test]
    fn zero_input_accumulator_is_always_inert(initial: i64) {
        let ctx = Context::new();
        let c = ctx.accumulator(Vec::<flowgraph::Cell<i64>>::new(), initial, |_s: &i64, _c: &[i64]| {
            panic!("combine must never run with no inputs")
        });
        prop_assert_eq!(c.get(), initial);
        prop_assert_eq!(c.get(), initial);
    }
}
