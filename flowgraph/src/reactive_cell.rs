//! `ReactiveCell` — a minimal observable state container (spec component 4.1).
//!
//! Parameterized over the stored value type `A` and a change-hint type
//! `H`. It knows nothing about graphs, DFS, or worklists; it is reused
//! by [`crate::engine`] to give every accumulator its change-suppression
//! and callback-fan-out behavior, and is independently testable here.

use std::cell::RefCell;

/// Observable state of type `A`, updated by folding a hint `H` through a
/// user-supplied `recompute` closure.
///
/// Equality suppression is load-bearing: if `recompute` returns a value
/// equal to the one already stored, `update` is a no-op — no callback
/// fires, no state changes. This is what lets a fixpoint actually become
/// quiescent instead of oscillating forever between two equal values.
pub struct ReactiveCell<A, H> {
    current: RefCell<A>,
    callbacks: RefCell<Vec<Box<dyn Fn()>>>,
    recompute: Box<dyn Fn(&A, &H) -> A>,
}

impl<A, H> ReactiveCell<A, H>
where
    A: Clone + PartialEq,
{
    pub fn new(initial: A, recompute: impl Fn(&A, &H) -> A + 'static) -> Self {
        ReactiveCell {
            current: RefCell::new(initial),
            callbacks: RefCell::new(Vec::new()),
            recompute: Box::new(recompute),
        }
    }

    /// Read-only view of the stored value.
    pub fn current_value(&self) -> A {
        self.current.borrow().clone()
    }

    /// Append a callback to the notification list. Callbacks run in
    /// registration order, exactly once per `update` call that actually
    /// changes the value.
    pub fn register_on_update(&self, cb: impl Fn() + 'static) {
        self.callbacks.borrow_mut().push(Box::new(cb));
    }

    /// Recompute from `hint`; if the result differs from the current
    /// value, replace it and fire every registered callback in order.
    /// Returns whether the value changed.
    pub fn update(&self, hint: &H) -> bool {
        let next = (self.recompute)(&self.current.borrow(), hint);
        let changed = next != *self.current.borrow();
        if changed {
            *self.current.borrow_mut() = next;
            for cb in self.callbacks.borrow().iter() {
                cb();
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;
    use std::rc::Rc;

    #[test]
    fn update_replaces_value_and_fires_callbacks_on_change() {
        let cell = ReactiveCell::new(0i32, |cur: &i32, hint: &i32| cur + hint);
        let fired = Rc::new(StdCell::new(0));
        let fired2 = fired.clone();
        cell.register_on_update(move || fired2.set(fired2.get() + 1));

        assert!(cell.update(&5));
        assert_eq!(cell.current_value(), 5);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn no_change_suppresses_notification() {
        let cell = ReactiveCell::new(10i32, |cur: &i32, _hint: &i32| *cur);
        let fired = Rc::new(StdCell::new(0));
        let fired2 = fired.clone();
        cell.register_on_update(move || fired2.set(fired2.get() + 1));

        assert!(!cell.update(&999));
        assert_eq!(cell.current_value(), 10);
        assert_eq!(fired.get(), 0, "equal recompute must not notify");
    }

    #[test]
    fn callbacks_fire_in_registration_order() {
        let cell = ReactiveCell::new(0i32, |_cur: &i32, hint: &i32| *hint);
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            cell.register_on_update(move || order.borrow_mut().push(i));
        }
        cell.update(&1);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn multiple_registrations_all_run_exactly_once_per_change() {
        let cell = ReactiveCell::new(0i32, |_cur: &i32, hint: &i32| *hint);
        let count = Rc::new(StdCell::new(0));
        for _ in 0..4 {
            let count = count.clone();
            cell.register_on_update(move || count.set(count.get() + 1));
        }
        cell.update(&1);
        assert_eq!(count.get(), 4);
        // a second update to the same value must not re-fire anything.
        cell.update(&1);
        assert_eq!(count.get(), 4);
    }
}
