//! `Worklist` — a mutable priority queue of loci with ordered, coalescing
//! delivery of pending todos (spec component 4.3).
//!
//! Generic over the locus type `L`, the todo-batch monoid `T`, and an
//! order key `K` extracted from each locus at insertion time. The order
//! key is injected rather than required via `Ord` on `L` itself, because
//! in [`crate::engine`] the ordering (DFS finish time) is assigned
//! dynamically and isn't an intrinsic property of locus identity.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::hash::Hash;

/// A priority queue of loci `L`, draining lowest-`order_key` first, with
/// pending todos of type `T` coalesced via `combine` whenever the same
/// locus is enqueued more than once before being processed.
pub struct Worklist<L, T, K> {
    do_work: Option<Box<dyn FnMut(&L, T, &mut Self)>>,
    empty_todos: T,
    combine: Box<dyn Fn(T, T) -> T>,
    order_key: Box<dyn Fn(&L) -> K>,
    active: BTreeMap<K, L>,
    active_keys: FxHashMap<L, K>,
    pending: FxHashMap<L, T>,
}

impl<L, T, K> Worklist<L, T, K>
where
    L: Clone + Eq + Hash,
    T: Clone,
    K: Ord + Clone,
{
    pub fn new(
        do_work: impl FnMut(&L, T, &mut Self) + 'static,
        empty_todos: T,
        combine: impl Fn(T, T) -> T + 'static,
        order_key: impl Fn(&L) -> K + 'static,
    ) -> Self {
        Worklist {
            do_work: Some(Box::new(do_work)),
            empty_todos,
            combine: Box::new(combine),
            order_key: Box::new(order_key),
            active: BTreeMap::new(),
            active_keys: FxHashMap::default(),
            pending: FxHashMap::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Ensure `l` is queued and merge `t` into its pending batch. Multiple
    /// enqueues of the same locus collapse into one entry.
    pub fn add_todos(&mut self, l: L, t: T) {
        let prior = self
            .pending
            .remove(&l)
            .unwrap_or_else(|| self.empty_todos.clone());
        let combined = (self.combine)(t, prior);
        self.pending.insert(l.clone(), combined);
        if !self.active_keys.contains_key(&l) {
            let key = (self.order_key)(&l);
            self.active.insert(key.clone(), l.clone());
            self.active_keys.insert(l, key);
        }
    }

    /// Pop the minimum-ordered locus and its pending batch, removing both
    /// *before* returning — this is what lets `do_work` re-enqueue the
    /// same locus for a later pass, the mechanism that drives cyclic
    /// convergence.
    fn pop_next(&mut self) -> Option<(L, T)> {
        let key = self.active.keys().next()?.clone();
        let l = self.active.remove(&key).expect("key came from active map");
        self.active_keys.remove(&l);
        let t = self
            .pending
            .remove(&l)
            .unwrap_or_else(|| self.empty_todos.clone());
        Some((l, t))
    }

    /// Drain the queue to empty, invoking `do_work(locus, todos, self)`
    /// for each pop. `do_work` receives `self` back so it may call
    /// `add_todos` to re-enqueue, without needing any interior mutability
    /// of its own.
    pub fn work_until_empty(&mut self) {
        let mut do_work = self
            .do_work
            .take()
            .expect("do_work is always present between drains");
        while let Some((l, t)) = self.pop_next() {
            do_work(&l, t, self);
        }
        self.do_work = Some(do_work);
    }
}
