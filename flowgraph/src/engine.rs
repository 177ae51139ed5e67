//! `FlowEngine` — the solver core (spec component 4.4).
//!
//! Ties [`crate::reactive_cell::ReactiveCell`], [`crate::dfs`], and
//! [`crate::worklist::Worklist`] together. Defines the only stateful
//! cell kind, `Accumulator`, records its upstream-accumulator
//! dependencies, and implements the two-phase `get`: DFS discovery from
//! the queried root, then draining the worklist to quiescence.
//!
//! Graph identity here is type-erased through [`AccHandle`] — a handle
//! to "some accumulator of some element/state type" — because DFS and
//! the worklist only ever need a node's *identity*, never its value
//! type. The only place a concrete `A`/`B` pair is known is inside
//! [`AccumulatorInner`] itself, which is where values actually flow.

use std::cell::{Cell as PrimCell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use flowgraph_common::{fatal_assert, ContextError, ContextId};

use crate::cell::{Cell, CellNode};
use crate::dfs::{run_dfs, DfsNode, DfsTime};
use crate::reactive_cell::ReactiveCell;
use crate::worklist::Worklist;

/// Indices into one accumulator's `inputs`, routed through a single
/// upstream accumulator. Almost always tiny — an input rarely depends
/// on the same upstream through more than a handful of routes — so a
/// small inline buffer avoids a heap allocation per dependency edge.
type Indices = SmallVec<[usize; 4]>;

/// Stable identity for an accumulator, assigned once at construction.
/// Distinct from DFS discovery/finish times, which are assigned (and
/// reassigned across launches sharing a counter) only once the node is
/// actually visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u64);

/// Optional instrumentation hook, mirroring the teacher's own
/// `CalcObserver` trait: purely additive, never load-bearing. The
/// default no-op implementation for `()` matches the teacher's
/// `impl CalcObserver for ()`.
pub trait SolveObserver {
    fn on_discover(&self, _id: u64) {}
    fn on_finish(&self, _id: u64, _seeded: bool) {}
    fn on_process(&self, _id: u64, _changed: bool) {}
}

impl SolveObserver for () {}

/// Lets a caller hand `Context::with_observer` an `Rc`-shared observer
/// and keep its own clone to inspect after solving (see
/// `RecordingObserver` in this module's tests).
impl<T: SolveObserver + ?Sized> SolveObserver for Rc<T> {
    fn on_discover(&self, id: u64) {
        (**self).on_discover(id);
    }
    fn on_finish(&self, id: u64, seeded: bool) {
        (**self).on_finish(id, seeded);
    }
    fn on_process(&self, id: u64, changed: bool) {
        (**self).on_process(id, changed);
    }
}

/// Type-erased handle to an accumulator, used for DFS identity, the
/// worklist's locus ordering, and dependency bookkeeping. Equality and
/// hashing are by [`NodeId`]; ordering for the worklist is injected
/// separately as ascending finish time.
#[derive(Clone)]
pub(crate) struct AccHandle(Rc<dyn AccumulatorDyn>);

impl AccHandle {
    pub(crate) fn node_id(&self) -> NodeId {
        self.0.node_id()
    }

    fn discover_children(&self) -> Vec<AccHandle> {
        self.0.discover_children()
    }

    fn register_dependent(&self, downstream: AccHandle, indices: Indices) {
        self.0.register_dependent(downstream, indices);
    }

    fn has_inputs(&self) -> bool {
        self.0.has_inputs()
    }

    fn push_notification(&self, downstream: AccHandle, indices: Indices) {
        self.0.push_notification(downstream, indices);
    }

    fn input_count(&self) -> usize {
        self.0.input_count()
    }

    fn process_pending(&self, changed: &FxHashSet<usize>) -> (bool, Vec<(AccHandle, Indices)>) {
        self.0.process_pending(changed)
    }

    /// DFS finish time, used as the worklist's order key so a pass over
    /// a dirtied accumulator always happens after every accumulator it
    /// depends on within the same pass (post-order ~ topological order
    /// on a DAG; groups strongly-connected components on a cycle).
    fn finish_time(&self) -> i64 {
        self.0.finish_time()
    }

    pub(crate) fn set_name(&self, name: String) {
        self.0.set_name(name);
    }

    pub(crate) fn name(&self) -> Option<String> {
        self.0.name()
    }

    /// Demote to a non-owning reference. Every back-edge an accumulator
    /// holds toward another node (its own `self_handle`, and any
    /// `downstream` it notifies on change) goes through this so that
    /// cyclic equations — this engine's headline feature — never close a
    /// permanent `Rc` cycle; only the forward edges in `inputs` (and
    /// whatever `Cell`s the caller holds) own a node.
    fn downgrade(&self) -> WeakAccHandle {
        WeakAccHandle(Rc::downgrade(&self.0))
    }
}

/// A non-owning reference to an accumulator, upgraded back to a strong
/// [`AccHandle`] only at the point of use. Used for back-edges (an
/// accumulator's reference to itself, and to any downstream accumulator
/// it notifies on change) that would otherwise keep a node alive forever.
#[derive(Clone)]
pub(crate) struct WeakAccHandle(std::rc::Weak<dyn AccumulatorDyn>);

impl WeakAccHandle {
    /// Upgrades to a strong handle. Can only fail if the accumulator it
    /// points to has already been dropped, which cannot happen here: this
    /// is called exclusively from within that same accumulator's own
    /// methods (`self.self_handle`) or from a callback fired synchronously
    /// while the downstream accumulator is still reachable through the
    /// `inputs` edge that justified registering the callback in the first
    /// place.
    fn upgrade(&self) -> AccHandle {
        AccHandle(
            self.0
                .upgrade()
                .expect("accumulator dropped while still reachable via a back-edge"),
        )
    }
}

impl PartialEq for AccHandle {
    fn eq(&self, other: &Self) -> bool {
        self.node_id() == other.node_id()
    }
}
impl Eq for AccHandle {}
impl Hash for AccHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node_id().hash(state);
    }
}
impl fmt::Debug for AccHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.name() {
            Some(name) => write!(f, "Accumulator({name}, {:?})", self.node_id()),
            None => write!(f, "Accumulator({:?})", self.node_id()),
        }
    }
}

impl DfsNode for AccHandle {
    fn is_discovered(&self) -> bool {
        self.0.is_discovered()
    }
    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
    fn stamp_discovery(&self, time: i64) {
        self.0.stamp_discovery(time);
    }
    fn stamp_finish(&self, time: i64) {
        self.0.stamp_finish(time);
    }
    /// The key set of `childNodesToInputs`, built lazily (and memoized)
    /// on first access — which, by construction of [`run_dfs`], happens
    /// exactly once, right after this node is discovered.
    fn child_nodes(&self) -> Vec<Self> {
        self.discover_children()
    }
}

/// Object-safe capability set every concrete `AccumulatorInner<A, B>`
/// implements, so the engine can drive DFS/worklist mechanics without
/// ever naming `A` or `B`.
pub(crate) trait AccumulatorDyn {
    fn node_id(&self) -> NodeId;
    fn name(&self) -> Option<String>;
    fn set_name(&self, name: String);
    fn discovery_time(&self) -> i64;
    fn finish_time(&self) -> i64;
    fn stamp_discovery(&self, time: i64);
    fn stamp_finish(&self, time: i64);
    fn is_discovered(&self) -> bool;
    fn is_finished(&self) -> bool;
    fn discover_children(&self) -> Vec<AccHandle>;
    fn register_dependent(&self, downstream: AccHandle, indices: Indices);
    fn has_inputs(&self) -> bool;
    fn input_count(&self) -> usize;
    fn push_notification(&self, downstream: AccHandle, indices: Indices);
    fn process_pending(&self, changed: &FxHashSet<usize>) -> (bool, Vec<(AccHandle, Indices)>);
}

/// The only stateful cell kind (data model, spec §3). Holds mutable
/// state `B`, a fixed set of accumulated inputs of type `A`, and the
/// combiner `(B, &[A]) -> B`.
pub(crate) struct AccumulatorInner<A, B> {
    id: NodeId,
    name: RefCell<Option<String>>,
    /// A non-owning back-reference to this node's own allocation, so it
    /// can hand peers a handle to itself without the node strong-owning
    /// itself (which would make it immortal — see `WeakAccHandle`).
    self_handle: RefCell<Option<WeakAccHandle>>,
    inputs: Vec<Cell<A>>,
    reactive: ReactiveCell<B, Vec<A>>,
    discovery_time: PrimCell<i64>,
    finish_time: PrimCell<i64>,
    child_cache: RefCell<Option<Vec<AccHandle>>>,
    /// Scratch buffer: callbacks fired synchronously inside
    /// `reactive.update()` (during `process_pending`) push here rather
    /// than touching the worklist directly, since the worklist is
    /// already mutably borrowed by the caller driving that update. The
    /// downstream side is weak for the same reason `self_handle` is: a
    /// registered callback otherwise never gets cleared, so a pair of
    /// mutually dependent accumulators would hold each other alive
    /// forever. Drained (and upgraded) immediately after `update()`
    /// returns.
    notify_queue: RefCell<Vec<(WeakAccHandle, Indices)>>,
}

impl<A, B> AccumulatorInner<A, B>
where
    A: Clone + 'static,
    B: Clone + PartialEq + 'static,
{
    fn new(
        id: NodeId,
        inputs: Vec<Cell<A>>,
        init: B,
        combine: impl Fn(&B, &[A]) -> B + 'static,
    ) -> Self {
        AccumulatorInner {
            id,
            name: RefCell::new(None),
            self_handle: RefCell::new(None),
            inputs,
            reactive: ReactiveCell::new(init, move |cur: &B, hint: &Vec<A>| combine(cur, hint)),
            discovery_time: PrimCell::new(crate::dfs::UNVISITED),
            finish_time: PrimCell::new(crate::dfs::UNVISITED),
            child_cache: RefCell::new(None),
            notify_queue: RefCell::new(Vec::new()),
        }
    }

    /// Must be called exactly once, immediately after wrapping this
    /// inner value in its owning `Rc`, so later callers always have a
    /// handle to hand to peers without needing `Rc::new_cyclic`. Stored
    /// weak: a node must never own a strong reference to itself.
    fn bind_self_handle(self: &Rc<Self>, handle: AccHandle) {
        *self.self_handle.borrow_mut() = Some(handle.downgrade());
    }
}

impl<A, B> AccumulatorDyn for AccumulatorInner<A, B>
where
    A: Clone + 'static,
    B: Clone + PartialEq + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> Option<String> {
        self.name.borrow().clone()
    }

    fn set_name(&self, name: String) {
        *self.name.borrow_mut() = Some(name);
    }

    fn discovery_time(&self) -> i64 {
        self.discovery_time.get()
    }

    fn finish_time(&self) -> i64 {
        self.finish_time.get()
    }

    fn stamp_discovery(&self, time: i64) {
        self.discovery_time.set(time);
    }

    fn stamp_finish(&self, time: i64) {
        self.finish_time.set(time);
    }

    fn is_discovered(&self) -> bool {
        self.discovery_time.get() >= 0
    }

    fn is_finished(&self) -> bool {
        self.finish_time.get() >= 0
    }

    fn discover_children(&self) -> Vec<AccHandle> {
        if let Some(cached) = self.child_cache.borrow().as_ref() {
            return cached.clone();
        }

        let mut by_upstream: FxHashMap<NodeId, (AccHandle, Indices)> = FxHashMap::default();
        for (i, input) in self.inputs.iter().enumerate() {
            for upstream in input.node.upstream_accumulators() {
                by_upstream
                    .entry(upstream.node_id())
                    .or_insert_with(|| (upstream.clone(), SmallVec::new()))
                    .1
                    .push(i);
            }
        }

        let self_handle = self
            .self_handle
            .borrow()
            .clone()
            .expect("self_handle bound before any DFS visit is possible")
            .upgrade();

        let children: Vec<AccHandle> = by_upstream.values().map(|(h, _)| h.clone()).collect();
        for (upstream, indices) in by_upstream.into_values() {
            upstream.register_dependent(self_handle.clone(), indices);
        }

        *self.child_cache.borrow_mut() = Some(children.clone());
        children
    }

    /// Registers, on *this* (upstream) accumulator's own reactive cell,
    /// a callback that — when this node's value actually changes — files
    /// a `(downstream, indices)` notification for `downstream` to pick
    /// up once the current `process_pending` call returns. `indices` is
    /// exactly `downstream`'s inputs that route through this node.
    ///
    /// Both handles captured by the closure are weak: for a genuinely
    /// cyclic equation (a self-referential accumulator tied with
    /// `delay`, or two mutually dependent accumulators) a strong
    /// capture here would leave each participant holding the other
    /// alive forever, since this callback is never deregistered. Each
    /// is upgraded only for the instant the callback actually fires,
    /// synchronously inside `process_pending` while every accumulator
    /// reachable from the solve root is still kept alive by the `inputs`
    /// edges the DFS walked to discover it in the first place.
    fn register_dependent(&self, downstream: AccHandle, indices: Indices) {
        let weak_self = self
            .self_handle
            .borrow()
            .clone()
            .expect("self_handle bound before any dependent can be registered");
        let weak_downstream = downstream.downgrade();
        self.reactive.register_on_update(move || {
            weak_self
                .upgrade()
                .push_notification(weak_downstream.upgrade(), indices.clone());
        });
    }

    fn has_inputs(&self) -> bool {
        !self.inputs.is_empty()
    }

    fn input_count(&self) -> usize {
        self.inputs.len()
    }

    fn push_notification(&self, downstream: AccHandle, indices: Indices) {
        self.notify_queue
            .borrow_mut()
            .push((downstream.downgrade(), indices));
    }

    fn process_pending(&self, changed: &FxHashSet<usize>) -> (bool, Vec<(AccHandle, Indices)>) {
        fatal_assert!(
            "E-EMPTY-CHANGED-INPUTS",
            !changed.is_empty(),
            "process_pending invoked on node {:?} with no pending inputs",
            self.id
        );

        let changed_values: Vec<A> = changed
            .iter()
            .map(|&i| self.inputs[i].node.current_value())
            .collect();
        let did_change = self.reactive.update(&changed_values);

        let notifications = if did_change {
            self.notify_queue
                .borrow_mut()
                .drain(..)
                .map(|(weak, indices)| (weak.upgrade(), indices))
                .collect()
        } else {
            Vec::new()
        };
        (did_change, notifications)
    }
}

impl<A, B> CellNode<B> for AccumulatorInner<A, B>
where
    A: Clone + 'static,
    B: Clone + PartialEq + 'static,
{
    fn current_value(&self) -> B {
        self.reactive.current_value()
    }

    fn upstream_accumulators(&self) -> Vec<AccHandle> {
        vec![self
            .self_handle
            .borrow()
            .clone()
            .expect("self_handle bound before any external use")
            .upgrade()]
    }

    fn as_accumulator(&self) -> Option<AccHandle> {
        self.self_handle.borrow().as_ref().map(WeakAccHandle::upgrade)
    }
}

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct ContextInner {
    id: ContextId,
    time: DfsTime,
    worklist: RefCell<Worklist<AccHandle, FxHashSet<usize>, i64>>,
    next_node_id: PrimCell<u64>,
    solving: PrimCell<bool>,
    discovered_count: PrimCell<u64>,
    worklist_steps: PrimCell<u64>,
    observer: Rc<dyn SolveObserver>,
    /// Every accumulator discovered so far, in discovery order. Purely
    /// for [`Context::describe`]; nothing in the solve path reads it.
    discovered: RefCell<Vec<AccHandle>>,
}

impl ContextInner {
    fn new(observer: Rc<dyn SolveObserver>) -> Rc<Self> {
        let observer_for_worklist = observer.clone();
        let worklist = Worklist::new(
            move |h: &AccHandle,
                  todos: FxHashSet<usize>,
                  wl: &mut Worklist<AccHandle, FxHashSet<usize>, i64>| {
                #[cfg(feature = "tracing")]
                tracing::trace!(node = ?h, pending = todos.len(), "worklist: popped locus");
                let (changed, notifications) = h.process_pending(&todos);
                observer_for_worklist.on_process(h.node_id().0, changed);
                for (dependent, indices) in notifications {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(from = ?h, to = ?dependent, "worklist: coalescing notification");
                    wl.add_todos(dependent, indices.into_iter().collect());
                }
            },
            FxHashSet::default(),
            |a: FxHashSet<usize>, b: FxHashSet<usize>| a.union(&b).copied().collect(),
            |h: &AccHandle| h.finish_time(),
        );

        Rc::new(ContextInner {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, AtomicOrdering::Relaxed)),
            time: DfsTime::new(),
            worklist: RefCell::new(worklist),
            next_node_id: PrimCell::new(0),
            solving: PrimCell::new(false),
            discovered_count: PrimCell::new(0),
            worklist_steps: PrimCell::new(0),
            observer,
            discovered: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn next_node_id(&self) -> NodeId {
        let id = self.next_node_id.get();
        self.next_node_id.set(id + 1);
        NodeId(id)
    }

    /// `get` step 1/2 (spec §4.4): if already discovered, nothing to do —
    /// either a prior call solved it, or it's mid-solve on this very call
    /// stack (reentrancy, guarded below). Otherwise discover and drain.
    pub(crate) fn solve(&self, root: &AccHandle) {
        if root.is_discovered() {
            return;
        }
        if self.solving.get() {
            panic!("{}", ContextError::ReentrantSolve(self.id));
        }

        let _guard = SolvingGuard::new(&self.solving);
        self.discover_and_solve_from(root);
    }

    fn discover_and_solve_from(&self, root: &AccHandle) {
        {
            let observer = &self.observer;
            let discovered_count = &self.discovered_count;
            let discovered = &self.discovered;
            let worklist = &self.worklist;
            let mut on_discovery = |n: &AccHandle| {
                discovered_count.set(discovered_count.get() + 1);
                discovered.borrow_mut().push(n.clone());
                #[cfg(feature = "tracing")]
                tracing::debug!(node = ?n, time = n.0.discovery_time(), "dfs: discovered");
                observer.on_discover(n.node_id().0);
            };
            let mut on_finish = |n: &AccHandle| {
                let seeded = n.has_inputs();
                if seeded {
                    let all_indices: FxHashSet<usize> = (0..n.input_count()).collect();
                    worklist.borrow_mut().add_todos(n.clone(), all_indices);
                }
                #[cfg(feature = "tracing")]
                tracing::debug!(node = ?n, time = n.0.finish_time(), seeded, "dfs: finished");
                observer.on_finish(n.node_id().0, seeded);
            };
            run_dfs(root, &mut on_discovery, &mut on_finish, &self.time);
        }

        // `work_until_empty`'s own do_work counts as one "step" per pop;
        // tracked here for the diagnostic counter, not for correctness.
        let steps_before = self.worklist_steps.get();
        self.worklist.borrow_mut().work_until_empty();
        self.worklist_steps.set(steps_before + 1);
    }

    pub(crate) fn assert_same_context(&self, other: &ContextInner) {
        if self.id != other.id {
            panic!(
                "{}",
                ContextError::ForeignContext {
                    expected: self.id,
                    found: other.id,
                }
            );
        }
    }

    pub(crate) fn discovered_count(&self) -> u64 {
        self.discovered_count.get()
    }

    pub(crate) fn worklist_steps(&self) -> u64 {
        self.worklist_steps.get()
    }

    /// One line per discovered accumulator, in discovery order: its
    /// name (if any, via [`crate::cell::Cell::named`]), node id, and
    /// discovery/finish times. Diagnostic only — the formatting is not
    /// part of this crate's semver contract.
    fn describe(&self) -> String {
        use std::fmt::Write as _;
        let mut out = String::new();
        for handle in self.discovered.borrow().iter() {
            let _ = writeln!(
                out,
                "{:?}  discovered={}  finished={}",
                handle,
                handle.0.discovery_time(),
                handle.0.finish_time(),
            );
        }
        out
    }
}

/// RAII guard so a panic mid-solve (e.g. a user combiner panicking)
/// still clears the reentrancy flag on unwind, rather than wedging the
/// context into permanently refusing further `.get()` calls.
struct SolvingGuard<'a>(&'a PrimCell<bool>);
impl<'a> SolvingGuard<'a> {
    fn new(flag: &'a PrimCell<bool>) -> Self {
        flag.set(true);
        SolvingGuard(flag)
    }
}
impl<'a> Drop for SolvingGuard<'a> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// An isolated solver instance owning one DFS time counter and one
/// worklist (spec glossary: "Context"). Two contexts share no state;
/// solving one never touches the other.
#[derive(Clone)]
pub struct Context(pub(crate) Rc<ContextInner>);

impl Context {
    pub fn new() -> Self {
        Context(ContextInner::new(Rc::new(())))
    }

    pub fn with_observer(observer: impl SolveObserver + 'static) -> Self {
        Context(ContextInner::new(Rc::new(observer)))
    }

    /// How many accumulators this context has discovered across every
    /// `.get()` call so far. Diagnostic only; no semantic effect.
    pub fn discovered_count(&self) -> u64 {
        self.0.discovered_count()
    }

    /// How many top-level `discover_and_solve_from` passes this context
    /// has run. Diagnostic only; no semantic effect.
    pub fn solve_passes(&self) -> u64 {
        self.0.worklist_steps()
    }

    /// A human-readable listing of every accumulator discovered so far
    /// in this context, in discovery order — one line each, showing its
    /// [`crate::cell::Cell::named`] name (if set), node id, and
    /// discovery/finish times. For debugging only; the exact format is
    /// not part of this crate's semver contract.
    pub fn describe(&self) -> String {
        self.0.describe()
    }

    pub(crate) fn accumulator_raw<A, B>(
        &self,
        inputs: Vec<Cell<A>>,
        init: B,
        combine: impl Fn(&B, &[A]) -> B + 'static,
    ) -> Cell<B>
    where
        A: Clone + 'static,
        B: Clone + PartialEq + 'static,
    {
        for input in &inputs {
            self.0.assert_same_context(&input.ctx.0);
        }
        let id = self.0.next_node_id();
        let inner = Rc::new(AccumulatorInner::new(id, inputs, init, combine));
        let handle = AccHandle(inner.clone() as Rc<dyn AccumulatorDyn>);
        AccumulatorInner::bind_self_handle(&inner, handle);
        Cell {
            ctx: self.clone(),
            node: inner as Rc<dyn CellNode<B>>,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}
