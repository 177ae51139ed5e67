//! `Dfs` — generic recursive depth-first search with discovery/finish
//! timestamps under a shared, monotonically increasing counter (spec
//! component 4.2).
//!
//! Stateless: it owns nothing but the time counter, and can be launched
//! any number of times against disjoint or overlapping node sets as long
//! as every launch's `start` is undiscovered. Sharing one [`DfsTime`]
//! across launches is what keeps finish-time ordering coherent when
//! [`crate::engine::FlowEngine`] discovers a new subgraph on every
//! `.get()` root.

use std::cell::Cell as PrimCell;

/// Sentinel for an unassigned discovery/finish time.
pub const UNVISITED: i64 = -1;

/// The capability set a node must expose to participate in [`run_dfs`].
pub trait DfsNode: Clone {
    fn is_discovered(&self) -> bool;
    fn is_finished(&self) -> bool;
    fn stamp_discovery(&self, time: i64);
    fn stamp_finish(&self, time: i64);
    /// `childNodes`: in this engine these are the *upstream* producers of
    /// `self`, i.e. DFS runs against the direction information flows.
    /// Built lazily by the node itself, typically memoized the first
    /// time this is called (which `run_dfs` guarantees is at most once,
    /// right after discovery).
    fn child_nodes(&self) -> Vec<Self>;
}

/// A single monotonically increasing integer, shared across possibly
/// many [`run_dfs`] launches so that finish times stay globally unique
/// and comparable.
#[derive(Debug, Default)]
pub struct DfsTime(PrimCell<i64>);

impl DfsTime {
    pub fn new() -> Self {
        DfsTime(PrimCell::new(0))
    }

    fn tick(&self) -> i64 {
        let next = self.0.get() + 1;
        self.0.set(next);
        next
    }
}

/// Depth-first search from `start`. Precondition: `!start.is_discovered()`.
///
/// Calls `on_discovery(n)` immediately after stamping `n`'s discovery
/// time (and before recursing into its children), and `on_finish(n)`
/// immediately after stamping its finish time. Children already
/// discovered (by this launch or an earlier one sharing `time`) are
/// skipped without recursion, as in standard DFS.
pub fn run_dfs<N: DfsNode>(
    start: &N,
    on_discovery: &mut dyn FnMut(&N),
    on_finish: &mut dyn FnMut(&N),
    time: &DfsTime,
) {
    debug_assert!(
        !start.is_discovered(),
        "Dfs precondition violated: start node was already discovered"
    );

    let t = time.tick();
    start.stamp_discovery(t);
    on_discovery(start);

    for child in start.child_nodes() {
        if !child.is_discovered() {
            run_dfs(&child, on_discovery, on_finish, time);
        }
    }

    let t = time.tick();
    start.stamp_finish(t);
    on_finish(start);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone)]
    struct TestNode(Rc<TestNodeInner>);

    struct TestNodeInner {
        name: &'static str,
        discovery: PrimCell<i64>,
        finish: PrimCell<i64>,
        children: RefCell<Vec<TestNode>>,
    }

    impl TestNode {
        fn new(name: &'static str) -> Self {
            TestNode(Rc::new(TestNodeInner {
                name,
                discovery: PrimCell::new(UNVISITED),
                finish: PrimCell::new(UNVISITED),
                children: RefCell::new(Vec::new()),
            }))
        }

        fn link(&self, child: &TestNode) {
            self.0.children.borrow_mut().push(child.clone());
        }
    }

    impl DfsNode for TestNode {
        fn is_discovered(&self) -> bool {
            self.0.discovery.get() >= 0
        }
        fn is_finished(&self) -> bool {
            self.0.finish.get() >= 0
        }
        fn stamp_discovery(&self, time: i64) {
            self.0.discovery.set(time);
        }
        fn stamp_finish(&self, time: i64) {
            self.0.finish.set(time);
        }
        fn child_nodes(&self) -> Vec<Self> {
            self.0.children.borrow().clone()
        }
    }

    /// Scenario 5 from spec.md §8: graph
    /// `u->{v,x}, v->{y}, w->{y,z}, x->{v}, y->{x}, z->{z}`,
    /// roots `[u, w]` in that order.
    #[test]
    fn dfs_ordering_matches_worked_example() {
        let u = TestNode::new("u");
        let v = TestNode::new("v");
        let w = TestNode::new("w");
        let x = TestNode::new("x");
        let y = TestNode::new("y");
        let z = TestNode::new("z");

        u.link(&v);
        u.link(&x);
        v.link(&y);
        w.link(&y);
        w.link(&z);
        x.link(&v);
        y.link(&x);
        z.link(&z);

        let time = DfsTime::new();
        let events = Rc::new(RefCell::new(Vec::new()));

        let run_root = |root: &TestNode, events: &Rc<RefCell<Vec<String>>>, time: &DfsTime| {
            let disc_events = events.clone();
            let fin_events = events.clone();
            let mut on_discovery = move |n: &TestNode| {
                disc_events
                    .borrow_mut()
                    .push(format!("Discover {}({})", n.0.name, n.0.discovery.get()));
            };
            let mut on_finish = move |n: &TestNode| {
                fin_events.borrow_mut().push(format!(
                    "Finish {}[{},{}]",
                    n.0.name,
                    n.0.discovery.get(),
                    n.0.finish.get()
                ));
            };
            run_dfs(root, &mut on_discovery, &mut on_finish, time);
        };

        run_root(&u, &events, &time);
        run_root(&w, &events, &time);

        let expected = vec![
            "Discover u(1)",
            "Discover v(2)",
            "Discover y(3)",
            "Discover x(4)",
            "Finish x[4,5]",
            "Finish y[3,6]",
            "Finish v[2,7]",
            "Finish u[1,8]",
            "Discover w(9)",
            "Discover z(10)",
            "Finish z[10,11]",
            "Finish w[9,12]",
        ];
        assert_eq!(*events.borrow(), expected);
    }

    #[test]
    fn self_loop_child_is_skipped_once_discovered() {
        let z = TestNode::new("z");
        z.link(&z);
        let time = DfsTime::new();
        let mut discoveries = 0;
        let mut on_discovery = |_: &TestNode| discoveries += 1;
        let mut on_finish = |_: &TestNode| {};
        run_dfs(&z, &mut on_discovery, &mut on_finish, &time);
        assert_eq!(discoveries, 1);
        assert!(z.is_finished());
    }

    #[test]
    fn times_are_unique_across_launches_sharing_a_counter() {
        let a = TestNode::new("a");
        let b = TestNode::new("b");
        let time = DfsTime::new();
        let mut nop_d = |_: &TestNode| {};
        let mut nop_f = |_: &TestNode| {};
        run_dfs(&a, &mut nop_d, &mut nop_f, &time);
        run_dfs(&b, &mut nop_d, &mut nop_f, &time);
        assert_ne!(a.0.discovery.get(), b.0.discovery.get());
        assert!(b.0.discovery.get() > a.0.finish.get());
    }
}
