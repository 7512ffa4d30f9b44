use proptest::prelude::*;

use super::cfg::*;
use super::cfg_tests::TestCfg;
use super::domains::*;
use super::solvers::*;

/// Collects the set of nodes on some path from the boundary to a node.
struct VisitedNodes {
    direction: Direction,
    universe: BitSetTop,
    transfers: usize,
}

impl VisitedNodes {
    fn new(cfg: &TestCfg, direction: Direction) -> Self {
        Self {
            direction,
            universe: BitSetTop(cfg.node_count()),
            transfers: 0,
        }
    }
}

impl DataflowAnalysis<TestCfg> for VisitedNodes {
    type Fact = BitSet;

    fn direction(&self) -> Direction {
        self.direction
    }

    fn lattice_context(&self) -> &BitSetTop {
        &self.universe
    }

    fn boundary_fact(&self, _cfg: &TestCfg, node: usize) -> BitSet {
        BitSet::from(&self.universe, &[node])
    }

    fn transfer_node(&mut self, _cfg: &TestCfg, node: usize, input: &BitSet) -> BitSet {
        self.transfers += 1;
        let mut output = input.clone();
        output.insert(node);
        output
    }
}

fn diamond_with_loop() -> TestCfg {
    //     0
    //    / \
    //   1   2 <-
    //   |   |  |
    //   |   3 --
    //    \ /
    //     4
    let mut cfg = TestCfg::new(5);
    cfg.add_edge(0, 1)
        .add_edge(0, 2)
        .add_edge(1, 4)
        .add_edge(2, 3)
        .add_edge(3, 2)
        .add_edge(3, 4);
    cfg
}

#[test]
fn forward_solution() {
    let cfg = diamond_with_loop();
    let mut analysis = VisitedNodes::new(&cfg, Direction::Forward);
    let result = WorklistSolver::default().solve(&cfg, &mut analysis);

    let ctx = BitSetTop(5);
    assert_eq!(*result.out_fact(0), BitSet::from(&ctx, &[0]));
    assert_eq!(*result.in_fact(1), BitSet::from(&ctx, &[0]));
    assert_eq!(*result.out_fact(2), BitSet::from(&ctx, &[0, 2, 3]));
    assert_eq!(*result.in_fact(4), BitSet::from(&ctx, &[0, 1, 2, 3]));
    assert_eq!(*result.out_fact(4), BitSet::from(&ctx, &[0, 1, 2, 3, 4]));
}

#[test]
fn backward_solution() {
    let cfg = diamond_with_loop();
    let mut analysis = VisitedNodes::new(&cfg, Direction::Backward);
    let result = WorklistSolver::default().solve(&cfg, &mut analysis);

    let ctx = BitSetTop(5);
    assert_eq!(*result.in_fact(4), BitSet::from(&ctx, &[4]));
    assert_eq!(*result.in_fact(1), BitSet::from(&ctx, &[1, 4]));
    assert_eq!(*result.in_fact(2), BitSet::from(&ctx, &[2, 3, 4]));
    assert_eq!(*result.out_fact(0), BitSet::from(&ctx, &[1, 2, 3, 4]));
    assert_eq!(*result.in_fact(0), BitSet::from(&ctx, &[0, 1, 2, 3, 4]));
}

#[test]
fn exit_is_transferred_once() {
    let mut cfg = TestCfg::new(3);
    cfg.add_edge(0, 1).add_edge(1, 2);
    let mut analysis = VisitedNodes::new(&cfg, Direction::Forward);
    WorklistSolver::default().solve(&cfg, &mut analysis);
    // Node 1 once while iterating, the exit once afterwards.
    assert_eq!(analysis.transfers, 2);
}

#[test]
#[should_panic(expected = "No dataflow fact for node 7")]
fn missing_fact_panics() {
    let cfg = diamond_with_loop();
    let mut analysis = VisitedNodes::new(&cfg, Direction::Forward);
    let result = WorklistSolver::default().solve(&cfg, &mut analysis);
    result.in_fact(7);
}

/// Drops every fact flowing along edges into `blocked`, and makes node 1
/// depend on node 3 without an edge between them.
struct Filtered {
    inner: VisitedNodes,
    blocked: usize,
}

impl DataflowAnalysis<TestCfg> for Filtered {
    type Fact = BitSet;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn lattice_context(&self) -> &BitSetTop {
        &self.inner.universe
    }

    fn boundary_fact(&self, cfg: &TestCfg, node: usize) -> BitSet {
        self.inner.boundary_fact(cfg, node)
    }

    fn transfer_node(&mut self, cfg: &TestCfg, node: usize, input: &BitSet) -> BitSet {
        self.inner.transfer_node(cfg, node, input)
    }

    fn transfer_edge(&mut self, _cfg: &TestCfg, edge: &FlowEdge<()>, fact: &BitSet) -> BitSet {
        if edge.target == self.blocked {
            BitSet::bottom(&self.inner.universe)
        } else {
            fact.clone()
        }
    }

    fn dependents(&self, _cfg: &TestCfg, node: usize) -> Vec<usize> {
        if node == 3 { vec![1] } else { Vec::new() }
    }
}

#[test]
fn edge_transfer_and_dependents() {
    let cfg = diamond_with_loop();
    let mut analysis = Filtered {
        inner: VisitedNodes::new(&cfg, Direction::Forward),
        blocked: 2,
    };
    let result = WorklistSolver::new(WorklistOrder::Lifo).solve(&cfg, &mut analysis);

    let ctx = BitSetTop(5);
    assert_eq!(*result.out_fact(2), BitSet::from(&ctx, &[2]));
    assert_eq!(*result.out_fact(3), BitSet::from(&ctx, &[2, 3]));
    assert_eq!(*result.out_fact(4), BitSet::from(&ctx, &[0, 1, 2, 3, 4]));
}

fn arbitrary_cfg() -> impl Strategy<Value = TestCfg> {
    (3usize..12).prop_flat_map(|size| {
        prop::collection::vec((0..size, 0..size), 0..(size * 3)).prop_map(move |edges| {
            let mut cfg = TestCfg::new(size);
            // Keep a spine so every node is reachable.
            for node in 0..size - 1 {
                cfg.add_edge(node, node + 1);
            }
            for (source, target) in edges {
                // The exit has no successors and the entry no predecessors.
                if source != size - 1 && target != 0 {
                    cfg.add_edge(source, target);
                }
            }
            cfg
        })
    })
}

fn solve_with(cfg: &TestCfg, order: WorklistOrder, direction: Direction) -> DataflowResult<BitSet> {
    let mut analysis = VisitedNodes::new(cfg, direction);
    WorklistSolver::new(order).solve(cfg, &mut analysis)
}

proptest! {
    #[test]
    fn orders_agree(cfg in arbitrary_cfg()) {
        for direction in [Direction::Forward, Direction::Backward] {
            let fifo = solve_with(&cfg, WorklistOrder::Fifo, direction);
            let lifo = solve_with(&cfg, WorklistOrder::Lifo, direction);
            let rpo = solve_with(&cfg, WorklistOrder::ReversePostOrder, direction);
            prop_assert_eq!(&fifo, &lifo);
            prop_assert_eq!(&fifo, &rpo);
        }
    }

    #[test]
    fn result_is_a_fixpoint(cfg in arbitrary_cfg()) {
        let result = solve_with(&cfg, WorklistOrder::Fifo, Direction::Forward);
        let mut analysis = VisitedNodes::new(&cfg, Direction::Forward);
        for node in 1..cfg.node_count() {
            let mut input = BitSet::bottom(&analysis.universe);
            for pred in cfg.predecessors(node) {
                input.join_assign(result.out_fact(pred), &analysis.universe);
            }
            prop_assert_eq!(&input, result.in_fact(node));
            prop_assert_eq!(&analysis.transfer_node(&cfg, node, &input), result.out_fact(node));
        }
    }
}
