use super::cfg::{ControlFlowGraph, Direction, FlowEdge, Worklist, WorklistOrder};
use super::domains::JoinSemiLattice;

/// A monotone dataflow problem over a flow graph. Implementations decide
/// the direction, the lattice of facts, and the transfer functions. The
/// [`WorklistSolver`] computes the least fixpoint.
pub trait DataflowAnalysis<Cfg: ControlFlowGraph> {
    type Fact: JoinSemiLattice;

    fn direction(&self) -> Direction;

    fn lattice_context(&self) -> &<Self::Fact as JoinSemiLattice>::LatticeContext;

    /// The fact at the boundary node: the OUT of an entry node for forward
    /// analyses and the IN of an exit node for backward ones.
    fn boundary_fact(&self, cfg: &Cfg, node: usize) -> Self::Fact;

    /// The starting fact of every other node.
    fn initial_fact(&self, _cfg: &Cfg) -> Self::Fact {
        Self::Fact::bottom(self.lattice_context())
    }

    /// Combine `fact` into `target`.
    fn meet_into(&self, fact: &Self::Fact, target: &mut Self::Fact) {
        target.join_assign(fact, self.lattice_context());
    }

    /// Compute the fact after `node` (forward) or before it (backward) from
    /// the fact on the other side. Must be monotone.
    fn transfer_node(&mut self, cfg: &Cfg, node: usize, input: &Self::Fact) -> Self::Fact;

    /// Transform a fact while it travels along an edge. Intra-procedural
    /// analyses rarely need this, inter-procedural ones bind parameters
    /// and return values here.
    fn transfer_edge(
        &mut self,
        _cfg: &Cfg,
        _edge: &FlowEdge<Cfg::EdgeKind>,
        fact: &Self::Fact,
    ) -> Self::Fact {
        fact.clone()
    }

    /// Nodes that must be revisited when the output fact of `node` changes,
    /// in addition to its flow successors.
    fn dependents(&self, _cfg: &Cfg, _node: usize) -> Vec<usize> {
        Vec::new()
    }
}

/// The IN and OUT facts of every node of a flow graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataflowResult<D> {
    in_facts: Vec<D>,
    out_facts: Vec<D>,
}

impl<D> DataflowResult<D> {
    pub fn in_fact(&self, node: usize) -> &D {
        self.in_facts
            .get(node)
            .unwrap_or_else(|| panic!("No dataflow fact for node {node}"))
    }

    pub fn out_fact(&self, node: usize) -> &D {
        self.out_facts
            .get(node)
            .unwrap_or_else(|| panic!("No dataflow fact for node {node}"))
    }

    pub fn node_count(&self) -> usize {
        self.in_facts.len()
    }
}

/// Solve a dataflow problem by iterating transfer functions until no fact
/// changes. A node is only queued when a fact it depends on changed.
/// Forward problems never enqueue exit nodes, their facts are computed
/// once after the fixpoint is reached. Backward problems do the same with
/// entry nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WorklistSolver {
    pub order: WorklistOrder,
}

impl WorklistSolver {
    pub fn new(order: WorklistOrder) -> Self {
        Self { order }
    }

    pub fn solve<Cfg, A>(&self, cfg: &Cfg, analysis: &mut A) -> DataflowResult<A::Fact>
    where
        Cfg: ControlFlowGraph,
        A: DataflowAnalysis<Cfg>,
    {
        match analysis.direction() {
            Direction::Forward => self.solve_forward(cfg, analysis),
            Direction::Backward => self.solve_backward(cfg, analysis),
        }
    }

    fn solve_forward<Cfg, A>(&self, cfg: &Cfg, analysis: &mut A) -> DataflowResult<A::Fact>
    where
        Cfg: ControlFlowGraph,
        A: DataflowAnalysis<Cfg>,
    {
        let node_count = cfg.node_count();
        let initial = analysis.initial_fact(cfg);
        let mut result = DataflowResult {
            in_facts: vec![initial.clone(); node_count],
            out_facts: vec![initial; node_count],
        };
        for node in (0..node_count).filter(|&n| cfg.is_entry(n)) {
            let boundary = analysis.boundary_fact(cfg, node);
            result.in_facts[node] = boundary.clone();
            result.out_facts[node] = boundary;
        }

        let is_inner = |n: usize| !cfg.is_entry(n) && !cfg.is_exit(n);
        let mut worklist = Worklist::new(cfg, self.order, Direction::Forward);
        for node in (0..node_count).filter(|&n| is_inner(n)) {
            worklist.push(node);
        }

        while let Some(node) = worklist.pop() {
            let input = Self::merge_in(cfg, analysis, node, &result.out_facts);
            let output = analysis.transfer_node(cfg, node, &input);
            result.in_facts[node] = input;
            if output == result.out_facts[node] {
                continue;
            }
            result.out_facts[node] = output;
            for succ in cfg.successors(node).filter(|&n| is_inner(n)) {
                worklist.push(succ);
            }
            for dependent in analysis.dependents(cfg, node) {
                worklist.push(dependent);
            }
        }

        for node in (0..node_count).filter(|&n| cfg.is_exit(n) && !cfg.is_entry(n)) {
            let input = Self::merge_in(cfg, analysis, node, &result.out_facts);
            result.out_facts[node] = analysis.transfer_node(cfg, node, &input);
            result.in_facts[node] = input;
        }
        result
    }

    fn solve_backward<Cfg, A>(&self, cfg: &Cfg, analysis: &mut A) -> DataflowResult<A::Fact>
    where
        Cfg: ControlFlowGraph,
        A: DataflowAnalysis<Cfg>,
    {
        let node_count = cfg.node_count();
        let initial = analysis.initial_fact(cfg);
        let mut result = DataflowResult {
            in_facts: vec![initial.clone(); node_count],
            out_facts: vec![initial; node_count],
        };
        for node in (0..node_count).filter(|&n| cfg.is_exit(n)) {
            let boundary = analysis.boundary_fact(cfg, node);
            result.in_facts[node] = boundary.clone();
            result.out_facts[node] = boundary;
        }

        let is_inner = |n: usize| !cfg.is_entry(n) && !cfg.is_exit(n);
        let mut worklist = Worklist::new(cfg, self.order, Direction::Backward);
        for node in (0..node_count).rev().filter(|&n| is_inner(n)) {
            worklist.push(node);
        }

        while let Some(node) = worklist.pop() {
            let output = Self::merge_out(cfg, analysis, node, &result.in_facts);
            let input = analysis.transfer_node(cfg, node, &output);
            result.out_facts[node] = output;
            if input == result.in_facts[node] {
                continue;
            }
            result.in_facts[node] = input;
            for pred in cfg.predecessors(node).filter(|&n| is_inner(n)) {
                worklist.push(pred);
            }
            for dependent in analysis.dependents(cfg, node) {
                worklist.push(dependent);
            }
        }

        for node in (0..node_count).filter(|&n| cfg.is_entry(n) && !cfg.is_exit(n)) {
            let output = Self::merge_out(cfg, analysis, node, &result.in_facts);
            result.in_facts[node] = analysis.transfer_node(cfg, node, &output);
            result.out_facts[node] = output;
        }
        result
    }

    /// Meet of the OUT facts of the predecessors, after the edge transfer.
    fn merge_in<Cfg, A>(cfg: &Cfg, analysis: &mut A, node: usize, out_facts: &[A::Fact]) -> A::Fact
    where
        Cfg: ControlFlowGraph,
        A: DataflowAnalysis<Cfg>,
    {
        let mut input = analysis.initial_fact(cfg);
        for edge in cfg.in_edges(node) {
            let flowed = analysis.transfer_edge(cfg, edge, &out_facts[edge.source]);
            analysis.meet_into(&flowed, &mut input);
        }
        input
    }

    fn merge_out<Cfg, A>(cfg: &Cfg, analysis: &mut A, node: usize, in_facts: &[A::Fact]) -> A::Fact
    where
        Cfg: ControlFlowGraph,
        A: DataflowAnalysis<Cfg>,
    {
        let mut output = analysis.initial_fact(cfg);
        for edge in cfg.out_edges(node) {
            let flowed = analysis.transfer_edge(cfg, edge, &in_facts[edge.target]);
            analysis.meet_into(&flowed, &mut output);
        }
        output
    }
}
