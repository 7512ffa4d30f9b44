use core::cmp::Reverse;
use core::fmt::Debug;
use std::collections::VecDeque;
use std::fmt::Write;

use fixedbitset::FixedBitSet;
use priority_queue::PriorityQueue;

/// A directed edge of a flow graph. Nodes are dense indices in
/// `0..node_count()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlowEdge<K> {
    pub source: usize,
    pub target: usize,
    pub kind: K,
}

/// A node-oriented flow graph. Both intra-procedural control flow graphs
/// and inter-procedural graphs implement this trait, so the same solver
/// runs on both.
pub trait ControlFlowGraph {
    type EdgeKind: Copy + Debug;

    fn node_count(&self) -> usize;
    fn in_edges(&self, node: usize) -> &[FlowEdge<Self::EdgeKind>];
    fn out_edges(&self, node: usize) -> &[FlowEdge<Self::EdgeKind>];
    fn is_entry(&self, node: usize) -> bool;
    fn is_exit(&self, node: usize) -> bool;

    fn successors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.out_edges(node).iter().map(|e| e.target)
    }

    fn predecessors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.in_edges(node).iter().map(|e| e.source)
    }
}

/// Render the graph in the dot format. The `printer` produces the label of
/// each node.
pub fn print<Cfg, NodePrinter>(name: Option<&str>, cfg: &Cfg, printer: NodePrinter) -> String
where
    Cfg: ControlFlowGraph,
    NodePrinter: Fn(usize) -> String,
{
    let mut output = format!("digraph {} {{\n", name.unwrap_or("CFG"));
    for node in 0..cfg.node_count() {
        let label = printer(node).replace('"', "\\\"");
        writeln!(output, "  Node_{node}[label=\"{label}\"]").unwrap();
    }
    output.push('\n');
    for node in 0..cfg.node_count() {
        for edge in cfg.out_edges(node) {
            writeln!(
                output,
                "  Node_{} -> Node_{}[label=\"{:?}\"]",
                edge.source, edge.target, edge.kind
            )
            .unwrap();
        }
    }
    output.push_str("}\n");
    output
}

/// The direction facts flow through a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

/// Compute the reverse post-order rank of every node when traversing the
/// graph in `direction`. The traversal starts from the entry (or exit)
/// nodes, nodes unreachable from those are ranked after every reachable
/// node.
pub fn reverse_post_order<Cfg: ControlFlowGraph>(cfg: &Cfg, direction: Direction) -> Vec<usize> {
    let node_count = cfg.node_count();
    let next = |node: usize| -> Vec<usize> {
        match direction {
            Direction::Forward => cfg.successors(node).collect(),
            Direction::Backward => cfg.predecessors(node).collect(),
        }
    };
    let is_root = |node: usize| match direction {
        Direction::Forward => cfg.is_entry(node),
        Direction::Backward => cfg.is_exit(node),
    };

    let mut visited = FixedBitSet::with_capacity(node_count);
    let mut post_order = Vec::with_capacity(node_count);
    let roots = (0..node_count).filter(|&n| is_root(n)).chain(0..node_count);
    for root in roots {
        if visited.put(root) {
            continue;
        }
        // Every frame holds the successors still to be visited, popped from the back.
        let mut stack = vec![(root, next(root))];
        while let Some((node, pending)) = stack.last_mut() {
            match pending.pop() {
                Some(succ) => {
                    if !visited.put(succ) {
                        stack.push((succ, next(succ)));
                    }
                }
                None => {
                    post_order.push(*node);
                    stack.pop();
                }
            }
        }
    }

    let mut rank = vec![0; node_count];
    for (order, node) in post_order.into_iter().rev().enumerate() {
        rank[node] = order;
    }
    rank
}

/// The strategy a [`Worklist`] uses to pick the next node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WorklistOrder {
    #[default]
    Fifo,
    Lifo,
    /// Nodes earlier in reverse post-order are processed first. For acyclic
    /// graphs this visits each node after all of its predecessors.
    ReversePostOrder,
}

/// A set of pending nodes. A node that is already queued is not added
/// again, so the length of the worklist never exceeds the node count.
pub struct Worklist {
    queued: FixedBitSet,
    queue: VecDeque<usize>,
    ordered: PriorityQueue<usize, Reverse<usize>>,
    order: WorklistOrder,
    rpo_order: Vec<usize>,
}

impl Worklist {
    pub fn new<Cfg: ControlFlowGraph>(
        cfg: &Cfg,
        order: WorklistOrder,
        direction: Direction,
    ) -> Self {
        let rpo_order = match order {
            WorklistOrder::ReversePostOrder => reverse_post_order(cfg, direction),
            _ => Vec::new(),
        };
        Self {
            queued: FixedBitSet::with_capacity(cfg.node_count()),
            queue: VecDeque::new(),
            ordered: PriorityQueue::new(),
            order,
            rpo_order,
        }
    }

    /// Returns false when the node was already pending.
    pub fn push(&mut self, node: usize) -> bool {
        if self.queued.put(node) {
            return false;
        }
        match self.order {
            WorklistOrder::Fifo | WorklistOrder::Lifo => self.queue.push_back(node),
            WorklistOrder::ReversePostOrder => {
                self.ordered.push(node, Reverse(self.rpo_order[node]));
            }
        }
        true
    }

    pub fn pop(&mut self) -> Option<usize> {
        let node = match self.order {
            WorklistOrder::Fifo => self.queue.pop_front(),
            WorklistOrder::Lifo => self.queue.pop_back(),
            WorklistOrder::ReversePostOrder => self.ordered.pop().map(|(node, _)| node),
        }?;
        self.queued.set(node, false);
        Some(node)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.ordered.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len() + self.ordered.len()
    }

    /// The rank of a node in reverse post-order. Only meaningful for
    /// [`WorklistOrder::ReversePostOrder`].
    pub fn get_rpo_order(&self, node: usize) -> usize {
        self.rpo_order[node]
    }
}
