use super::cfg::*;

#[derive(Debug)]
pub(crate) struct TestCfg {
    in_edges: Vec<Vec<FlowEdge<()>>>,
    out_edges: Vec<Vec<FlowEdge<()>>>,
    exit: usize,
}

impl ControlFlowGraph for TestCfg {
    type EdgeKind = ();

    fn node_count(&self) -> usize {
        self.in_edges.len()
    }

    fn in_edges(&self, node: usize) -> &[FlowEdge<()>] {
        &self.in_edges[node]
    }

    fn out_edges(&self, node: usize) -> &[FlowEdge<()>] {
        &self.out_edges[node]
    }

    fn is_entry(&self, node: usize) -> bool {
        node == 0
    }

    fn is_exit(&self, node: usize) -> bool {
        node == self.exit
    }
}

impl TestCfg {
    /// Node 0 is the entry, the last node is the exit.
    pub(crate) fn new(size: usize) -> Self {
        Self {
            in_edges: vec![Vec::new(); size],
            out_edges: vec![Vec::new(); size],
            exit: size - 1,
        }
    }

    pub(crate) fn add_edge(&mut self, source: usize, target: usize) -> &mut Self {
        let edge = FlowEdge {
            source,
            target,
            kind: (),
        };
        self.out_edges[source].push(edge);
        self.in_edges[target].push(edge);
        self
    }
}

#[test]
fn test_cfg_print() {
    //     0
    //    / \
    //   1   2
    //   |   |
    //   |   3
    //    \ /
    //     4
    let mut cfg = TestCfg::new(5);
    cfg.add_edge(0, 1)
        .add_edge(0, 2)
        .add_edge(1, 4)
        .add_edge(2, 3)
        .add_edge(3, 4);

    let printed = print(None, &cfg, |n| format!("n{n}"));
    let expected = r#"digraph CFG {
  Node_0[label="n0"]
  Node_1[label="n1"]
  Node_2[label="n2"]
  Node_3[label="n3"]
  Node_4[label="n4"]

  Node_0 -> Node_1[label="()"]
  Node_0 -> Node_2[label="()"]
  Node_1 -> Node_4[label="()"]
  Node_2 -> Node_3[label="()"]
  Node_3 -> Node_4[label="()"]
}
"#;
    assert_eq!(printed, expected);
}

#[test]
fn test_rpo_order() {
    //     0
    //    / \
    //   1   2
    //   |   |
    //   |   3
    //    \ /
    //     4
    let mut cfg = TestCfg::new(5);
    cfg.add_edge(0, 1)
        .add_edge(0, 2)
        .add_edge(1, 4)
        .add_edge(2, 3)
        .add_edge(3, 4);

    let worklist = Worklist::new(&cfg, WorklistOrder::ReversePostOrder, Direction::Forward);
    assert_eq!(worklist.get_rpo_order(0), 0);
    assert_eq!(worklist.get_rpo_order(1), 1);
    assert_eq!(worklist.get_rpo_order(2), 2);
    assert_eq!(worklist.get_rpo_order(3), 3);
    assert_eq!(worklist.get_rpo_order(4), 4);
}

#[test]
fn test_rpo_order_mirrored() {
    //     0
    //    / \
    //   2   1
    //   |   |
    //   3   |
    //    \ /
    //     4
    let mut cfg = TestCfg::new(5);
    cfg.add_edge(0, 2)
        .add_edge(0, 1)
        .add_edge(1, 4)
        .add_edge(2, 3)
        .add_edge(3, 4);

    let worklist = Worklist::new(&cfg, WorklistOrder::ReversePostOrder, Direction::Forward);
    assert_eq!(worklist.get_rpo_order(0), 0);
    assert_eq!(worklist.get_rpo_order(2), 1);
    assert_eq!(worklist.get_rpo_order(3), 2);
    assert_eq!(worklist.get_rpo_order(1), 3);
    assert_eq!(worklist.get_rpo_order(4), 4);
}

#[test]
fn test_rpo_order_with_back_edges() {
    //      0  <----
    //     / \   | |
    // -->1   2--| |
    // |  |   |    |
    // |  |   3----|
    // |   \ /
    // |----4
    let mut cfg = TestCfg::new(5);
    cfg.add_edge(0, 1)
        .add_edge(0, 2)
        .add_edge(1, 4)
        .add_edge(2, 3)
        .add_edge(2, 0)
        .add_edge(3, 4)
        .add_edge(3, 0)
        .add_edge(4, 1);

    let worklist = Worklist::new(&cfg, WorklistOrder::ReversePostOrder, Direction::Forward);
    assert_eq!(worklist.get_rpo_order(0), 0);
    assert_eq!(worklist.get_rpo_order(2), 1);
    assert_eq!(worklist.get_rpo_order(3), 2);
    assert_eq!(worklist.get_rpo_order(4), 3);
    assert_eq!(worklist.get_rpo_order(1), 4);
}

#[test]
fn test_rpo_order_backward() {
    // 0 -> 1 -> 2 -> 3
    let mut cfg = TestCfg::new(4);
    cfg.add_edge(0, 1).add_edge(1, 2).add_edge(2, 3);

    let worklist = Worklist::new(&cfg, WorklistOrder::ReversePostOrder, Direction::Backward);
    assert_eq!(worklist.get_rpo_order(3), 0);
    assert_eq!(worklist.get_rpo_order(2), 1);
    assert_eq!(worklist.get_rpo_order(1), 2);
    assert_eq!(worklist.get_rpo_order(0), 3);
}

#[test]
fn test_worklist_orders() {
    let mut cfg = TestCfg::new(4);
    cfg.add_edge(0, 1).add_edge(1, 2).add_edge(2, 3);

    let mut fifo = Worklist::new(&cfg, WorklistOrder::Fifo, Direction::Forward);
    let mut lifo = Worklist::new(&cfg, WorklistOrder::Lifo, Direction::Forward);
    let mut rpo = Worklist::new(&cfg, WorklistOrder::ReversePostOrder, Direction::Forward);
    for node in [2, 1, 2, 3] {
        fifo.push(node);
        lifo.push(node);
        rpo.push(node);
    }

    // Duplicates are dropped.
    assert_eq!(fifo.len(), 3);
    let drain = |w: &mut Worklist| core::iter::from_fn(|| w.pop()).collect::<Vec<_>>();
    assert_eq!(drain(&mut fifo), [2, 1, 3]);
    assert_eq!(drain(&mut lifo), [3, 1, 2]);
    assert_eq!(drain(&mut rpo), [1, 2, 3]);
    assert!(fifo.is_empty());

    // A popped node can be queued again.
    assert!(fifo.push(2));
    assert!(!fifo.push(2));
}
