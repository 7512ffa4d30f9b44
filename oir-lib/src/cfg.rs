use analysis::cfg::{ControlFlowGraph, FlowEdge};

use crate::ir::{MethodId, Program, Stmt};

/// Why control flows along an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Entry,
    FallThrough,
    Goto,
    IfTrue,
    IfFalse,
    SwitchCase(i32),
    SwitchDefault,
    Return,
}

/// The statement-level control flow graph of a method. Node 0 is a
/// synthetic entry, node `i + 1` is statement `i`, and the last node is a
/// synthetic exit.
#[derive(Clone, Debug)]
pub struct Cfg {
    method: MethodId,
    in_edges: Vec<Vec<FlowEdge<EdgeKind>>>,
    out_edges: Vec<Vec<FlowEdge<EdgeKind>>>,
}

impl Cfg {
    pub fn new(program: &Program, method: MethodId) -> Self {
        let stmts = &program.method(method).stmts;
        let node_count = stmts.len() + 2;
        let exit = node_count - 1;
        let mut cfg = Self {
            method,
            in_edges: vec![Vec::new(); node_count],
            out_edges: vec![Vec::new(); node_count],
        };

        cfg.add_edge(0, 1, EdgeKind::Entry);
        for (index, stmt) in stmts.iter().enumerate() {
            let node = index + 1;
            let next = node + 1;
            match stmt {
                Stmt::Goto { target } => cfg.add_edge(node, target + 1, EdgeKind::Goto),
                Stmt::If { target, .. } => {
                    cfg.add_edge(node, target + 1, EdgeKind::IfTrue);
                    cfg.add_edge(node, next, EdgeKind::IfFalse);
                }
                Stmt::Switch { cases, default, .. } => {
                    for &(value, target) in cases {
                        cfg.add_edge(node, target + 1, EdgeKind::SwitchCase(value));
                    }
                    cfg.add_edge(node, default + 1, EdgeKind::SwitchDefault);
                }
                Stmt::Return(_) => cfg.add_edge(node, exit, EdgeKind::Return),
                _ => cfg.add_edge(node, next, EdgeKind::FallThrough),
            }
        }
        cfg
    }

    fn add_edge(&mut self, source: usize, target: usize, kind: EdgeKind) {
        let edge = FlowEdge {
            source,
            target,
            kind,
        };
        self.out_edges[source].push(edge);
        self.in_edges[target].push(edge);
    }

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn entry(&self) -> usize {
        0
    }

    pub fn exit(&self) -> usize {
        self.in_edges.len() - 1
    }

    pub fn node_of(&self, stmt_index: usize) -> usize {
        stmt_index + 1
    }

    /// The statement index of a node, `None` for the entry and the exit.
    pub fn stmt_of(&self, node: usize) -> Option<usize> {
        (node != self.entry() && node != self.exit()).then(|| node - 1)
    }

    pub fn to_dot(&self, program: &Program) -> String {
        let method = program.method(self.method);
        let name = format!("\"{}\"", program.method_signature(self.method));
        analysis::cfg::print(Some(&name), self, |node| match self.stmt_of(node) {
            Some(index) => format!("{index}: {}", program.stmt_to_string(&method.stmts[index])),
            None if node == self.entry() => "Entry".to_owned(),
            None => "Exit".to_owned(),
        })
    }
}

impl ControlFlowGraph for Cfg {
    type EdgeKind = EdgeKind;

    fn node_count(&self) -> usize {
        self.in_edges.len()
    }

    fn in_edges(&self, node: usize) -> &[FlowEdge<EdgeKind>] {
        &self.in_edges[node]
    }

    fn out_edges(&self, node: usize) -> &[FlowEdge<EdgeKind>] {
        &self.out_edges[node]
    }

    fn is_entry(&self, node: usize) -> bool {
        node == 0
    }

    fn is_exit(&self, node: usize) -> bool {
        node == self.exit()
    }
}
