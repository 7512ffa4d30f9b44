use std::collections::HashMap;

use analysis::cfg::{ControlFlowGraph, FlowEdge};

use crate::{
    callgraph::CallGraph,
    cfg::{Cfg, EdgeKind},
    ir::{MethodId, Program, StmtRef},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IcfgEdgeKind {
    /// An edge of a method's own control flow graph.
    Normal(EdgeKind),
    /// From a call site to its return site, bypassing the callee.
    CallToReturn,
    /// From a call site to the entry of a callee.
    Call { call_site: StmtRef, callee: MethodId },
    /// From the exit of a callee to a return site of the call.
    Return { call_site: StmtRef, callee: MethodId },
}

#[derive(Clone, Debug)]
struct MethodNodes {
    base: usize,
    cfg: Cfg,
}

/// The inter-procedural control flow graph of the methods reachable in a
/// call graph. The node ranges of the methods are laid out one after the
/// other. Only the entry and exit nodes of the entry method are boundary
/// nodes, the ones of the other methods are reached through call and
/// return edges.
#[derive(Clone, Debug)]
pub struct Icfg {
    entry_method: MethodId,
    methods: HashMap<MethodId, MethodNodes>,
    method_order: Vec<MethodId>,
    /// The method and the local node of every node.
    locations: Vec<(MethodId, usize)>,
    in_edges: Vec<Vec<FlowEdge<IcfgEdgeKind>>>,
    out_edges: Vec<Vec<FlowEdge<IcfgEdgeKind>>>,
}

impl Icfg {
    /// # Panics
    ///
    /// When `entry` is not reachable in `call_graph`.
    pub fn new(
        program: &Program,
        call_graph: &CallGraph<StmtRef, MethodId>,
        entry: MethodId,
    ) -> Self {
        assert!(
            call_graph.contains_method(entry),
            "Entry method {entry:?} is not in the call graph."
        );
        let mut icfg = Self {
            entry_method: entry,
            methods: HashMap::new(),
            method_order: Vec::new(),
            locations: Vec::new(),
            in_edges: Vec::new(),
            out_edges: Vec::new(),
        };
        for &method in call_graph.reachable_methods() {
            let cfg = Cfg::new(program, method);
            let base = icfg.locations.len();
            icfg.locations
                .extend((0..cfg.node_count()).map(|local| (method, local)));
            icfg.methods.insert(method, MethodNodes { base, cfg });
            icfg.method_order.push(method);
        }
        icfg.in_edges = vec![Vec::new(); icfg.locations.len()];
        icfg.out_edges = vec![Vec::new(); icfg.locations.len()];

        let mut edges = Vec::new();
        for method in &icfg.method_order {
            let nodes = &icfg.methods[method];
            let stmts = &program.method(*method).stmts;
            for local in 0..nodes.cfg.node_count() {
                let call_site = nodes
                    .cfg
                    .stmt_of(local)
                    .filter(|&index| stmts[index].as_invoke().is_some())
                    .map(|index| StmtRef {
                        method: *method,
                        index,
                    });
                let return_sites: Vec<usize> =
                    nodes.cfg.successors(local).map(|n| nodes.base + n).collect();
                for edge in nodes.cfg.out_edges(local) {
                    let kind = match call_site {
                        Some(_) => IcfgEdgeKind::CallToReturn,
                        None => IcfgEdgeKind::Normal(edge.kind),
                    };
                    edges.push((nodes.base + edge.source, nodes.base + edge.target, kind));
                }
                let Some(call_site) = call_site else {
                    continue;
                };
                for &callee in call_graph.callees_of(call_site) {
                    let callee_nodes = &icfg.methods[&callee];
                    edges.push((
                        nodes.base + local,
                        callee_nodes.base + callee_nodes.cfg.entry(),
                        IcfgEdgeKind::Call { call_site, callee },
                    ));
                    for &return_site in &return_sites {
                        edges.push((
                            callee_nodes.base + callee_nodes.cfg.exit(),
                            return_site,
                            IcfgEdgeKind::Return { call_site, callee },
                        ));
                    }
                }
            }
        }
        for (source, target, kind) in edges {
            let edge = FlowEdge {
                source,
                target,
                kind,
            };
            icfg.out_edges[source].push(edge);
            icfg.in_edges[target].push(edge);
        }
        icfg
    }

    pub fn entry_method(&self) -> MethodId {
        self.entry_method
    }

    /// The methods in the order of their node ranges.
    pub fn methods(&self) -> &[MethodId] {
        &self.method_order
    }

    pub fn contains_method(&self, method: MethodId) -> bool {
        self.methods.contains_key(&method)
    }

    pub fn cfg(&self, method: MethodId) -> Option<&Cfg> {
        self.methods.get(&method).map(|nodes| &nodes.cfg)
    }

    pub fn node_of(&self, stmt: StmtRef) -> Option<usize> {
        let nodes = self.methods.get(&stmt.method)?;
        (stmt.index < nodes.cfg.node_count() - 2)
            .then(|| nodes.base + nodes.cfg.node_of(stmt.index))
    }

    pub fn method_entry(&self, method: MethodId) -> Option<usize> {
        self.methods
            .get(&method)
            .map(|nodes| nodes.base + nodes.cfg.entry())
    }

    pub fn method_exit(&self, method: MethodId) -> Option<usize> {
        self.methods
            .get(&method)
            .map(|nodes| nodes.base + nodes.cfg.exit())
    }

    pub fn method_of(&self, node: usize) -> MethodId {
        self.locations[node].0
    }

    /// The statement of a node, `None` for the entry and exit nodes.
    pub fn stmt_of(&self, node: usize) -> Option<StmtRef> {
        let (method, local) = self.locations[node];
        self.methods[&method]
            .cfg
            .stmt_of(local)
            .map(|index| StmtRef { method, index })
    }

    pub fn to_dot(&self, program: &Program) -> String {
        analysis::cfg::print(Some("ICFG"), self, |node| {
            let method = self.method_of(node);
            match self.stmt_of(node) {
                Some(stmt) => program.describe_stmt(stmt),
                None if Some(node) == self.method_entry(method) => {
                    format!("Entry {}", program.method_signature(method))
                }
                None => format!("Exit {}", program.method_signature(method)),
            }
        })
    }
}

impl ControlFlowGraph for Icfg {
    type EdgeKind = IcfgEdgeKind;

    fn node_count(&self) -> usize {
        self.locations.len()
    }

    fn in_edges(&self, node: usize) -> &[FlowEdge<IcfgEdgeKind>] {
        &self.in_edges[node]
    }

    fn out_edges(&self, node: usize) -> &[FlowEdge<IcfgEdgeKind>] {
        &self.out_edges[node]
    }

    fn is_entry(&self, node: usize) -> bool {
        Some(node) == self.method_entry(self.entry_method)
    }

    fn is_exit(&self, node: usize) -> bool {
        Some(node) == self.method_exit(self.entry_method)
    }
}
