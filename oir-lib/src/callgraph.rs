use core::hash::Hash;
use std::collections::{HashMap, HashSet};

use crate::ir::CallKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallEdge<CS, M> {
    pub kind: CallKind,
    pub call_site: CS,
    pub callee: M,
}

/// A call graph over call sites `CS` and methods `M`. Context-insensitive
/// graphs use plain statements and methods, context-sensitive ones pair
/// them with contexts. Reachable methods and edges are kept in insertion
/// order.
#[derive(Clone, Debug)]
pub struct CallGraph<CS, M> {
    entry_methods: Vec<M>,
    reachable: Vec<M>,
    reachable_set: HashSet<M>,
    edges: Vec<CallEdge<CS, M>>,
    edge_set: HashSet<(CS, M)>,
    callees: HashMap<CS, Vec<M>>,
    callers: HashMap<M, Vec<CS>>,
}

impl<CS, M> Default for CallGraph<CS, M> {
    fn default() -> Self {
        Self {
            entry_methods: Vec::new(),
            reachable: Vec::new(),
            reachable_set: HashSet::new(),
            edges: Vec::new(),
            edge_set: HashSet::new(),
            callees: HashMap::new(),
            callers: HashMap::new(),
        }
    }
}

impl<CS: Copy + Eq + Hash, M: Copy + Eq + Hash> CallGraph<CS, M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry methods are also reachable.
    pub fn add_entry_method(&mut self, method: M) {
        self.entry_methods.push(method);
        self.add_reachable_method(method);
    }

    /// Returns true when the method was not reachable before.
    pub fn add_reachable_method(&mut self, method: M) -> bool {
        if !self.reachable_set.insert(method) {
            return false;
        }
        self.reachable.push(method);
        true
    }

    /// Returns true when the edge is new.
    pub fn add_edge(&mut self, edge: CallEdge<CS, M>) -> bool {
        if !self.edge_set.insert((edge.call_site, edge.callee)) {
            return false;
        }
        self.callees.entry(edge.call_site).or_default().push(edge.callee);
        self.callers.entry(edge.callee).or_default().push(edge.call_site);
        self.edges.push(edge);
        true
    }

    pub fn entry_methods(&self) -> &[M] {
        &self.entry_methods
    }

    pub fn reachable_methods(&self) -> &[M] {
        &self.reachable
    }

    pub fn contains_method(&self, method: M) -> bool {
        self.reachable_set.contains(&method)
    }

    pub fn contains_edge(&self, call_site: CS, callee: M) -> bool {
        self.edge_set.contains(&(call_site, callee))
    }

    pub fn edges(&self) -> &[CallEdge<CS, M>] {
        &self.edges
    }

    pub fn callees_of(&self, call_site: CS) -> &[M] {
        self.callees.get(&call_site).map_or(&[], Vec::as_slice)
    }

    pub fn callers_of(&self, method: M) -> &[CS] {
        self.callers.get(&method).map_or(&[], Vec::as_slice)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
