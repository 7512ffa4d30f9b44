use core::hash::Hash;
use std::collections::{HashMap, HashSet};

use crate::pta::points_to::{Idx, PointsToSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(pub usize);

impl Idx for PointerId {
    fn new(index: usize) -> Self {
        Self(index)
    }

    fn index(self) -> usize {
        self.0
    }
}

/// The pointer flow graph: an edge `s -> t` means every object `s` points
/// to flows into `t`. Pointers of kind `P` are interned on first use and
/// each one owns its points-to set over objects `O`.
#[derive(Clone, Debug)]
pub struct PointerFlowGraph<P, O> {
    pointers: Vec<P>,
    index: HashMap<P, PointerId>,
    points_to: Vec<PointsToSet<O>>,
    successors: Vec<Vec<PointerId>>,
    edges: HashSet<(PointerId, PointerId)>,
}

impl<P, O> Default for PointerFlowGraph<P, O> {
    fn default() -> Self {
        Self {
            pointers: Vec::new(),
            index: HashMap::new(),
            points_to: Vec::new(),
            successors: Vec::new(),
            edges: HashSet::new(),
        }
    }
}

impl<P: Copy + Eq + Hash, O: Idx> PointerFlowGraph<P, O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, pointer: P) -> PointerId {
        if let Some(&id) = self.index.get(&pointer) {
            return id;
        }
        let id = PointerId(self.pointers.len());
        self.pointers.push(pointer);
        self.index.insert(pointer, id);
        self.points_to.push(PointsToSet::new());
        self.successors.push(Vec::new());
        id
    }

    pub fn lookup(&self, pointer: &P) -> Option<PointerId> {
        self.index.get(pointer).copied()
    }

    pub fn pointer(&self, id: PointerId) -> P {
        self.pointers[id.0]
    }

    /// Returns true when the edge is new.
    pub fn add_edge(&mut self, source: PointerId, target: PointerId) -> bool {
        if !self.edges.insert((source, target)) {
            return false;
        }
        self.successors[source.0].push(target);
        true
    }

    pub fn successors_of(&self, id: PointerId) -> &[PointerId] {
        &self.successors[id.0]
    }

    pub fn points_to(&self, id: PointerId) -> &PointsToSet<O> {
        &self.points_to[id.0]
    }

    pub fn points_to_mut(&mut self, id: PointerId) -> &mut PointsToSet<O> {
        &mut self.points_to[id.0]
    }

    pub fn pointers(&self) -> impl Iterator<Item = (PointerId, P)> + '_ {
        self.pointers
            .iter()
            .enumerate()
            .map(|(index, &pointer)| (PointerId(index), pointer))
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
