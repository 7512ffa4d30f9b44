//! Pointer analysis. Both solvers build a pointer flow graph on the fly
//! and discover the call graph while they propagate points-to sets:
//! a call on a receiver variable is resolved whenever the variable points
//! to a new object. The context-insensitive solver lives in [`ci`], the
//! context-sensitive one in [`cs`] with the context selectors in
//! [`context`]. Extensions such as the taint analysis hook into either
//! solver through [`Plugin`].

use core::fmt::Debug;
use core::hash::Hash;
use std::collections::VecDeque;

use serde::Deserialize;

use crate::{
    heap::{Heap, HeapPolicy, ObjId},
    ir::{MethodId, Program, StmtRef, Type, VarId},
};

pub mod ci;
pub mod context;
pub mod cs;
pub mod pfg;
pub mod points_to;
pub mod result;
pub mod taint;

#[cfg(test)]
mod ci_tests;



#[cfg(test)]
mod points_to_tests;


pub use context::SelectorKind;
pub use pfg::{PointerFlowGraph, PointerId};
pub use points_to::{Idx, PointsToSet};
pub use result::{CsPointerAnalysisResult, PointerAnalysisResult};

/// The order in which the pointer analysis worklist is drained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueOrder {
    #[default]
    Fifo,
    Lifo,
}

/// Settings of a pointer analysis run, usually read from the `pta` section
/// of a YAML file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PtaOptions {
    pub cs: SelectorKind,
    pub heap: HeapPolicy,
    pub order: QueueOrder,
}

impl PtaOptions {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

pub enum WorkItem<O, E> {
    /// Objects that flow into a pointer.
    PointsTo(PointerId, PointsToSet<O>),
    /// A call edge that has yet to be connected.
    CallEdge(E),
}

pub struct WorkList<O, E> {
    order: QueueOrder,
    items: VecDeque<WorkItem<O, E>>,
}

impl<O, E> WorkList<O, E> {
    pub fn new(order: QueueOrder) -> Self {
        Self {
            order,
            items: VecDeque::new(),
        }
    }

    pub fn push_points_to(&mut self, pointer: PointerId, pts: PointsToSet<O>) {
        self.items.push_back(WorkItem::PointsTo(pointer, pts));
    }

    pub fn push_call_edge(&mut self, edge: E) {
        self.items.push_back(WorkItem::CallEdge(edge));
    }

    pub fn pop(&mut self) -> Option<WorkItem<O, E>> {
        match self.order {
            QueueOrder::Fifo => self.items.pop_front(),
            QueueOrder::Lifo => self.items.pop_back(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A call edge discovered by a solver, as seen by plugins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallEvent<C> {
    pub call_site: StmtRef,
    pub caller_context: C,
    pub callee: MethodId,
    pub callee_context: C,
}

/// The part of a solver's state plugins may touch.
pub trait PtaHost {
    type Context: Copy + Eq + Hash + Debug;
    type Object: Idx;

    fn heap(&self) -> &Heap;

    fn var_pointer(&mut self, context: Self::Context, var: VarId) -> PointerId;

    /// The object standing for tainted data of type `ty` produced by the
    /// call at `source`.
    fn taint_object(&mut self, source: StmtRef, ty: Type) -> Self::Object;

    /// The heap object an analysis object abstracts.
    fn base_object(&self, obj: Self::Object) -> ObjId;

    /// Schedule `pts` to flow into `pointer`.
    fn add_points_to(&mut self, pointer: PointerId, pts: PointsToSet<Self::Object>);

    fn points_to(&self, pointer: PointerId) -> &PointsToSet<Self::Object>;
}

/// Callbacks invoked by the solvers. Every method defaults to doing
/// nothing.
pub trait Plugin<H: PtaHost> {
    /// `delta` holds the objects that were just added to `pointer`.
    fn on_new_points_to_set(
        &mut self,
        _host: &mut H,
        _pointer: PointerId,
        _delta: &PointsToSet<H::Object>,
    ) {
    }

    fn on_new_call_edge(&mut self, _host: &mut H, _event: &CallEvent<H::Context>) {}

    fn on_finish(&mut self, _host: &H) {}
}

impl<H: PtaHost> Plugin<H> for () {}

impl<H: PtaHost, A: Plugin<H>, B: Plugin<H>> Plugin<H> for (A, B) {
    fn on_new_points_to_set(
        &mut self,
        host: &mut H,
        pointer: PointerId,
        delta: &PointsToSet<H::Object>,
    ) {
        self.0.on_new_points_to_set(host, pointer, delta);
        self.1.on_new_points_to_set(host, pointer, delta);
    }

    fn on_new_call_edge(&mut self, host: &mut H, event: &CallEvent<H::Context>) {
        self.0.on_new_call_edge(host, event);
        self.1.on_new_call_edge(host, event);
    }

    fn on_finish(&mut self, host: &H) {
        self.0.on_finish(host);
        self.1.on_finish(host);
    }
}

/// Run the context-insensitive analysis from `entry`.
pub fn solve_ci(program: &Program, entry: MethodId, options: &PtaOptions) -> PointerAnalysisResult {
    ci::Solver::new(program, options).solve(entry).0
}

/// Run the context-sensitive analysis from `entry` with the selector named
/// in `options`.
pub fn solve_cs(
    program: &Program,
    entry: MethodId,
    options: &PtaOptions,
) -> CsPointerAnalysisResult {
    cs::Solver::new(program, options).solve(entry).0
}
