use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;

use crate::{
    callgraph::{CallEdge, CallGraph},
    heap::{Heap, ObjId},
    ir::{FieldId, MethodId, Program, StmtRef, VarId},
    pta::{
        ci::Pointer,
        context::{ContextArena, ContextId, CsCallSite, CsMethod, CsObj},
        cs::{CsObjId, CsPointer},
    },
};

static NO_OBJS: BTreeSet<ObjId> = BTreeSet::new();
static NO_CS_OBJS: BTreeSet<CsObjId> = BTreeSet::new();

/// The outcome of a context-insensitive pointer analysis, or of a
/// context-sensitive one with the contexts projected away.
#[derive(Clone, Debug)]
pub struct PointerAnalysisResult {
    heap: Heap,
    call_graph: CallGraph<StmtRef, MethodId>,
    points_to: HashMap<Pointer, BTreeSet<ObjId>>,
}

impl PointerAnalysisResult {
    pub(crate) fn new(
        heap: Heap,
        call_graph: CallGraph<StmtRef, MethodId>,
        points_to: HashMap<Pointer, BTreeSet<ObjId>>,
    ) -> Self {
        Self {
            heap,
            call_graph,
            points_to,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn call_graph(&self) -> &CallGraph<StmtRef, MethodId> {
        &self.call_graph
    }

    pub fn pointer_points_to(&self, pointer: Pointer) -> &BTreeSet<ObjId> {
        self.points_to.get(&pointer).unwrap_or(&NO_OBJS)
    }

    /// Empty for variables of unreachable methods.
    pub fn points_to(&self, var: VarId) -> &BTreeSet<ObjId> {
        self.pointer_points_to(Pointer::Var(var))
    }

    pub fn static_field_points_to(&self, field: FieldId) -> &BTreeSet<ObjId> {
        self.pointer_points_to(Pointer::StaticField(field))
    }

    pub fn instance_field_points_to(&self, obj: ObjId, field: FieldId) -> &BTreeSet<ObjId> {
        self.pointer_points_to(Pointer::InstanceField(obj, field))
    }

    pub fn array_index_points_to(&self, obj: ObjId) -> &BTreeSet<ObjId> {
        self.pointer_points_to(Pointer::ArrayIndex(obj))
    }

    /// Whether two variables may refer to the same object.
    pub fn may_alias(&self, a: VarId, b: VarId) -> bool {
        let (a, b) = (self.points_to(a), self.points_to(b));
        !a.is_disjoint(b)
    }

    /// One line per variable with a non-empty points-to set, in variable
    /// order: `<A: void main()>/a -> [NewObj{...}]`.
    pub fn describe(&self, program: &Program) -> String {
        self.points_to
            .iter()
            .filter_map(|(pointer, objs)| match pointer {
                Pointer::Var(var) if !objs.is_empty() => Some((*var, objs)),
                _ => None,
            })
            .sorted_by_key(|(var, _)| *var)
            .map(|(var, objs)| {
                let method = program.var(var).method;
                format!(
                    "{}/{} -> [{}]\n",
                    program.method_signature(method),
                    program.var_name(var),
                    objs.iter()
                        .map(|obj| self.heap.describe(program, *obj))
                        .join(", ")
                )
            })
            .collect()
    }
}

/// The outcome of a context-sensitive pointer analysis.
#[derive(Clone, Debug)]
pub struct CsPointerAnalysisResult {
    heap: Heap,
    contexts: ContextArena,
    cs_objs: Vec<CsObj>,
    call_graph: CallGraph<CsCallSite, CsMethod>,
    points_to: HashMap<CsPointer, BTreeSet<CsObjId>>,
}

impl CsPointerAnalysisResult {
    pub(crate) fn new(
        heap: Heap,
        contexts: ContextArena,
        cs_objs: Vec<CsObj>,
        call_graph: CallGraph<CsCallSite, CsMethod>,
        points_to: HashMap<CsPointer, BTreeSet<CsObjId>>,
    ) -> Self {
        Self {
            heap,
            contexts,
            cs_objs,
            call_graph,
            points_to,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn contexts(&self) -> &ContextArena {
        &self.contexts
    }

    pub fn call_graph(&self) -> &CallGraph<CsCallSite, CsMethod> {
        &self.call_graph
    }

    pub fn cs_obj(&self, id: CsObjId) -> CsObj {
        self.cs_objs[id.0]
    }

    pub fn pointer_points_to(&self, pointer: CsPointer) -> &BTreeSet<CsObjId> {
        self.points_to.get(&pointer).unwrap_or(&NO_CS_OBJS)
    }

    pub fn points_to(&self, context: ContextId, var: VarId) -> &BTreeSet<CsObjId> {
        self.pointer_points_to(CsPointer::Var(context, var))
    }

    /// The contexts `var` was analyzed under, in id order.
    pub fn contexts_of(&self, var: VarId) -> Vec<ContextId> {
        self.points_to
            .keys()
            .filter_map(|pointer| match pointer {
                CsPointer::Var(context, v) if *v == var => Some(*context),
                _ => None,
            })
            .sorted()
            .collect()
    }

    /// The heap objects `var` may point to under `context`, without their
    /// heap contexts.
    pub fn objects_of(&self, context: ContextId, var: VarId) -> BTreeSet<ObjId> {
        self.points_to(context, var)
            .iter()
            .map(|obj| self.cs_obj(*obj).obj)
            .collect()
    }

    /// Forget the contexts: every set becomes the union over the contexts
    /// of its pointer.
    pub fn to_context_insensitive(&self) -> PointerAnalysisResult {
        let mut points_to: HashMap<Pointer, BTreeSet<ObjId>> = HashMap::new();
        for (pointer, objs) in &self.points_to {
            let pointer = match *pointer {
                CsPointer::Var(_, var) => Pointer::Var(var),
                CsPointer::StaticField(field) => Pointer::StaticField(field),
                CsPointer::InstanceField(obj, field) => {
                    Pointer::InstanceField(self.cs_obj(obj).obj, field)
                }
                CsPointer::ArrayIndex(obj) => Pointer::ArrayIndex(self.cs_obj(obj).obj),
            };
            points_to
                .entry(pointer)
                .or_default()
                .extend(objs.iter().map(|obj| self.cs_obj(*obj).obj));
        }

        let mut call_graph = CallGraph::new();
        for entry in self.call_graph.entry_methods() {
            call_graph.add_entry_method(entry.method);
        }
        for method in self.call_graph.reachable_methods() {
            call_graph.add_reachable_method(method.method);
        }
        for edge in self.call_graph.edges() {
            call_graph.add_edge(CallEdge {
                kind: edge.kind,
                call_site: edge.call_site.call_site,
                callee: edge.callee.method,
            });
        }
        PointerAnalysisResult::new(self.heap.clone(), call_graph, points_to)
    }

    /// Like [`PointerAnalysisResult::describe`], with one line per context.
    pub fn describe(&self, program: &Program) -> String {
        self.points_to
            .iter()
            .filter_map(|(pointer, objs)| match pointer {
                CsPointer::Var(context, var) if !objs.is_empty() => Some(((*var, *context), objs)),
                _ => None,
            })
            .sorted_by_key(|(key, _)| *key)
            .map(|((var, context), objs)| {
                let method = program.var(var).method;
                let objs = objs
                    .iter()
                    .map(|obj| {
                        let cs_obj = self.cs_obj(*obj);
                        format!(
                            "{}:{}",
                            self.contexts.describe(program, &self.heap, cs_obj.context),
                            self.heap.describe(program, cs_obj.obj)
                        )
                    })
                    .join(", ");
                format!(
                    "{}:{}/{} -> [{}]\n",
                    self.contexts.describe(program, &self.heap, context),
                    program.method_signature(method),
                    program.var_name(var),
                    objs
                )
            })
            .collect()
    }
}
