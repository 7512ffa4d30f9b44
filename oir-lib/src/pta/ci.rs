use tracing::info;

use crate::{
    callgraph::{CallEdge, CallGraph},
    heap::{Heap, ObjId},
    ir::{CallKind, Exp, FieldId, MethodId, Program, Stmt, StmtRef, Type, VarId},
    pta::{
        CallEvent, Plugin, PtaHost, PtaOptions, WorkItem, WorkList,
        pfg::{PointerFlowGraph, PointerId},
        points_to::PointsToSet,
        result::PointerAnalysisResult,
    },
};

/// A node of the context-insensitive pointer flow graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pointer {
    Var(VarId),
    StaticField(FieldId),
    InstanceField(ObjId, FieldId),
    /// All elements of an array object.
    ArrayIndex(ObjId),
}

pub struct SolverState<'p> {
    program: &'p Program,
    heap: Heap,
    pfg: PointerFlowGraph<Pointer, ObjId>,
    work_list: WorkList<ObjId, CallEdge<StmtRef, MethodId>>,
    call_graph: CallGraph<StmtRef, MethodId>,
}

impl SolverState<'_> {
    fn pointer(&mut self, pointer: Pointer) -> PointerId {
        self.pfg.get_or_create(pointer)
    }

    fn add_pfg_edge(&mut self, source: Pointer, target: Pointer) {
        let source = self.pointer(source);
        let target = self.pointer(target);
        if self.pfg.add_edge(source, target) {
            let pts = self.pfg.points_to(source);
            if !pts.is_empty() {
                self.work_list.push_points_to(target, pts.clone());
            }
        }
    }

    /// Add `pts` to the set of `pointer` and forward the new objects to
    /// its successors.
    fn propagate(&mut self, pointer: PointerId, pts: &PointsToSet<ObjId>) -> PointsToSet<ObjId> {
        let delta = self.pfg.points_to_mut(pointer).add_all_diff(pts);
        if !delta.is_empty() {
            for &succ in self.pfg.successors_of(pointer) {
                self.work_list.push_points_to(succ, delta.clone());
            }
        }
        delta
    }
}

impl PtaHost for SolverState<'_> {
    type Context = ();
    type Object = ObjId;

    fn heap(&self) -> &Heap {
        &self.heap
    }

    fn var_pointer(&mut self, _context: (), var: VarId) -> PointerId {
        self.pointer(Pointer::Var(var))
    }

    fn taint_object(&mut self, source: StmtRef, ty: Type) -> ObjId {
        self.heap.taint_obj(source, ty)
    }

    fn base_object(&self, obj: ObjId) -> ObjId {
        obj
    }

    fn add_points_to(&mut self, pointer: PointerId, pts: PointsToSet<ObjId>) {
        self.work_list.push_points_to(pointer, pts);
    }

    fn points_to(&self, pointer: PointerId) -> &PointsToSet<ObjId> {
        self.pfg.points_to(pointer)
    }
}

/// Andersen-style, context-insensitive pointer analysis with on-the-fly
/// call graph construction.
pub struct Solver<'p, P = ()> {
    state: SolverState<'p>,
    plugin: P,
}

impl<'p> Solver<'p> {
    pub fn new(program: &'p Program, options: &PtaOptions) -> Self {
        Self::with_plugin(program, options, ())
    }
}

impl<'p, P: Plugin<SolverState<'p>>> Solver<'p, P> {
    pub fn with_plugin(program: &'p Program, options: &PtaOptions, plugin: P) -> Self {
        Self {
            state: SolverState {
                program,
                heap: Heap::new(options.heap),
                pfg: PointerFlowGraph::new(),
                work_list: WorkList::new(options.order),
                call_graph: CallGraph::new(),
            },
            plugin,
        }
    }

    /// Analyze everything reachable from `entry`. Returns the result
    /// together with the plugin, so callers can read what it collected.
    pub fn solve(mut self, entry: MethodId) -> (PointerAnalysisResult, P) {
        self.add_reachable(entry);
        self.state.call_graph.add_entry_method(entry);
        self.analyze();
        self.plugin.on_finish(&self.state);
        info!(
            pointers = self.state.pfg.len(),
            objects = self.state.heap.len(),
            methods = self.state.call_graph.reachable_methods().len(),
            "Context-insensitive pointer analysis finished"
        );
        let SolverState {
            heap,
            pfg,
            call_graph,
            ..
        } = self.state;
        let points_to = pfg
            .pointers()
            .map(|(id, pointer)| (pointer, pfg.points_to(id).iter().collect()))
            .collect();
        (PointerAnalysisResult::new(heap, call_graph, points_to), self.plugin)
    }

    /// Process the statements of a method that does not depend on the
    /// points-to sets of variables.
    fn add_reachable(&mut self, method: MethodId) {
        if !self.state.call_graph.add_reachable_method(method) {
            return;
        }
        let program = self.state.program;
        for (index, stmt) in program.method(method).stmts.iter().enumerate() {
            let site = StmtRef { method, index };
            match stmt {
                Stmt::New { lhs, .. } => {
                    let obj = self.state.heap.obj_for_alloc(program, site);
                    let pointer = self.state.pointer(Pointer::Var(*lhs));
                    self.state
                        .work_list
                        .push_points_to(pointer, PointsToSet::singleton(obj));
                }
                Stmt::Assign {
                    lhs,
                    rhs: Exp::Var(rhs) | Exp::Cast(_, rhs),
                } => self.state.add_pfg_edge(Pointer::Var(*rhs), Pointer::Var(*lhs)),
                Stmt::LoadField {
                    lhs,
                    base: None,
                    field,
                } => self
                    .state
                    .add_pfg_edge(Pointer::StaticField(*field), Pointer::Var(*lhs)),
                Stmt::StoreField {
                    base: None,
                    field,
                    rhs,
                } => self
                    .state
                    .add_pfg_edge(Pointer::Var(*rhs), Pointer::StaticField(*field)),
                Stmt::Invoke(invoke) if invoke.kind == CallKind::Static => {
                    if let Some(callee) =
                        program.hierarchy().resolve_callee(program, None, invoke)
                    {
                        self.state.work_list.push_call_edge(CallEdge {
                            kind: invoke.kind,
                            call_site: site,
                            callee,
                        });
                    }
                }
                Stmt::Assign { .. }
                | Stmt::LoadField { .. }
                | Stmt::StoreField { .. }
                | Stmt::LoadArray { .. }
                | Stmt::StoreArray { .. }
                | Stmt::Invoke(_)
                | Stmt::If { .. }
                | Stmt::Goto { .. }
                | Stmt::Switch { .. }
                | Stmt::Return(_)
                | Stmt::Nop => {}
            }
        }
    }

    fn analyze(&mut self) {
        while let Some(item) = self.state.work_list.pop() {
            match item {
                WorkItem::PointsTo(pointer, pts) => {
                    let delta = self.state.propagate(pointer, &pts);
                    if delta.is_empty() {
                        continue;
                    }
                    self.plugin
                        .on_new_points_to_set(&mut self.state, pointer, &delta);
                    if let Pointer::Var(var) = self.state.pfg.pointer(pointer) {
                        for obj in delta.iter() {
                            self.process_instance_accesses(var, obj);
                            self.process_call(var, obj);
                        }
                    }
                }
                WorkItem::CallEdge(edge) => self.process_call_edge(edge),
            }
        }
    }

    /// Connect the field and array accesses through `var` to the fields
    /// and elements of `obj`.
    fn process_instance_accesses(&mut self, var: VarId, obj: ObjId) {
        let program = self.state.program;
        let uses = program.var_uses(var);
        for &site in &uses.load_fields {
            if let Stmt::LoadField { lhs, field, .. } = program.stmt(site) {
                self.state
                    .add_pfg_edge(Pointer::InstanceField(obj, *field), Pointer::Var(*lhs));
            }
        }
        for &site in &uses.store_fields {
            if let Stmt::StoreField { field, rhs, .. } = program.stmt(site) {
                self.state
                    .add_pfg_edge(Pointer::Var(*rhs), Pointer::InstanceField(obj, *field));
            }
        }
        for &site in &uses.load_arrays {
            if let Stmt::LoadArray { lhs, .. } = program.stmt(site) {
                self.state
                    .add_pfg_edge(Pointer::ArrayIndex(obj), Pointer::Var(*lhs));
            }
        }
        for &site in &uses.store_arrays {
            if let Stmt::StoreArray { rhs, .. } = program.stmt(site) {
                self.state
                    .add_pfg_edge(Pointer::Var(*rhs), Pointer::ArrayIndex(obj));
            }
        }
    }

    /// Resolve the calls on receiver `var` for the new receiver object
    /// `recv`.
    fn process_call(&mut self, var: VarId, recv: ObjId) {
        let program = self.state.program;
        let recv_type = self.state.heap.obj(recv).ty.clone();
        for &site in &program.var_uses(var).invokes {
            let Some(invoke) = program.stmt(site).as_invoke() else {
                continue;
            };
            let Some(callee) = program
                .hierarchy()
                .resolve_callee(program, Some(&recv_type), invoke)
            else {
                continue;
            };
            if let Some(this) = program.method(callee).this {
                let pointer = self.state.pointer(Pointer::Var(this));
                self.state
                    .work_list
                    .push_points_to(pointer, PointsToSet::singleton(recv));
            }
            self.state.work_list.push_call_edge(CallEdge {
                kind: invoke.kind,
                call_site: site,
                callee,
            });
        }
    }

    fn process_call_edge(&mut self, edge: CallEdge<StmtRef, MethodId>) {
        if !self.state.call_graph.add_edge(edge) {
            return;
        }
        self.add_reachable(edge.callee);
        let program = self.state.program;
        let Some(invoke) = program.stmt(edge.call_site).as_invoke() else {
            return;
        };
        let callee = program.method(edge.callee);
        for (arg, param) in invoke.args.iter().zip(&callee.params) {
            self.state
                .add_pfg_edge(Pointer::Var(*arg), Pointer::Var(*param));
        }
        if let Some(result) = invoke.result {
            for ret in &callee.return_vars {
                self.state
                    .add_pfg_edge(Pointer::Var(*ret), Pointer::Var(result));
            }
        }
        self.plugin.on_new_call_edge(
            &mut self.state,
            &CallEvent {
                call_site: edge.call_site,
                caller_context: (),
                callee: edge.callee,
                callee_context: (),
            },
        );
    }
}
