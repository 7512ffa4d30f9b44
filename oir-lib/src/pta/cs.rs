use std::collections::HashMap;

use tracing::info;

use crate::{
    callgraph::{CallEdge, CallGraph},
    heap::{Heap, ObjId},
    ir::{CallKind, Exp, FieldId, MethodId, Program, Stmt, StmtRef, Type, VarId},
    pta::{
        CallEvent, Plugin, PtaHost, PtaOptions, WorkItem, WorkList,
        context::{
            ContextArena, ContextId, ContextSelector, CsCallSite, CsMethod, CsObj, SelectorEnv,
        },
        pfg::{PointerFlowGraph, PointerId},
        points_to::{Idx, PointsToSet},
        result::CsPointerAnalysisResult,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CsObjId(pub usize);

impl Idx for CsObjId {
    fn new(index: usize) -> Self {
        Self(index)
    }

    fn index(self) -> usize {
        self.0
    }
}

/// A node of the context-sensitive pointer flow graph. Static fields are
/// shared by every context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CsPointer {
    Var(ContextId, VarId),
    StaticField(FieldId),
    InstanceField(CsObjId, FieldId),
    ArrayIndex(CsObjId),
}

pub struct SolverState<'p> {
    program: &'p Program,
    heap: Heap,
    contexts: ContextArena,
    cs_objs: Vec<CsObj>,
    cs_obj_index: HashMap<CsObj, CsObjId>,
    pfg: PointerFlowGraph<CsPointer, CsObjId>,
    work_list: WorkList<CsObjId, CallEdge<CsCallSite, CsMethod>>,
    call_graph: CallGraph<CsCallSite, CsMethod>,
}

impl SolverState<'_> {
    pub fn cs_obj_id(&mut self, context: ContextId, obj: ObjId) -> CsObjId {
        let cs_obj = CsObj { context, obj };
        if let Some(&id) = self.cs_obj_index.get(&cs_obj) {
            return id;
        }
        let id = CsObjId(self.cs_objs.len());
        self.cs_objs.push(cs_obj);
        self.cs_obj_index.insert(cs_obj, id);
        id
    }

    pub fn cs_obj(&self, id: CsObjId) -> CsObj {
        self.cs_objs[id.0]
    }

    pub fn contexts(&self) -> &ContextArena {
        &self.contexts
    }

    fn pointer(&mut self, pointer: CsPointer) -> PointerId {
        self.pfg.get_or_create(pointer)
    }

    fn add_pfg_edge(&mut self, source: CsPointer, target: CsPointer) {
        let source = self.pointer(source);
        let target = self.pointer(target);
        if self.pfg.add_edge(source, target) {
            let pts = self.pfg.points_to(source);
            if !pts.is_empty() {
                self.work_list.push_points_to(target, pts.clone());
            }
        }
    }

    fn propagate(
        &mut self,
        pointer: PointerId,
        pts: &PointsToSet<CsObjId>,
    ) -> PointsToSet<CsObjId> {
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
    type Context = ContextId;
    type Object = CsObjId;

    fn heap(&self) -> &Heap {
        &self.heap
    }

    fn var_pointer(&mut self, context: ContextId, var: VarId) -> PointerId {
        self.pointer(CsPointer::Var(context, var))
    }

    /// Taint objects are created in the empty heap context.
    fn taint_object(&mut self, source: StmtRef, ty: Type) -> CsObjId {
        let obj = self.heap.taint_obj(source, ty);
        self.cs_obj_id(ContextId::EMPTY, obj)
    }

    fn base_object(&self, obj: CsObjId) -> ObjId {
        self.cs_obj(obj).obj
    }

    fn add_points_to(&mut self, pointer: PointerId, pts: PointsToSet<CsObjId>) {
        self.work_list.push_points_to(pointer, pts);
    }

    fn points_to(&self, pointer: PointerId) -> &PointsToSet<CsObjId> {
        self.pfg.points_to(pointer)
    }
}

/// The pointer analysis over (context, entity) pairs. The selector decides
/// which contexts exist, the solver never merges facts of different
/// contexts.
pub struct Solver<'p, P = ()> {
    state: SolverState<'p>,
    selector: Box<dyn ContextSelector>,
    plugin: P,
}

impl<'p> Solver<'p> {
    pub fn new(program: &'p Program, options: &PtaOptions) -> Self {
        Self::with_plugin(program, options, ())
    }
}

impl<'p, P: Plugin<SolverState<'p>>> Solver<'p, P> {
    /// Use the selector named in `options`.
    pub fn with_plugin(program: &'p Program, options: &PtaOptions, plugin: P) -> Self {
        Self::with_selector(program, options, options.cs.build(), plugin)
    }

    pub fn with_selector(
        program: &'p Program,
        options: &PtaOptions,
        selector: Box<dyn ContextSelector>,
        plugin: P,
    ) -> Self {
        Self {
            state: SolverState {
                program,
                heap: Heap::new(options.heap),
                contexts: ContextArena::new(),
                cs_objs: Vec::new(),
                cs_obj_index: HashMap::new(),
                pfg: PointerFlowGraph::new(),
                work_list: WorkList::new(options.order),
                call_graph: CallGraph::new(),
            },
            selector,
            plugin,
        }
    }

    pub fn solve(mut self, entry: MethodId) -> (CsPointerAnalysisResult, P) {
        let entry = CsMethod {
            context: self.selector.empty_context(),
            method: entry,
        };
        self.add_reachable(entry);
        self.state.call_graph.add_entry_method(entry);
        self.analyze();
        self.plugin.on_finish(&self.state);
        info!(
            pointers = self.state.pfg.len(),
            contexts = self.state.contexts.len(),
            objects = self.state.cs_objs.len(),
            methods = self.state.call_graph.reachable_methods().len(),
            "Context-sensitive pointer analysis finished"
        );
        let SolverState {
            heap,
            contexts,
            cs_objs,
            pfg,
            call_graph,
            ..
        } = self.state;
        let points_to = pfg
            .pointers()
            .map(|(id, pointer)| (pointer, pfg.points_to(id).iter().collect()))
            .collect();
        let result = CsPointerAnalysisResult::new(heap, contexts, cs_objs, call_graph, points_to);
        (result, self.plugin)
    }

    fn env(&mut self) -> (&dyn ContextSelector, SelectorEnv<'_>) {
        (
            self.selector.as_ref(),
            SelectorEnv {
                program: self.state.program,
                heap: &self.state.heap,
                contexts: &mut self.state.contexts,
            },
        )
    }

    fn add_reachable(&mut self, cs_method: CsMethod) {
        if !self.state.call_graph.add_reachable_method(cs_method) {
            return;
        }
        let program = self.state.program;
        let context = cs_method.context;
        let method = cs_method.method;
        for (index, stmt) in program.method(method).stmts.iter().enumerate() {
            let site = StmtRef { method, index };
            match stmt {
                Stmt::New { lhs, .. } => {
                    let obj = self.state.heap.obj_for_alloc(program, site);
                    let (selector, mut env) = self.env();
                    let heap_context = selector.select_heap_context(&mut env, cs_method, obj);
                    let cs_obj = self.state.cs_obj_id(heap_context, obj);
                    let pointer = self.state.pointer(CsPointer::Var(context, *lhs));
                    self.state
                        .work_list
                        .push_points_to(pointer, PointsToSet::singleton(cs_obj));
                }
                Stmt::Assign {
                    lhs,
                    rhs: Exp::Var(rhs) | Exp::Cast(_, rhs),
                } => self
                    .state
                    .add_pfg_edge(CsPointer::Var(context, *rhs), CsPointer::Var(context, *lhs)),
                Stmt::LoadField {
                    lhs,
                    base: None,
                    field,
                } => self
                    .state
                    .add_pfg_edge(CsPointer::StaticField(*field), CsPointer::Var(context, *lhs)),
                Stmt::StoreField {
                    base: None,
                    field,
                    rhs,
                } => self
                    .state
                    .add_pfg_edge(CsPointer::Var(context, *rhs), CsPointer::StaticField(*field)),
                Stmt::Invoke(invoke) if invoke.kind == CallKind::Static => {
                    let Some(callee) = program.hierarchy().resolve_callee(program, None, invoke)
                    else {
                        continue;
                    };
                    let call_site = CsCallSite {
                        context,
                        call_site: site,
                    };
                    let (selector, mut env) = self.env();
                    let callee_context = selector.select_context(&mut env, call_site, None, callee);
                    self.state.work_list.push_call_edge(CallEdge {
                        kind: invoke.kind,
                        call_site,
                        callee: CsMethod {
                            context: callee_context,
                            method: callee,
                        },
                    });
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
                    if let CsPointer::Var(context, var) = self.state.pfg.pointer(pointer) {
                        for obj in delta.iter() {
                            self.process_instance_accesses(context, var, obj);
                            self.process_call(context, var, obj);
                        }
                    }
                }
                WorkItem::CallEdge(edge) => self.process_call_edge(edge),
            }
        }
    }

    fn process_instance_accesses(&mut self, context: ContextId, var: VarId, obj: CsObjId) {
        let program = self.state.program;
        let uses = program.var_uses(var);
        for &site in &uses.load_fields {
            if let Stmt::LoadField { lhs, field, .. } = program.stmt(site) {
                self.state.add_pfg_edge(
                    CsPointer::InstanceField(obj, *field),
                    CsPointer::Var(context, *lhs),
                );
            }
        }
        for &site in &uses.store_fields {
            if let Stmt::StoreField { field, rhs, .. } = program.stmt(site) {
                self.state.add_pfg_edge(
                    CsPointer::Var(context, *rhs),
                    CsPointer::InstanceField(obj, *field),
                );
            }
        }
        for &site in &uses.load_arrays {
            if let Stmt::LoadArray { lhs, .. } = program.stmt(site) {
                self.state
                    .add_pfg_edge(CsPointer::ArrayIndex(obj), CsPointer::Var(context, *lhs));
            }
        }
        for &site in &uses.store_arrays {
            if let Stmt::StoreArray { rhs, .. } = program.stmt(site) {
                self.state
                    .add_pfg_edge(CsPointer::Var(context, *rhs), CsPointer::ArrayIndex(obj));
            }
        }
    }

    fn process_call(&mut self, context: ContextId, var: VarId, recv: CsObjId) {
        let program = self.state.program;
        let recv_obj = self.state.cs_obj(recv);
        let recv_type = self.state.heap.obj(recv_obj.obj).ty.clone();
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
            let call_site = CsCallSite {
                context,
                call_site: site,
            };
            let (selector, mut env) = self.env();
            let callee_context =
                selector.select_context(&mut env, call_site, Some(recv_obj), callee);
            if let Some(this) = program.method(callee).this {
                let pointer = self.state.pointer(CsPointer::Var(callee_context, this));
                self.state
                    .work_list
                    .push_points_to(pointer, PointsToSet::singleton(recv));
            }
            self.state.work_list.push_call_edge(CallEdge {
                kind: invoke.kind,
                call_site,
                callee: CsMethod {
                    context: callee_context,
                    method: callee,
                },
            });
        }
    }

    fn process_call_edge(&mut self, edge: CallEdge<CsCallSite, CsMethod>) {
        if !self.state.call_graph.add_edge(edge) {
            return;
        }
        self.add_reachable(edge.callee);
        let program = self.state.program;
        let Some(invoke) = program.stmt(edge.call_site.call_site).as_invoke() else {
            return;
        };
        let caller_context = edge.call_site.context;
        let callee_context = edge.callee.context;
        let callee = program.method(edge.callee.method);
        for (arg, param) in invoke.args.iter().zip(&callee.params) {
            self.state.add_pfg_edge(
                CsPointer::Var(caller_context, *arg),
                CsPointer::Var(callee_context, *param),
            );
        }
        if let Some(result) = invoke.result {
            for ret in &callee.return_vars {
                self.state.add_pfg_edge(
                    CsPointer::Var(callee_context, *ret),
                    CsPointer::Var(caller_context, result),
                );
            }
        }
        self.plugin.on_new_call_edge(
            &mut self.state,
            &CallEvent {
                call_site: edge.call_site.call_site,
                caller_context,
                callee: edge.callee.method,
                callee_context,
            },
        );
    }
}
