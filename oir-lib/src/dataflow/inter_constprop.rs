use std::collections::HashMap;

use analysis::{
    cfg::{ControlFlowGraph, Direction, FlowEdge},
    domains::{ConstValue, JoinSemiLattice},
    solvers::{DataflowAnalysis, DataflowResult, WorklistSolver},
};
use tracing::debug;

use crate::{
    dataflow::constprop::{CpFact, transfer_stmt},
    icfg::{Icfg, IcfgEdgeKind},
    ir::{FieldId, MethodId, Program, Stmt, StmtRef, VarId},
    pta::PointerAnalysisResult,
};

/// Constant propagation over the ICFG. Values stored into fields and array
/// elements are read back by the loads that may alias the store.
pub struct InterConstantPropagation<'p> {
    program: &'p Program,
    /// The value and the index last observed at each store node.
    stored: HashMap<usize, (ConstValue, ConstValue)>,
    store_to_loads: HashMap<usize, Vec<usize>>,
    load_to_stores: HashMap<usize, Vec<usize>>,
}

/// A heap access of the ICFG relevant to aliasing.
enum Access {
    FieldLoad(Option<VarId>, FieldId),
    FieldStore(Option<VarId>, FieldId),
    ArrayLoad(VarId),
    ArrayStore(VarId),
}

impl<'p> InterConstantPropagation<'p> {
    pub fn new(program: &'p Program, icfg: &Icfg, pta: &PointerAnalysisResult) -> Self {
        let mut loads = Vec::new();
        let mut stores = Vec::new();
        for node in 0..icfg.node_count() {
            let Some(stmt) = icfg.stmt_of(node) else {
                continue;
            };
            let access = match program.stmt(stmt) {
                Stmt::LoadField { lhs, base, field } if program.var(*lhs).ty.can_hold_int() => {
                    Access::FieldLoad(*base, *field)
                }
                Stmt::StoreField { base, field, rhs } if program.var(*rhs).ty.can_hold_int() => {
                    Access::FieldStore(*base, *field)
                }
                Stmt::LoadArray { lhs, base, .. } if program.var(*lhs).ty.can_hold_int() => {
                    Access::ArrayLoad(*base)
                }
                Stmt::StoreArray { base, rhs, .. } if program.var(*rhs).ty.can_hold_int() => {
                    Access::ArrayStore(*base)
                }
                _ => continue,
            };
            match access {
                Access::FieldLoad(..) | Access::ArrayLoad(_) => loads.push((node, access)),
                Access::FieldStore(..) | Access::ArrayStore(_) => stores.push((node, access)),
            }
        }

        let mut store_to_loads: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut load_to_stores: HashMap<usize, Vec<usize>> = HashMap::new();
        for (load, load_access) in &loads {
            for (store, store_access) in &stores {
                let aliased = match (load_access, store_access) {
                    (Access::FieldLoad(None, f), Access::FieldStore(None, g)) => f == g,
                    (Access::FieldLoad(Some(x), f), Access::FieldStore(Some(y), g)) => {
                        f == g && pta.may_alias(*x, *y)
                    }
                    (Access::ArrayLoad(x), Access::ArrayStore(y)) => pta.may_alias(*x, *y),
                    _ => false,
                };
                if aliased {
                    store_to_loads.entry(*store).or_default().push(*load);
                    load_to_stores.entry(*load).or_default().push(*store);
                }
            }
        }
        debug!(
            loads = loads.len(),
            stores = stores.len(),
            "Alias relations of heap accesses computed"
        );
        Self {
            program,
            stored: HashMap::new(),
            store_to_loads,
            load_to_stores,
        }
    }

    /// Run the analysis from `entry` over the call graph of `pta`.
    pub fn analyze(
        program: &Program,
        entry: MethodId,
        pta: &PointerAnalysisResult,
        solver: WorklistSolver,
    ) -> InterCpResult {
        let icfg = Icfg::new(program, pta.call_graph(), entry);
        let mut analysis = InterConstantPropagation::new(program, &icfg, pta);
        let result = solver.solve(&icfg, &mut analysis);
        InterCpResult { icfg, result }
    }

    fn value(&self, fact: &CpFact, var: VarId) -> ConstValue {
        if self.program.var(var).ty.can_hold_int() {
            fact.get_or_bottom(&var, &())
        } else {
            ConstValue::Nac
        }
    }

    /// The meet of the values of the stores `load` may read from.
    fn loaded_value(&self, load: usize, index: Option<ConstValue>) -> ConstValue {
        let mut value = ConstValue::Undef;
        for store in self.load_to_stores.get(&load).into_iter().flatten() {
            let Some((stored, stored_index)) = self.stored.get(store) else {
                continue;
            };
            if index.is_none_or(|index| may_alias_index(index, *stored_index)) {
                value.join_assign(stored, &());
            }
        }
        value
    }
}

/// Two array indices may be equal when both are defined and either one is
/// unknown or both are the same constant.
fn may_alias_index(a: ConstValue, b: ConstValue) -> bool {
    match (a, b) {
        (ConstValue::Undef, _) | (_, ConstValue::Undef) => false,
        (ConstValue::Constant(a), ConstValue::Constant(b)) => a == b,
        _ => true,
    }
}

impl DataflowAnalysis<Icfg> for InterConstantPropagation<'_> {
    type Fact = CpFact;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn lattice_context(&self) -> &() {
        &()
    }

    fn boundary_fact(&self, icfg: &Icfg, _node: usize) -> CpFact {
        let mut fact = CpFact::default();
        for &param in &self.program.method(icfg.entry_method()).params {
            if self.program.var(param).ty.can_hold_int() {
                fact.update(param, ConstValue::Nac, &());
            }
        }
        fact
    }

    fn transfer_node(&mut self, icfg: &Icfg, node: usize, input: &CpFact) -> CpFact {
        let Some(stmt_ref) = icfg.stmt_of(node) else {
            return input.clone();
        };
        let stmt = self.program.stmt(stmt_ref);
        let mut output = input.clone();
        match stmt {
            // The result is bound by the return edges.
            Stmt::Invoke(_) => {}
            Stmt::LoadField { lhs, .. } if self.load_to_stores.contains_key(&node) => {
                output.update(*lhs, self.loaded_value(node, None), &());
            }
            Stmt::LoadArray { lhs, index, .. } if self.load_to_stores.contains_key(&node) => {
                let index = self.value(input, *index);
                output.update(*lhs, self.loaded_value(node, Some(index)), &());
            }
            Stmt::StoreField { rhs, .. } if self.store_to_loads.contains_key(&node) => {
                let value = (self.value(input, *rhs), ConstValue::Undef);
                self.stored.insert(node, value);
            }
            Stmt::StoreArray { index, rhs, .. } if self.store_to_loads.contains_key(&node) => {
                let value = (self.value(input, *rhs), self.value(input, *index));
                self.stored.insert(node, value);
            }
            _ => output = transfer_stmt(self.program, stmt, input),
        }
        output
    }

    fn transfer_edge(
        &mut self,
        icfg: &Icfg,
        edge: &FlowEdge<IcfgEdgeKind>,
        fact: &CpFact,
    ) -> CpFact {
        match edge.kind {
            IcfgEdgeKind::Normal(_) => fact.clone(),
            IcfgEdgeKind::CallToReturn => {
                let mut output = fact.clone();
                let result = icfg
                    .stmt_of(edge.source)
                    .and_then(|call| self.program.stmt(call).def())
                    .filter(|result| self.program.var(*result).ty.can_hold_int());
                if let Some(result) = result {
                    // Calls without a known callee return unknown values.
                    let has_callee = icfg
                        .out_edges(edge.source)
                        .iter()
                        .any(|e| matches!(e.kind, IcfgEdgeKind::Call { .. }));
                    let value = if has_callee {
                        ConstValue::Undef
                    } else {
                        ConstValue::Nac
                    };
                    output.update(result, value, &());
                }
                output
            }
            IcfgEdgeKind::Call { call_site, callee } => {
                let mut output = CpFact::default();
                let Some(invoke) = self.program.stmt(call_site).as_invoke() else {
                    return output;
                };
                for (arg, param) in invoke.args.iter().zip(&self.program.method(callee).params) {
                    if self.program.var(*param).ty.can_hold_int() {
                        output.update(*param, self.value(fact, *arg), &());
                    }
                }
                output
            }
            IcfgEdgeKind::Return { call_site, callee } => {
                let mut output = CpFact::default();
                let result = self
                    .program
                    .stmt(call_site)
                    .as_invoke()
                    .and_then(|invoke| invoke.result);
                let result = result.filter(|result| self.program.var(*result).ty.can_hold_int());
                if let Some(result) = result {
                    let callee = self.program.method(callee);
                    let mut value = if callee.stmts.is_empty() {
                        ConstValue::Nac
                    } else {
                        ConstValue::Undef
                    };
                    for ret in &callee.return_vars {
                        value.join_assign(&self.value(fact, *ret), &());
                    }
                    output.update(result, value, &());
                }
                output
            }
        }
    }

    /// Loads that may read what a store wrote.
    fn dependents(&self, _icfg: &Icfg, node: usize) -> Vec<usize> {
        self.store_to_loads.get(&node).cloned().unwrap_or_default()
    }
}

/// The facts of the inter-procedural constant propagation.
#[derive(Clone, Debug)]
pub struct InterCpResult {
    icfg: Icfg,
    result: DataflowResult<CpFact>,
}

impl InterCpResult {
    pub fn icfg(&self) -> &Icfg {
        &self.icfg
    }

    /// # Panics
    ///
    /// When the method of `stmt` was not reachable.
    pub fn in_fact(&self, stmt: StmtRef) -> &CpFact {
        self.result.in_fact(self.node(stmt))
    }

    /// # Panics
    ///
    /// When the method of `stmt` was not reachable.
    pub fn out_fact(&self, stmt: StmtRef) -> &CpFact {
        self.result.out_fact(self.node(stmt))
    }

    fn node(&self, stmt: StmtRef) -> usize {
        self.icfg
            .node_of(stmt)
            .unwrap_or_else(|| panic!("Statement {stmt:?} was not analyzed."))
    }

    /// Print every reachable method with the OUT fact of each statement.
    pub fn print(&self, program: &Program) -> String {
        self.icfg
            .methods()
            .iter()
            .map(|&method| {
                program.print_method(method, |index| {
                    let fact = self.out_fact(StmtRef { method, index });
                    Some(super::constprop::describe_fact(program, fact))
                })
            })
            .collect()
    }
}
