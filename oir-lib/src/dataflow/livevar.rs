use analysis::{
    cfg::Direction,
    domains::{BitSet, BitSetTop},
    solvers::{DataflowAnalysis, WorklistSolver},
};
use itertools::Itertools;

use crate::{
    cfg::Cfg,
    dataflow::MethodFacts,
    ir::{MethodId, Program},
};

/// A variable is live at a point if some path from there reads it before
/// it is overwritten. Facts are sets of local variable indices.
pub struct LiveVariables<'p> {
    program: &'p Program,
    universe: BitSetTop,
}

impl<'p> LiveVariables<'p> {
    pub fn new(program: &'p Program, method: MethodId) -> Self {
        Self {
            program,
            universe: BitSetTop(program.method(method).vars.len()),
        }
    }

    pub fn analyze(
        program: &Program,
        method: MethodId,
        solver: WorklistSolver,
    ) -> MethodFacts<BitSet> {
        let cfg = Cfg::new(program, method);
        let result = solver.solve(&cfg, &mut LiveVariables::new(program, method));
        MethodFacts::new(cfg, result)
    }
}

impl DataflowAnalysis<Cfg> for LiveVariables<'_> {
    type Fact = BitSet;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn lattice_context(&self) -> &BitSetTop {
        &self.universe
    }

    /// Nothing is live after the method returns.
    fn boundary_fact(&self, _cfg: &Cfg, _node: usize) -> BitSet {
        BitSet::from(&self.universe, &[])
    }

    fn transfer_node(&mut self, cfg: &Cfg, node: usize, output: &BitSet) -> BitSet {
        let Some(index) = cfg.stmt_of(node) else {
            return output.clone();
        };
        let stmt = &self.program.method(cfg.method()).stmts[index];
        let mut input = output.clone();
        if let Some(def) = stmt.def() {
            input.set(self.program.var(def).local, false);
        }
        for used in stmt.uses() {
            input.insert(self.program.var(used).local);
        }
        input
    }
}

/// Names of the live variables in declaration order.
pub fn describe_fact(program: &Program, method: MethodId, fact: &BitSet) -> String {
    let vars = &program.method(method).vars;
    fact.ones().map(|local| program.var_name(vars[local])).join(", ")
}
