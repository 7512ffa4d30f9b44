use analysis::solvers::DataflowResult;
use itertools::Itertools;

use crate::{cfg::Cfg, ir::{MethodId, Program}};

/// Constant propagation over 32-bit integer variables.
pub mod constprop;

/// Dead code detection from constants and liveness.
pub mod deadcode;

/// Constant propagation over the inter-procedural control flow graph, with
/// field and array accesses resolved through a pointer analysis.
pub mod inter_constprop;

/// Live variable analysis.
pub mod livevar;


#[cfg(test)]
mod deadcode_tests;

#[cfg(test)]
mod inter_constprop_tests;


/// The facts of an intra-procedural analysis, addressed by statement index.
#[derive(Clone, Debug)]
pub struct MethodFacts<F> {
    cfg: Cfg,
    result: DataflowResult<F>,
}

impl<F> MethodFacts<F> {
    pub fn new(cfg: Cfg, result: DataflowResult<F>) -> Self {
        Self { cfg, result }
    }

    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    pub fn result(&self) -> &DataflowResult<F> {
        &self.result
    }

    pub fn in_fact(&self, stmt: usize) -> &F {
        self.result.in_fact(self.cfg.node_of(stmt))
    }

    pub fn out_fact(&self, stmt: usize) -> &F {
        self.result.out_fact(self.cfg.node_of(stmt))
    }

    /// Print the method with the OUT fact of every statement, rendered by
    /// `describe`.
    pub fn print(&self, program: &Program, describe: impl Fn(&F) -> String) -> String {
        let method: MethodId = self.cfg.method();
        program.print_method(method, |stmt| Some(describe(self.out_fact(stmt))))
    }
}

/// Render `name=value` pairs in the order given.
pub(crate) fn describe_bindings<'a>(
    bindings: impl Iterator<Item = (&'a str, String)>,
) -> String {
    bindings.map(|(name, value)| format!("{name}={value}")).join(", ")
}
