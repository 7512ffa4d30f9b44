use analysis::{
    cfg::Direction,
    domains::{ConstValue, Map},
    solvers::{DataflowAnalysis, WorklistSolver},
};

use crate::{
    cfg::Cfg,
    dataflow::{MethodFacts, describe_bindings},
    ir::{BinaryOp, Exp, MethodId, Program, Stmt, VarId},
};

/// Abstract values of the integer variables in scope. Variables that are
/// not bound are `Undef`.
pub type CpFact = Map<VarId, ConstValue>;

pub struct ConstantPropagation<'p> {
    program: &'p Program,
}

impl<'p> ConstantPropagation<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self { program }
    }

    pub fn analyze(
        program: &Program,
        method: MethodId,
        solver: WorklistSolver,
    ) -> MethodFacts<CpFact> {
        let cfg = Cfg::new(program, method);
        let result = solver.solve(&cfg, &mut ConstantPropagation::new(program));
        MethodFacts::new(cfg, result)
    }
}

impl DataflowAnalysis<Cfg> for ConstantPropagation<'_> {
    type Fact = CpFact;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn lattice_context(&self) -> &() {
        &()
    }

    /// Parameters are unknown on entry.
    fn boundary_fact(&self, cfg: &Cfg, _node: usize) -> CpFact {
        let mut fact = CpFact::default();
        for &param in &self.program.method(cfg.method()).params {
            if self.program.var(param).ty.can_hold_int() {
                fact.update(param, ConstValue::Nac, &());
            }
        }
        fact
    }

    fn transfer_node(&mut self, cfg: &Cfg, node: usize, input: &CpFact) -> CpFact {
        let Some(index) = cfg.stmt_of(node) else {
            return input.clone();
        };
        let stmt = &self.program.method(cfg.method()).stmts[index];
        transfer_stmt(self.program, stmt, input)
    }
}

/// The fact after `stmt`: the defined integer variable gets the value of
/// the right-hand side, everything else is copied.
pub fn transfer_stmt(program: &Program, stmt: &Stmt, input: &CpFact) -> CpFact {
    let mut output = input.clone();
    if let Some(lhs) = stmt.def() {
        if program.var(lhs).ty.can_hold_int() {
            let value = match stmt {
                Stmt::Assign { rhs, .. } => evaluate(rhs, input),
                // Loads, calls, and allocations produce unknown values.
                _ => ConstValue::Nac,
            };
            output.update(lhs, value, &());
        }
    }
    output
}

pub fn evaluate(exp: &Exp, fact: &CpFact) -> ConstValue {
    match exp {
        Exp::Var(var) => fact.get_or_bottom(var, &()),
        Exp::Int(value) => ConstValue::Constant(*value),
        Exp::Binary(op, lhs, rhs) => {
            evaluate_binary(*op, fact.get_or_bottom(lhs, &()), fact.get_or_bottom(rhs, &()))
        }
        Exp::Cast(..) => ConstValue::Nac,
    }
}

pub fn evaluate_binary(op: BinaryOp, lhs: ConstValue, rhs: ConstValue) -> ConstValue {
    match op {
        BinaryOp::Add => lhs + rhs,
        BinaryOp::Sub => lhs - rhs,
        BinaryOp::Mul => lhs * rhs,
        BinaryOp::Div => lhs / rhs,
        BinaryOp::Rem => lhs % rhs,
        BinaryOp::And => lhs & rhs,
        BinaryOp::Or => lhs | rhs,
        BinaryOp::Xor => lhs ^ rhs,
        BinaryOp::Shl => lhs << rhs,
        BinaryOp::Shr => lhs >> rhs,
        BinaryOp::Ushr => lhs.ushr(rhs),
        BinaryOp::Eq => lhs.compare(rhs, i32::eq),
        BinaryOp::Ne => lhs.compare(rhs, i32::ne),
        BinaryOp::Lt => lhs.compare(rhs, i32::lt),
        BinaryOp::Gt => lhs.compare(rhs, i32::gt),
        BinaryOp::Le => lhs.compare(rhs, i32::le),
        BinaryOp::Ge => lhs.compare(rhs, i32::ge),
    }
}

/// `x=1, y=NAC` in declaration order.
pub fn describe_fact(program: &Program, fact: &CpFact) -> String {
    describe_bindings(
        fact.iter()
            .map(|(var, value)| (program.var_name(*var), value.to_string())),
    )
}
