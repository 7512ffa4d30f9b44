use std::collections::BTreeSet;

use analysis::{cfg::ControlFlowGraph, domains::{BitSet, ConstValue}, solvers::WorklistSolver};

use crate::{
    cfg::{Cfg, EdgeKind},
    dataflow::{
        MethodFacts,
        constprop::{ConstantPropagation, CpFact, evaluate_binary},
        livevar::LiveVariables,
    },
    ir::{BinaryOp, Exp, MethodId, Program, Stmt},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Find the statements of a method that are unreachable, given the
/// constant branch conditions, or that assign a dead variable without a
/// side effect. Statement indices are returned in ascending order.
pub fn find_dead_code(
    program: &Program,
    method: MethodId,
    solver: WorklistSolver,
) -> BTreeSet<usize> {
    let constants = ConstantPropagation::analyze(program, method, solver);
    let liveness = LiveVariables::analyze(program, method, solver);
    detect_dead_code(program, &constants, &liveness)
}

pub fn detect_dead_code(
    program: &Program,
    constants: &MethodFacts<CpFact>,
    liveness: &MethodFacts<BitSet>,
) -> BTreeSet<usize> {
    let cfg = constants.cfg();
    let stmts = &program.method(cfg.method()).stmts;
    let mut dead = BTreeSet::new();
    let mut colors = vec![Color::White; cfg.node_count()];

    let mut stack = vec![cfg.entry()];
    colors[cfg.entry()] = Color::Gray;
    while let Some(node) = stack.pop() {
        let mut followed: Vec<usize> = cfg.successors(node).collect();
        if let Some(index) = cfg.stmt_of(node) {
            let stmt = &stmts[index];
            if let Some(taken) = taken_edges(cfg, node, stmt, constants.in_fact(index)) {
                followed = taken;
            }
            if is_useless(program, stmt, liveness.out_fact(index)) {
                dead.insert(index);
            }
        }
        colors[node] = Color::Black;
        for succ in followed {
            if colors[succ] == Color::White {
                colors[succ] = Color::Gray;
                stack.push(succ);
            }
        }
    }

    for index in 0..stmts.len() {
        if colors[cfg.node_of(index)] == Color::White {
            dead.insert(index);
        }
    }
    dead
}

/// The successors reached from a branch whose condition is a known
/// constant. `None` when every successor is possible.
fn taken_edges(cfg: &Cfg, node: usize, stmt: &Stmt, fact: &CpFact) -> Option<Vec<usize>> {
    let edges = cfg.out_edges(node);
    let pick = |kind: EdgeKind| -> Vec<usize> {
        edges.iter().filter(|e| e.kind == kind).map(|e| e.target).collect()
    };
    match stmt {
        Stmt::If { lhs, op, rhs, .. } => {
            let lhs = fact.get_or_bottom(lhs, &());
            let rhs = fact.get_or_bottom(rhs, &());
            match evaluate_binary(*op, lhs, rhs) {
                ConstValue::Constant(0) => Some(pick(EdgeKind::IfFalse)),
                ConstValue::Constant(_) => Some(pick(EdgeKind::IfTrue)),
                _ => None,
            }
        }
        Stmt::Switch { var, cases, .. } => {
            let value = fact.get_or_bottom(var, &()).as_constant()?;
            if cases.iter().any(|&(case, _)| case == value) {
                Some(pick(EdgeKind::SwitchCase(value)))
            } else {
                Some(pick(EdgeKind::SwitchDefault))
            }
        }
        _ => None,
    }
}

/// An assignment to a variable that is not live afterwards, whose
/// right-hand side cannot have an observable effect.
fn is_useless(program: &Program, stmt: &Stmt, live_out: &BitSet) -> bool {
    let Some(lhs) = stmt.def() else {
        return false;
    };
    if live_out.contains(program.var(lhs).local) {
        return false;
    }
    !has_side_effect(stmt)
}

fn has_side_effect(stmt: &Stmt) -> bool {
    match stmt {
        // Allocation, class initialization, and null or bounds checks.
        Stmt::New { .. } | Stmt::LoadField { .. } | Stmt::LoadArray { .. } => true,
        // A cast may fail, a division may trap.
        Stmt::Assign {
            rhs: Exp::Cast(..) | Exp::Binary(BinaryOp::Div | BinaryOp::Rem, ..),
            ..
        } => true,
        Stmt::Assign { .. } | Stmt::Invoke(_) => false,
        Stmt::StoreField { .. }
        | Stmt::StoreArray { .. }
        | Stmt::If { .. }
        | Stmt::Goto { .. }
        | Stmt::Switch { .. }
        | Stmt::Return(_)
        | Stmt::Nop => true,
    }
}
