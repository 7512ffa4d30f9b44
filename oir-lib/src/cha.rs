use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::{
    callgraph::{CallEdge, CallGraph},
    ir::{CallKind, Invoke, MethodId, Program, StmtRef},
};

/// Build a call graph with class hierarchy analysis: a virtual call may
/// reach the implementation of every subtype of the declared receiver
/// class. Only methods reachable from `entry` are processed.
pub fn build_call_graph(program: &Program, entry: MethodId) -> CallGraph<StmtRef, MethodId> {
    let mut call_graph = CallGraph::new();
    call_graph.add_entry_method(entry);
    let mut worklist = VecDeque::from([entry]);
    while let Some(method) = worklist.pop_front() {
        for (index, stmt) in program.method(method).stmts.iter().enumerate() {
            let Some(invoke) = stmt.as_invoke() else {
                continue;
            };
            let call_site = StmtRef { method, index };
            for callee in resolve(program, invoke) {
                call_graph.add_edge(CallEdge {
                    kind: invoke.kind,
                    call_site,
                    callee,
                });
                if call_graph.add_reachable_method(callee) {
                    worklist.push_back(callee);
                }
            }
        }
    }
    debug!(
        methods = call_graph.reachable_methods().len(),
        edges = call_graph.edge_count(),
        "CHA call graph built"
    );
    call_graph
}

/// The possible targets of a call site according to the class hierarchy.
pub fn resolve(program: &Program, invoke: &Invoke) -> BTreeSet<MethodId> {
    let hierarchy = program.hierarchy();
    let declared = invoke.method_ref;
    match invoke.kind {
        CallKind::Static => hierarchy
            .lookup(program, declared.class, declared.subsignature)
            .into_iter()
            .collect(),
        CallKind::Special => hierarchy
            .dispatch(program, declared.class, declared.subsignature)
            .into_iter()
            .collect(),
        CallKind::Virtual | CallKind::Interface => hierarchy
            .subtypes_of(declared.class)
            .into_iter()
            .filter_map(|class| hierarchy.dispatch(program, class, declared.subsignature))
            .collect(),
        CallKind::Dynamic => BTreeSet::new(),
    }
}
