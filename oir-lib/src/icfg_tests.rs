use analysis::cfg::ControlFlowGraph;

use crate::{
    callgraph::CallGraph,
    cfg::EdgeKind,
    cha::build_call_graph,
    icfg::{Icfg, IcfgEdgeKind},
    test_utils::{method, parse, stmt},
};

const SOURCE: &str = r"
class Main {
  static method int id(int x) {
    return x;
  }
  static method void main() {
    var int a, b;
    a = 1;
    b = staticinvoke <Main: int id(int)>(a);
    return;
  }
}";

#[test]
fn call_and_return_edges() {
    let program = parse(SOURCE);
    let main = method(&program, "<Main: void main()>");
    let id = method(&program, "<Main: int id(int)>");
    let icfg = Icfg::new(&program, &build_call_graph(&program, main), main);

    assert_eq!(icfg.methods(), [main, id]);
    assert_eq!(icfg.node_count(), 8);
    assert_eq!(icfg.method_entry(id), Some(5));
    assert_eq!(icfg.method_exit(id), Some(7));
    assert!(icfg.is_entry(0) && icfg.is_exit(4));
    assert!(!icfg.is_entry(5) && !icfg.is_exit(7));

    let call_site = stmt(&program, "<Main: void main()>", 1);
    assert_eq!(icfg.node_of(call_site), Some(2));
    assert_eq!(icfg.stmt_of(6), Some(stmt(&program, "<Main: int id(int)>", 0)));
    assert_eq!(icfg.stmt_of(5), None);
    assert_eq!(icfg.method_of(6), id);

    let out: Vec<_> = icfg.out_edges(2).iter().map(|e| (e.target, e.kind)).collect();
    assert_eq!(
        out,
        [
            (3, IcfgEdgeKind::CallToReturn),
            (5, IcfgEdgeKind::Call { call_site, callee: id }),
        ]
    );
    let into_return_site: Vec<_> = icfg.in_edges(3).iter().map(|e| (e.source, e.kind)).collect();
    assert_eq!(
        into_return_site,
        [
            (2, IcfgEdgeKind::CallToReturn),
            (7, IcfgEdgeKind::Return { call_site, callee: id }),
        ]
    );
    assert_eq!(icfg.out_edges(0)[0].kind, IcfgEdgeKind::Normal(EdgeKind::Entry));
}

#[test]
fn unknown_statements_have_no_node() {
    let program = parse(SOURCE);
    let main = method(&program, "<Main: void main()>");
    let icfg = Icfg::new(&program, &build_call_graph(&program, main), main);
    assert_eq!(icfg.node_of(stmt(&program, "<Main: void main()>", 3)), None);
}

#[test]
#[should_panic(expected = "is not in the call graph")]
fn entry_must_be_reachable() {
    let program = parse(SOURCE);
    let main = method(&program, "<Main: void main()>");
    Icfg::new(&program, &CallGraph::new(), main);
}
