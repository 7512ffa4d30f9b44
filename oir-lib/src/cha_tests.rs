use crate::{
    callgraph::CallGraph,
    cha::build_call_graph,
    ir::{MethodId, Program, StmtRef},
    test_utils::{method, parse, stmt},
};

fn callee_names(
    program: &Program,
    call_graph: &CallGraph<StmtRef, MethodId>,
    call_site: StmtRef,
) -> Vec<String> {
    let mut names: Vec<String> = call_graph
        .callees_of(call_site)
        .iter()
        .map(|&m| program.method_signature(m))
        .collect();
    names.sort();
    names
}

const HIERARCHY: &str = r"
class A {
  method void foo() { return; }
}
class B extends A {
  method void foo() { return; }
}
class C extends A {
  method void foo() { return; }
}
abstract class D extends A {
  abstract method void foo();
}
class E extends D { }
class F { method void foo() { return; } }
";

#[test]
fn virtual_call_reaches_every_override() {
    let source = HIERARCHY.to_owned()
        + r"
class Main {
  static method void main() {
    var A a;
    a = new B;
    virtualinvoke a.<A: void foo()>();
    return;
  }
}";
    let program = parse(&source);
    let main = method(&program, "<Main: void main()>");
    let call_graph = build_call_graph(&program, main);
    let call_site = stmt(&program, "<Main: void main()>", 1);
    assert_eq!(
        callee_names(&program, &call_graph, call_site),
        ["<A: void foo()>", "<B: void foo()>", "<C: void foo()>"]
    );
    assert!(!call_graph.contains_method(method(&program, "<D: void foo()>")));
    assert!(!call_graph.contains_method(method(&program, "<F: void foo()>")));
    assert_eq!(call_graph.entry_methods(), [main]);
    assert_eq!(call_graph.reachable_methods().len(), 4);
    assert_eq!(call_graph.edge_count(), 3);
}

#[test]
fn narrower_receiver_type() {
    let source = HIERARCHY.to_owned()
        + r"
class Main {
  static method void main() {
    var B b;
    var D d;
    b = new B;
    virtualinvoke b.<B: void foo()>();
    d = new E;
    virtualinvoke d.<D: void foo()>();
    return;
  }
}";
    let program = parse(&source);
    let main = method(&program, "<Main: void main()>");
    let call_graph = build_call_graph(&program, main);
    let on_b = stmt(&program, "<Main: void main()>", 1);
    let on_d = stmt(&program, "<Main: void main()>", 3);
    assert_eq!(callee_names(&program, &call_graph, on_b), ["<B: void foo()>"]);
    assert_eq!(callee_names(&program, &call_graph, on_d), ["<A: void foo()>"]);
}

#[test]
fn static_special_and_transitive_calls() {
    let source = r"
class Base {
  method void init() { return; }
}
class Sub extends Base {
  method void helper() {
    specialinvoke this.<Base: void init()>();
    return;
  }
}
class Main {
  static method void a() {
    var Sub s;
    s = new Sub;
    virtualinvoke s.<Sub: void helper()>();
    return;
  }
  static method void main() {
    staticinvoke <Main: void a()>();
    return;
  }
  static method void unused() { return; }
}";
    let program = parse(source);
    let main = method(&program, "<Main: void main()>");
    let call_graph = build_call_graph(&program, main);
    let reachable: Vec<String> = call_graph
        .reachable_methods()
        .iter()
        .map(|&m| program.method_signature(m))
        .collect();
    assert_eq!(
        reachable,
        [
            "<Main: void main()>",
            "<Main: void a()>",
            "<Sub: void helper()>",
            "<Base: void init()>",
        ]
    );
    let init = method(&program, "<Base: void init()>");
    let special = stmt(&program, "<Sub: void helper()>", 0);
    assert!(call_graph.contains_edge(special, init));
    assert_eq!(call_graph.callers_of(init), [special]);
}

#[test]
fn interface_calls() {
    let source = r"
interface Shape {
  method int area();
}
interface Polygon extends Shape { }
class Square implements Polygon {
  method int area() { var int x; x = 4; return x; }
}
class Circle implements Shape {
  method int area() { var int x; x = 3; return x; }
}
abstract class Blob implements Shape { }
class Main {
  static method void main() {
    var Shape s;
    var int n;
    s = new Square;
    n = interfaceinvoke s.<Shape: int area()>();
    dynamicinvoke <Main: void lambda()>();
    return;
  }
}";
    let program = parse(source);
    let main = method(&program, "<Main: void main()>");
    let call_graph = build_call_graph(&program, main);
    let call_site = stmt(&program, "<Main: void main()>", 1);
    assert_eq!(
        callee_names(&program, &call_graph, call_site),
        ["<Circle: int area()>", "<Square: int area()>"]
    );
    let dynamic = stmt(&program, "<Main: void main()>", 2);
    assert!(call_graph.callees_of(dynamic).is_empty());
}
