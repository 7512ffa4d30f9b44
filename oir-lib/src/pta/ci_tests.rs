use std::collections::BTreeSet;

use crate::{
    heap::{HeapPolicy, ObjKind},
    ir::Program,
    pta::{PointerAnalysisResult, PtaOptions, QueueOrder, solve_ci},
    test_utils::{method, parse, stmt, var},
};

const MAIN: &str = "<Main: void main()>";

/// The allocation statements of the objects `name` points to.
fn sites(
    program: &Program,
    result: &PointerAnalysisResult,
    signature: &str,
    name: &str,
) -> Vec<usize> {
    result
        .points_to(var(program, signature, name))
        .iter()
        .map(|obj| match result.heap().obj(*obj).kind {
            ObjKind::Alloc(site) => site.index,
            ref kind => panic!("Unexpected object {kind:?}"),
        })
        .collect()
}

fn analyze(program: &Program) -> PointerAnalysisResult {
    solve_ci(program, method(program, MAIN), &PtaOptions::default())
}

#[test]
fn describe_points_to_sets() {
    let source = r"
class A {
}
class Main {
  static method void main() {
    var A a, b;
    a = new A;
    b = a;
    return;
  }
}";
    let expected = "\
<Main: void main()>/a -> [NewObj{<Main: void main()>[0@L7] a = new A;}]
<Main: void main()>/b -> [NewObj{<Main: void main()>[0@L7] a = new A;}]
";
    let program = parse(source);
    assert_eq!(analyze(&program).describe(&program), expected);
}

const IDENTITY: &str = r"
class A {
}
class Main {
  static method A id(A p) {
    return p;
  }
  static method void main() {
    var A a, b, r1, r2;
    a = new A;
    b = new A;
    r1 = staticinvoke <Main: A id(A)>(a);
    r2 = staticinvoke <Main: A id(A)>(b);
    return;
  }
}";

#[test]
fn static_calls_wire_arguments_and_results() {
    let program = parse(IDENTITY);
    let result = analyze(&program);
    let id = method(&program, "<Main: A id(A)>");
    assert_eq!(sites(&program, &result, "<Main: A id(A)>", "p"), [0, 1]);
    assert_eq!(sites(&program, &result, MAIN, "r1"), [0, 1]);
    assert_eq!(sites(&program, &result, MAIN, "r2"), [0, 1]);
    assert_eq!(result.call_graph().callees_of(stmt(&program, MAIN, 2)), [id]);
    assert_eq!(result.call_graph().callers_of(id).len(), 2);
    assert_eq!(result.call_graph().reachable_methods(), [method(&program, MAIN), id]);
}

#[test]
fn static_fields_flow_between_methods() {
    let source = r"
class A {
}
class Main {
  static field A g;
  static method void store() {
    var A a;
    a = new A;
    Main.g = a;
    return;
  }
  static method void main() {
    var A c;
    staticinvoke <Main: void store()>();
    c = Main.g;
    return;
  }
}";
    let program = parse(source);
    let result = analyze(&program);
    assert_eq!(sites(&program, &result, MAIN, "c"), [0]);
    let g = program
        .resolve_field(program.class_by_name("Main").unwrap(), "g")
        .unwrap();
    assert_eq!(result.static_field_points_to(g).len(), 1);
}

#[test]
fn instance_fields_are_field_and_object_sensitive() {
    let source = r"
class A {
}
class B {
  field A f;
  field A g;
}
class Main {
  static method void main() {
    var A a1, a2, a3, x, y, z;
    var B o1, o2;
    a1 = new A;
    a2 = new A;
    a3 = new A;
    o1 = new B;
    o2 = new B;
    o1.f = a1;
    o1.g = a2;
    o2.f = a3;
    x = o1.f;
    y = o1.g;
    z = o2.f;
    return;
  }
}";
    let program = parse(source);
    let result = analyze(&program);
    assert_eq!(sites(&program, &result, MAIN, "x"), [0]);
    assert_eq!(sites(&program, &result, MAIN, "y"), [1]);
    assert_eq!(sites(&program, &result, MAIN, "z"), [2]);
    assert!(!result.may_alias(var(&program, MAIN, "o1"), var(&program, MAIN, "o2")));
}

#[test]
fn array_elements_ignore_the_index() {
    let source = r"
class A {
}
class Main {
  static method void main() {
    var A a, b, x;
    var A[] arr;
    var int n, i, j;
    n = 2;
    i = 0;
    j = 1;
    arr = new A[n];
    a = new A;
    b = new A;
    arr[i] = a;
    arr[j] = b;
    x = arr[i];
    return;
  }
}";
    let program = parse(source);
    let result = analyze(&program);
    assert_eq!(sites(&program, &result, MAIN, "x"), [4, 5]);
    let array = *result.points_to(var(&program, MAIN, "arr")).first().unwrap();
    assert_eq!(result.array_index_points_to(array).len(), 2);
}

const DISPATCH: &str = r"
class A {
  method A make() {
    var A r;
    r = new A;
    return r;
  }
}
class B extends A {
  method A make() {
    var A r;
    r = new B;
    return r;
  }
}
class Main {
  static method void main() {
    var A x, y, z;
    x = new B;
    y = virtualinvoke x.<A: A make()>();
    z = (A) y;
    return;
  }
}";

#[test]
fn virtual_calls_dispatch_on_the_receiver_objects() {
    let program = parse(DISPATCH);
    let result = analyze(&program);
    let b_make = method(&program, "<B: A make()>");
    let a_make = method(&program, "<A: A make()>");
    assert_eq!(result.call_graph().callees_of(stmt(&program, MAIN, 1)), [b_make]);
    assert!(!result.call_graph().contains_method(a_make));
    assert_eq!(sites(&program, &result, "<B: A make()>", "r"), [0]);
    assert_eq!(
        result.points_to(var(&program, MAIN, "y")),
        result.points_to(var(&program, MAIN, "z"))
    );
    let this = program.method(b_make).this.unwrap();
    assert_eq!(result.points_to(this), result.points_to(var(&program, MAIN, "x")));
}

#[test]
fn queue_order_does_not_change_the_result() {
    let sources = [IDENTITY, DISPATCH];
    for source in sources {
        let program = parse(source);
        let entry = method(&program, MAIN);
        let describe = |order| {
            let options = PtaOptions {
                order,
                ..PtaOptions::default()
            };
            let result = solve_ci(&program, entry, &options);
            let edges: BTreeSet<_> = result.call_graph().edges().iter().copied().collect();
            (result.describe(&program), edges)
        };
        assert_eq!(describe(QueueOrder::Fifo), describe(QueueOrder::Lifo));
    }
}

#[test]
fn type_based_heap_merges_allocations() {
    let source = r"
class A {
}
class Main {
  static method void main() {
    var A a, b;
    a = new A;
    b = new A;
    return;
  }
}";
    let program = parse(source);
    let entry = method(&program, MAIN);
    let (a, b) = (var(&program, MAIN, "a"), var(&program, MAIN, "b"));

    let by_site = solve_ci(&program, entry, &PtaOptions::default());
    assert!(!by_site.may_alias(a, b));

    let options = PtaOptions {
        heap: HeapPolicy::Type,
        ..PtaOptions::default()
    };
    let by_type = solve_ci(&program, entry, &options);
    assert!(by_type.may_alias(a, b));
    assert_eq!(by_type.heap().len(), 1);
    assert_eq!(
        by_type.describe(&program),
        "<Main: void main()>/a -> [MergedObj{A}]\n<Main: void main()>/b -> [MergedObj{A}]\n"
    );
}
