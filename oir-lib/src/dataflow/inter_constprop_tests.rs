use analysis::{cfg::WorklistOrder, domains::ConstValue, solvers::WorklistSolver};

use crate::{
    dataflow::inter_constprop::{InterConstantPropagation, InterCpResult},
    ir::Program,
    pta::{PtaOptions, solve_ci},
    test_utils::{method, parse, stmt, var},
};

const MAIN: &str = "<Main: void main()>";

fn analyze(program: &Program) -> InterCpResult {
    let entry = method(program, MAIN);
    let pta = solve_ci(program, entry, &PtaOptions::default());
    InterConstantPropagation::analyze(program, entry, &pta, WorklistSolver::default())
}

/// The value of `name` after the last statement of `main`.
fn value_at_exit(program: &Program, result: &InterCpResult, name: &str) -> ConstValue {
    let last = program.method(method(program, MAIN)).stmts.len() - 1;
    result
        .out_fact(stmt(program, MAIN, last))
        .get_or_bottom(&var(program, MAIN, name), &())
}

#[test]
fn single_call_site_keeps_the_constant() {
    let source = r"
class Main {
  static method int id(int x) {
    return x;
  }
  static method void main() {
    var int one, a;
    one = 1;
    a = staticinvoke <Main: int id(int)>(one);
    return;
  }
}";
    let expected = r"<Main: void main()> {
  one = 1; /* one=1 */
  a = staticinvoke <Main: int id(int)>(one); /* one=1 */
  return; /* one=1, a=1 */
}
<Main: int id(int)> {
  return x; /* x=1 */
}
";
    let program = parse(source);
    let result = analyze(&program);
    assert_eq!(result.print(&program), expected);
}

#[test]
fn two_call_sites_merge_in_the_callee() {
    let source = r"
class Main {
  static method int id(int x) {
    return x;
  }
  static method void main() {
    var int one, two, a, b;
    one = 1;
    two = 2;
    a = staticinvoke <Main: int id(int)>(one);
    b = staticinvoke <Main: int id(int)>(two);
    return;
  }
}";
    let program = parse(source);
    let result = analyze(&program);
    assert_eq!(value_at_exit(&program, &result, "a"), ConstValue::Nac);
    assert_eq!(value_at_exit(&program, &result, "b"), ConstValue::Nac);
    assert_eq!(value_at_exit(&program, &result, "two"), ConstValue::Constant(2));
    let id = "<Main: int id(int)>";
    assert_eq!(
        result.out_fact(stmt(&program, id, 0)).get_or_bottom(&var(&program, id, "x"), &()),
        ConstValue::Nac
    );
}

#[test]
fn instance_field_through_alias() {
    let source = r"
class A {
  field int f;
}
class Main {
  static method void main() {
    var A a, b, c;
    var int three, four, x, y;
    a = new A;
    c = new A;
    three = 3;
    four = 4;
    a.f = three;
    c.f = four;
    b = a;
    x = b.f;
    y = c.f;
    return;
  }
}";
    let program = parse(source);
    let result = analyze(&program);
    assert_eq!(value_at_exit(&program, &result, "x"), ConstValue::Constant(3));
    assert_eq!(value_at_exit(&program, &result, "y"), ConstValue::Constant(4));
}

#[test]
fn merged_receivers_read_conflicting_values() {
    let source = r"
class A {
  field int f;
}
class Main {
  static method void main() {
    var A a, c, m;
    var int three, four, x, zero;
    a = new A;
    c = new A;
    three = 3;
    four = 4;
    a.f = three;
    c.f = four;
    zero = 0;
    m = a;
    if three > zero goto read;
    m = c;
  read:
    x = m.f;
    return;
  }
}";
    let program = parse(source);
    let result = analyze(&program);
    assert_eq!(value_at_exit(&program, &result, "x"), ConstValue::Nac);
}

#[test]
fn static_fields_and_methods() {
    let source = r"
class Config {
  static field int limit;
  static method void init() {
    var int ten;
    ten = 10;
    Config.limit = ten;
    return;
  }
  method int read() {
    var int r;
    r = Config.limit;
    return r;
  }
}
class Main {
  static method void main() {
    var Config c;
    var int x;
    staticinvoke <Config: void init()>();
    c = new Config;
    x = virtualinvoke c.<Config: int read()>();
    return;
  }
}";
    let program = parse(source);
    let result = analyze(&program);
    assert_eq!(value_at_exit(&program, &result, "x"), ConstValue::Constant(10));
}

#[test]
fn setter_and_getter_on_the_same_object() {
    let source = r"
class A {
  field int f;
  method void set(int v) {
    this.f = v;
    return;
  }
  method int get() {
    var int r;
    r = this.f;
    return r;
  }
}
class Main {
  static method void main() {
    var A a;
    var int three, x;
    a = new A;
    three = 3;
    virtualinvoke a.<A: void set(int)>(three);
    x = virtualinvoke a.<A: int get()>();
    return;
  }
}";
    let program = parse(source);
    for order in [WorklistOrder::Fifo, WorklistOrder::Lifo, WorklistOrder::ReversePostOrder] {
        let entry = method(&program, MAIN);
        let pta = solve_ci(&program, entry, &PtaOptions::default());
        let result =
            InterConstantPropagation::analyze(&program, entry, &pta, WorklistSolver::new(order));
        assert_eq!(value_at_exit(&program, &result, "x"), ConstValue::Constant(3));
    }
}

#[test]
fn array_elements_with_distinct_indices() {
    let source = r"
class Main {
  static method void main() {
    var int[] arr;
    var int n, i0, i1, five, six, x, y;
    n = 2;
    arr = new int[n];
    i0 = 0;
    i1 = 1;
    five = 5;
    six = 6;
    arr[i0] = five;
    arr[i1] = six;
    x = arr[i0];
    y = arr[i1];
    return;
  }
}";
    let program = parse(source);
    let result = analyze(&program);
    assert_eq!(value_at_exit(&program, &result, "x"), ConstValue::Constant(5));
    assert_eq!(value_at_exit(&program, &result, "y"), ConstValue::Constant(6));
}

#[test]
fn calls_without_callee_are_unknown() {
    let source = r"
class Main {
  static method int ext();
  static method void main() {
    var int x;
    x = staticinvoke <Main: int ext()>();
    return;
  }
}";
    let program = parse(source);
    let result = analyze(&program);
    assert_eq!(value_at_exit(&program, &result, "x"), ConstValue::Nac);
}

#[test]
#[should_panic(expected = "was not analyzed")]
fn facts_of_unreachable_methods_are_missing() {
    let source = r"
class Main {
  static method void unused() {
    return;
  }
  static method void main() {
    return;
  }
}";
    let program = parse(source);
    let result = analyze(&program);
    result.out_fact(stmt(&program, "<Main: void unused()>", 0));
}
