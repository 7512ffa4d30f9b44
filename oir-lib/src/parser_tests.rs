use crate::{
    ir::{CallKind, Exp, Stmt, Type},
    test_utils::{method, parse_string},
};

#[test]
fn parse_empty() -> Result<(), String> {
    let program = parse_string("")?;
    assert_eq!(program.class_ids().count(), 0);
    assert_eq!(program.main_method(), None);
    Ok(())
}

#[test]
fn parse_and_print_every_statement() -> Result<(), String> {
    let source = r"
class A {
  field int f;
  static field A g;
  method int foo(int x) {
    var int y;
    y = x + x;
    return y;
  }
}
class Main {
  static method void main() {
    var A a;
    var int i, n;
    var int[] arr;
    var Object o;
    a = new A;
    i = 1;
    a.f = i;
    n = a.f;
    A.g = a;
    arr = new int[i];
    arr[i] = n;
    n = arr[i];
    n = virtualinvoke a.<A: int foo(int)>(n);
    o = (Object) a;
    if n == i goto end;
    switch (n) { case 1: end; case -2: end; default: end; }
    nop;
  end:
    return;
  }
}";
    let expected = r"<Main: void main()> {
  a = new A;
  i = 1;
  a.f = i;
  n = a.f;
  A.g = a;
  arr = new int[i];
  arr[i] = n;
  n = arr[i];
  n = virtualinvoke a.<A: int foo(int)>(n);
  o = (Object) a;
  if n == i goto L13;
  switch (n) { case 1: L13; case -2: L13; default: L13; }
  nop;
L13:
  return;
}
";
    let program = parse_string(source)?;
    let main = program.main_method().unwrap();
    assert_eq!(main, method(&program, "<Main: void main()>"));
    assert_eq!(program.print_method(main, |_| None), expected);

    let object = program.class_by_name("Object").unwrap();
    assert!(program.class(object).is_phantom);
    assert!(!program.class(program.class_by_name("A").unwrap()).is_phantom);
    Ok(())
}

#[test]
fn parse_methods_and_variables() -> Result<(), String> {
    let source = r"
interface I {
  method void run();
}
abstract class Base implements I {
  abstract method int size(int[] xs, Base other);
  static method void helper();
}
class Impl extends Base {
  method int size(int[] xs, Base other) {
    var int n;
    n = 0;
    return n;
  }
  method void run() {
    return;
  }
}";
    let program = parse_string(source)?;
    let size = method(&program, "<Impl: int size(int[],Base)>");
    let size = program.method(size);
    assert!(!size.is_static);
    assert!(!size.is_abstract);
    assert_eq!(program.var_name(size.this.unwrap()), "this");
    let params: Vec<&str> = size.params.iter().map(|&p| program.var_name(p)).collect();
    assert_eq!(params, ["xs", "other"]);
    assert_eq!(size.param_types[0], Type::Array(Box::new(Type::Int)));
    assert_eq!(size.return_vars.len(), 1);

    let abstract_size = method(&program, "<Base: int size(int[], Base)>");
    assert!(program.method(abstract_size).is_abstract);
    let run = method(&program, "<I: void run()>");
    assert!(program.method(run).is_abstract);
    let helper = method(&program, "<Base: void helper()>");
    assert!(!program.method(helper).is_abstract);
    assert!(program.method(helper).stmts.is_empty());

    let base = program.class_by_name("Base").unwrap();
    let impl_class = program.class_by_name("Impl").unwrap();
    let interface = program.class_by_name("I").unwrap();
    assert!(program.class(base).is_abstract);
    assert!(program.class(interface).is_interface);
    assert_eq!(program.class(impl_class).super_class, Some(base));
    assert_eq!(program.hierarchy().direct_subclasses_of(base), [impl_class]);
    assert_eq!(program.hierarchy().direct_implementors_of(interface), [base]);
    Ok(())
}

#[test]
fn parse_invocations() -> Result<(), String> {
    let source = r"
class Main {
  static method int id(int x) {
    return x;
  }
  method void <init>() {
    return;
  }
  static method void main() {
    var Main m;
    var int a;
    a = 1;
    a = staticinvoke <Main: int id(int)>(a);
    m = new Main;
    specialinvoke m.<Main: void <init>()>();
    dynamicinvoke <Main: void lambda()>();
    return;
  }
}";
    let program = parse_string(source)?;
    let main = program.method(program.main_method().unwrap());
    let Stmt::Invoke(call) = &main.stmts[1] else {
        panic!("Invoke expected");
    };
    assert_eq!(call.kind, CallKind::Static);
    assert_eq!(call.base, None);
    assert_eq!(call.result, Some(main.vars[1]));
    assert_eq!(program.method_ref_signature(call.method_ref), "<Main: int id(int)>");

    let Stmt::Invoke(init) = &main.stmts[3] else {
        panic!("Invoke expected");
    };
    assert_eq!(init.kind, CallKind::Special);
    assert_eq!(init.base, Some(main.vars[0]));
    method(&program, "<Main: void <init>()>");

    assert_eq!(main.stmts[0], Stmt::Assign { lhs: main.vars[1], rhs: Exp::Int(1) });
    Ok(())
}

#[test]
fn parse_errors() {
    let cases = [
        (
            "class M { static method void main() { x = 1; } }",
            "[line 1] Error at 'x': Undeclared variable.\n",
        ),
        (
            "class M { static method void main() { goto L; } }",
            "[line 1] Error at 'L': Undefined label.\n",
        ),
        (
            "class A { }\nclass A { }",
            "[line 2] Error at 'A': Class 'A' is already declared.\n",
        ),
        (
            "class M { static method void f(int x); static method void main() { staticinvoke <M: void f(int)>(); } }",
            "[line 1] Error at ')': Expected 1 arguments, found 0.\n",
        ),
        (
            "class M { static method int f() { return; } }",
            "[line 1] Error at 'return': Return value expected.\n",
        ),
        (
            "class M { static method void main() { L: L: nop; } }",
            "[line 1] Error at 'L': Duplicate label.\n",
        ),
        (
            "class M { static method void main() { var int x; x = x.f; } }",
            "[line 1] Error at 'x': Field access on a non-class type.\n",
        ),
        (
            "class M { field int f; static method void main() { var int x; x = M.f; } }",
            "[line 1] Error at 'f': Static fields are accessed through the class, instance fields through a variable.\n",
        ),
        (
            "class M { static method void main() { var int x; if x + x goto L; L: nop; } }",
            "[line 1] Error at '+': Comparison operator expected.\n",
        ),
        (
            "class M { abstract method void f() { } }",
            "[line 1] Error at 'method': Abstract method cannot have a body.\n",
        ),
        (
            "class M { static method void main() {",
            "[line 1] Error at '{': Unterminated method body.\n",
        ),
    ];
    for (source, expected) in cases {
        assert_eq!(parse_string(source).unwrap_err(), expected, "{source}");
    }
}
