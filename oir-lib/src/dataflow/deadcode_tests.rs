use std::collections::BTreeSet;

use analysis::{cfg::WorklistOrder, solvers::WorklistSolver};

use crate::{
    dataflow::deadcode::find_dead_code,
    test_utils::{method, parse},
};

fn dead_code(source: &str, signature: &str) -> BTreeSet<usize> {
    let program = parse(source);
    find_dead_code(&program, method(&program, signature), WorklistSolver::default())
}

#[test]
fn constant_condition_prunes_else_branch() {
    let source = r"
class Main {
  static method int main() {
    var int x, y, a, b;
    x = 1;
    y = 1;
    if x == y goto then;
    b = 2;
    goto end;
  then:
    a = 1;
  end:
    return a;
  }
}";
    assert_eq!(dead_code(source, "<Main: int main()>"), BTreeSet::from([3, 4]));
}

#[test]
fn useless_assignments_without_side_effects() {
    let source = r"
class A {
}
class Main {
  static method int helper() {
    var int r;
    r = 1;
    return r;
  }
  static method void f(int p) {
    var int sum, quotient, fresh, called;
    var A o;
    var int[] arr;
    sum = p + p;
    o = new A;
    quotient = p / p;
    arr = new int[p];
    fresh = arr[p];
    called = staticinvoke <Main: int helper()>();
    return;
  }
}";
    assert_eq!(dead_code(source, "<Main: void f(int)>"), BTreeSet::from([0, 5]));
}

#[test]
fn switch_on_constant_takes_one_case() {
    let source = r"
class Main {
  static method int pick() {
    var int x, r;
    x = 2;
    switch (x) { case 1: one; case 2: two; default: other; }
  one:
    r = 10;
    return r;
  two:
    r = 20;
    return r;
  other:
    r = 30;
    return r;
  }
}";
    assert_eq!(dead_code(source, "<Main: int pick()>"), BTreeSet::from([2, 3, 6, 7]));
}

#[test]
fn switch_falls_back_to_default() {
    let source = r"
class Main {
  static method int pick() {
    var int x, r;
    x = 5;
    switch (x) { case 1: one; default: other; }
  one:
    r = 10;
    return r;
  other:
    r = 30;
    return r;
  }
}";
    assert_eq!(dead_code(source, "<Main: int pick()>"), BTreeSet::from([2, 3]));
}

#[test]
fn unknown_condition_keeps_both_branches() {
    let source = r"
class Main {
  static method int branch(int p) {
    var int zero, r;
    zero = 0;
    if p > zero goto pos;
    r = 1;
    goto end;
  pos:
    r = 2;
  end:
    return r;
  }
}";
    assert!(dead_code(source, "<Main: int branch(int)>").is_empty());
}

#[test]
fn code_after_an_endless_loop_is_dead() {
    let source = r"
class Main {
  static method void spin() {
    var int x, one;
    x = 0;
    one = 1;
  loop:
    if one > x goto loop;
    x = one;
    return;
  }
}";
    let program = parse(source);
    let id = method(&program, "<Main: void spin()>");
    for order in [WorklistOrder::Fifo, WorklistOrder::Lifo, WorklistOrder::ReversePostOrder] {
        assert_eq!(
            find_dead_code(&program, id, WorklistSolver::new(order)),
            BTreeSet::from([3, 4])
        );
    }
}
