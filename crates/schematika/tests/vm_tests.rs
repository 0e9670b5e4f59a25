//! Evaluation behavior, driven through the public `Session` API: register
//! dispatch, closures and environments, primitives, and runtime errors.

use schematika::{Object, Session, SessionError, VmError};

fn eval(src: &str) -> Object {
    Session::new().execute(src).expect("evaluation should succeed")
}

#[test]
fn constants_evaluate_to_themselves() {
    assert_eq!(eval("42;"), Object::I64(42));
    assert_eq!(eval("3.14;"), Object::F64(3.14));
    assert_eq!(eval("true;"), Object::Bool(true));
    assert_eq!(eval("\"hello\";"), Object::Str("hello".to_owned()));
}

#[test]
fn arithmetic_respects_precedence() {
    assert_eq!(eval("1 + 2 * 3;"), Object::I64(7));
    assert_eq!(eval("1 * 2 + 3;"), Object::I64(5));
    assert_eq!(eval("(1 + 2) * 3;"), Object::I64(9));
    assert_eq!(eval("10 - 2 - 3;"), Object::I64(5));
    assert_eq!(eval("7 / 2;"), Object::I64(3));
}

#[test]
fn float_arithmetic() {
    assert_eq!(eval("1.5 + 2.5;"), Object::F64(4.0));
    assert_eq!(eval("1.0 / 4.0;"), Object::F64(0.25));
}

#[test]
fn comparisons_yield_booleans() {
    assert_eq!(eval("1 < 2;"), Object::Bool(true));
    assert_eq!(eval("2 <= 1;"), Object::Bool(false));
    assert_eq!(eval("3 == 3;"), Object::Bool(true));
    assert_eq!(eval("3 != 3;"), Object::Bool(false));
    assert_eq!(eval("2.0 > 1.0;"), Object::Bool(true));
}

#[test]
fn conditionals_pick_exactly_one_branch() {
    assert_eq!(eval("if 1 < 2 then 10 else 20;"), Object::I64(10));
    assert_eq!(eval("if 1 > 2 then 10 else 20;"), Object::I64(20));
    // A failed test with no else produces no useful value.
    assert_eq!(eval("if 1 > 2 then 10;"), Object::Unspecified);
}

#[test]
fn division_by_zero_halts_with_an_error() {
    let err = Session::new().execute("1 / 0;").expect_err("division by zero");
    assert_eq!(err, SessionError::Vm(VmError::DivisionByZero));
}

#[test]
fn closures_capture_their_environment() {
    let mut session = Session::new();
    session
        .execute("def sq = lambda(x : f64) : f64 x * x;")
        .expect("definition");
    assert_eq!(session.execute("sq(4.0);").expect("call"), Object::F64(16.0));
}

#[test]
fn curried_closures_reach_outer_parameters() {
    let mut session = Session::new();
    session
        .execute("def add = lambda(a : i64) lambda(b : i64) a + b;")
        .expect("definition");
    assert_eq!(session.execute("add(1)(2);").expect("call"), Object::I64(3));
}

#[test]
fn recursion_through_the_global_binding() {
    let mut session = Session::new();
    session
        .execute("def fact = lambda(n : i64) : i64 if n == 0 then 1 else n * fact(n - 1);")
        .expect("definition");
    assert_eq!(session.execute("fact(5);").expect("call"), Object::I64(120));
    assert_eq!(session.execute("fact(10);").expect("call"), Object::I64(3628800));
}

#[test]
fn function_definition_sugar() {
    let mut session = Session::new();
    session
        .execute("def sq(x : i64) : i64 { x * x }")
        .expect("definition");
    assert_eq!(session.execute("sq(5);").expect("call"), Object::I64(25));
}

#[test]
fn assignment_updates_the_binding() {
    let mut session = Session::new();
    assert_eq!(
        session.execute("def x = 1; x := 5; x;").expect("assignment"),
        Object::I64(5)
    );
}

#[test]
fn sequences_evaluate_left_to_right_yielding_the_last() {
    assert_eq!(eval("{ 1; 2; 3 };"), Object::I64(3));
    assert_eq!(eval("{ };"), Object::Unspecified);
}

#[test]
fn block_definitions_rewrite_into_let_form() {
    assert_eq!(eval("{ def a = 1; def b = 2; a + b }"), Object::I64(3));
    // The bound variable shadows an outer one only inside the block.
    let mut session = Session::new();
    session.execute("def a = 100;").expect("outer definition");
    assert_eq!(
        session.execute("{ def a = 1; a + 1 };").expect("block"),
        Object::I64(2)
    );
    assert_eq!(session.execute("a;").expect("outer read"), Object::I64(100));
}

#[test]
fn block_body_sees_outer_variables_through_the_let_lambda() {
    let mut session = Session::new();
    session.execute("def base = 10;").expect("definition");
    assert_eq!(
        session.execute("{ def offset = 5; base + offset };").expect("block"),
        Object::I64(15)
    );
}

#[test]
fn calling_a_non_function_fails() {
    // A variable with no static type defeats the parse-time check, so the
    // VM reports it.
    let mut session = Session::new();
    let err = session
        .execute("def f = lambda(x) x; f(1)(2);")
        .expect_err("calling an i64");
    assert!(matches!(err, SessionError::Vm(_)), "got {err:?}");
}

#[test]
fn wrong_arity_fails_at_runtime_for_untyped_callables() {
    let mut session = Session::new();
    let err = session
        .execute("def id = lambda(x) x; def call = lambda(f) f(1, 2); call(id);")
        .expect_err("arity mismatch");
    assert_eq!(
        err,
        SessionError::Vm(VmError::ArityMismatch {
            expected: 1,
            found: 2
        })
    );
}

#[test]
fn empty_argument_lists_parse_and_apply() {
    let mut session = Session::new();
    session.execute("def five = lambda() 5;").expect("definition");
    assert_eq!(session.execute("five();").expect("call"), Object::I64(5));
}
