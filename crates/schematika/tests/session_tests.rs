//! End-to-end session behavior: persistence across inputs, multi-result
//! execution, error recovery, and incremental line feeding.

use schematika::{Object, Session, SessionError};

#[test]
fn definition_then_reference() {
    let mut session = Session::new();
    let results = session.execute_all("def pi = 3.14; pi;").expect("run");
    assert_eq!(results.len(), 2, "two top-level results");
    // The definition's own result is the defined value.
    assert_eq!(results[0], Object::F64(3.14));
    assert_eq!(results[1], Object::F64(3.14));
}

#[test]
fn definitions_persist_across_execute_calls() {
    let mut session = Session::new();
    session.execute("def x = 41;").expect("definition");
    assert_eq!(session.execute("x + 1;").expect("reference"), Object::I64(42));
}

#[test]
fn redefinition_keeps_the_slot_and_updates_the_value() {
    let mut session = Session::new();
    session.execute("def x = 1;").expect("first definition");
    session.execute("def double = lambda(unused : i64) x + x;").expect("closure");
    session.execute("def x = 21;").expect("redefinition");
    // The closure reads the global slot, so it sees the new value.
    assert_eq!(session.execute("double(0);").expect("call"), Object::I64(42));
}

#[test]
fn square_function_scenario() {
    let mut session = Session::new();
    let result = session
        .execute("def sq = lambda(x : f64) : f64 x * x; sq(4.0);")
        .expect("run");
    assert_eq!(result, Object::F64(16.0));
}

#[test]
fn factorial_scenario() {
    let mut session = Session::new();
    let result = session
        .execute("def fact = lambda(n : i64) : i64 if n == 0 then 1 else n * fact(n - 1); fact(5);")
        .expect("run");
    assert_eq!(result, Object::I64(120));
}

#[test]
fn block_scenario() {
    let mut session = Session::new();
    let result = session.execute("{ def a = 1; def b = 2; a + b }").expect("run");
    assert_eq!(result, Object::I64(3));
}

#[test]
fn type_error_then_recovery_scenario() {
    let mut session = Session::new();
    let err = session
        .execute("def x = 1; x + \"hello\";")
        .expect_err("type error");
    assert!(matches!(err, SessionError::Parse(_)), "got {err:?}");
    // The session stays usable after the reader resets.
    assert_eq!(session.execute("def y = 2; y;").expect("recovery"), Object::I64(2));
}

#[test]
fn runtime_error_keeps_session_usable() {
    let mut session = Session::new();
    assert!(session.execute("1 / 0;").is_err());
    assert_eq!(session.execute("1 / 1;").expect("recovery"), Object::I64(1));
}

#[test]
fn incremental_lines_with_continuation() {
    let mut session = Session::new();
    assert_eq!(session.feed_line("def x =\n").expect("feed"), vec![]);
    assert!(session.needs_more_input());
    let results = session.feed_line("42; x;\n").expect("feed");
    assert_eq!(results, vec![Object::I64(42), Object::I64(42)]);
    assert!(!session.needs_more_input());
}

#[test]
fn finish_input_accepts_trailing_expression_without_semicolon() {
    let mut session = Session::new();
    assert_eq!(session.feed_line("1 + 2").expect("feed"), vec![]);
    assert_eq!(session.finish_input().expect("finish"), vec![Object::I64(3)]);
}

#[test]
fn batch_sessions_only_define() {
    let mut session = Session::batch();
    session.execute("def pi = 3.14;").expect("definition allowed");
    assert!(session.execute("pi;").is_err(), "bare expression rejected");
}

#[test]
fn printed_objects_render_like_source() {
    let mut session = Session::new();
    assert_eq!(session.execute("3.14;").expect("run").to_string(), "3.14");
    assert_eq!(session.execute("16.0;").expect("run").to_string(), "16.0");
    assert_eq!(session.execute("true;").expect("run").to_string(), "true");
    assert_eq!(
        session.execute("\"hi\";").expect("run").to_string(),
        "\"hi\""
    );
}

#[test]
fn closures_cross_the_boundary_by_name() {
    let mut session = Session::new();
    let result = session.execute("def sq(x : i64) : i64 { x * x } sq;").expect("run");
    assert_eq!(result, Object::Closure { name: "sq".to_owned() });
}
