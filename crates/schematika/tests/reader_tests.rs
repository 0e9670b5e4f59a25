//! Reader behavior: incremental input, operator precedence, error
//! reporting, and canonical-print round trips, driven through the public
//! `Reader` API with a standalone `LangState`.

use std::rc::Rc;

use schematika::{
    Expr, LangState, ParseError, Primitive, Reader, ReaderResult, Session, TypeDescr,
};

fn parse_one(src: &str) -> (Rc<Expr>, LangState) {
    let mut st = LangState::new();
    let mut reader = Reader::new();
    reader.begin_interactive_session();
    match reader.read_expr(src, true, &mut st) {
        ReaderResult::Expression(expr) => (expr, st),
        other => panic!("expected an expression from {src:?}, got {other:?}"),
    }
}

fn parse_error(src: &str) -> ParseError {
    let mut st = LangState::new();
    let mut reader = Reader::new();
    reader.begin_interactive_session();
    match reader.read_expr(src, true, &mut st) {
        ReaderResult::Error(e) => e,
        other => panic!("expected an error from {src:?}, got {other:?}"),
    }
}

/// Unwraps an infix application into its primitive and operands.
fn as_infix(expr: &Expr) -> (Primitive, &Expr, &Expr) {
    let Expr::Apply(a) = expr else {
        panic!("expected an application, got {expr:?}");
    };
    let Expr::Primitive(p) = &*a.fn_expr else {
        panic!("expected a primitive callee, got {:?}", a.fn_expr);
    };
    assert_eq!(a.args.len(), 2, "infix application has two operands");
    (*p, &a.args[0], &a.args[1])
}

#[test]
fn multiplication_binds_tighter_on_the_right() {
    // 1 + 2 * 3 parses as 1 + (2 * 3)
    let (expr, _) = parse_one("1 + 2 * 3;");
    let (op, lhs, rhs) = as_infix(&expr);
    assert_eq!(op, Primitive::AddI64);
    assert!(matches!(lhs, Expr::Constant(_)));
    let (inner, _, _) = as_infix(rhs);
    assert_eq!(inner, Primitive::MulI64);
}

#[test]
fn multiplication_binds_tighter_on_the_left() {
    // 1 * 2 + 3 parses as (1 * 2) + 3
    let (expr, _) = parse_one("1 * 2 + 3;");
    let (op, lhs, rhs) = as_infix(&expr);
    assert_eq!(op, Primitive::AddI64);
    let (inner, _, _) = as_infix(lhs);
    assert_eq!(inner, Primitive::MulI64);
    assert!(matches!(rhs, Expr::Constant(_)));
}

#[test]
fn comparison_is_loosest() {
    // 1 + 2 < 3 * 4 parses as (1 + 2) < (3 * 4)
    let (expr, _) = parse_one("1 + 2 < 3 * 4;");
    let (op, lhs, rhs) = as_infix(&expr);
    assert_eq!(op, Primitive::CmpLtI64);
    assert_eq!(as_infix(lhs).0, Primitive::AddI64);
    assert_eq!(as_infix(rhs).0, Primitive::MulI64);
}

#[test]
fn parentheses_override_precedence() {
    let (expr, _) = parse_one("(1 + 2) * 3;");
    let (op, lhs, _) = as_infix(&expr);
    assert_eq!(op, Primitive::MulI64);
    assert_eq!(as_infix(lhs).0, Primitive::AddI64);
}

#[test]
fn if_without_else_has_no_type() {
    let (expr, st) = parse_one("if true then 1;");
    let Expr::IfElse(i) = &*expr else {
        panic!("expected a conditional, got {expr:?}");
    };
    assert!(i.when_false.is_none());
    assert_eq!(expr.value_type(&st.types), None);
}

#[test]
fn if_with_else_takes_branch_type() {
    let (expr, st) = parse_one("if true then 1 else 2;");
    assert_eq!(expr.value_type(&st.types), Some(TypeDescr::I64));
}

#[test]
fn empty_input_is_none_never_error() {
    let mut st = LangState::new();
    let mut reader = Reader::new();
    reader.begin_interactive_session();
    assert!(matches!(reader.read_expr("", true, &mut st), ReaderResult::None));
    assert!(matches!(reader.read_expr("   \n", true, &mut st), ReaderResult::None));
}

#[test]
fn expression_at_eof_without_semicolon_is_accepted() {
    let (expr, _) = parse_one("1 + 2");
    assert_eq!(as_infix(&expr).0, Primitive::AddI64);
}

#[test]
fn incomplete_input_reports_none_until_more_arrives() {
    let mut st = LangState::new();
    let mut reader = Reader::new();
    reader.begin_interactive_session();
    assert!(matches!(
        reader.read_expr("def x = ", false, &mut st),
        ReaderResult::None
    ));
    assert!(reader.has_incomplete_expr());
    let ReaderResult::Expression(_) = reader.read_expr("42;", false, &mut st) else {
        panic!("continuation should complete the definition");
    };
}

#[test]
fn mixed_operand_types_are_a_parse_error() {
    assert!(matches!(parse_error("1 + 2.0;"), ParseError::Type { .. }));
}

#[test]
fn string_plus_integer_is_a_parse_error() {
    assert!(matches!(parse_error("1 + \"hello\";"), ParseError::Type { .. }));
}

#[test]
fn mismatched_branches_are_a_parse_error() {
    assert!(matches!(
        parse_error("if true then 1 else 2.0;"),
        ParseError::Type { .. }
    ));
}

#[test]
fn unbound_variable_is_reported() {
    let ParseError::UnboundVariable { name } = parse_error("nope;") else {
        panic!("expected an unbound-variable error");
    };
    assert_eq!(name, "nope");
}

#[test]
fn syntax_error_names_the_rejecting_machine() {
    let ParseError::Syntax { ssm, expected, .. } = parse_error("def 42") else {
        panic!("expected a syntax error");
    };
    assert_eq!(ssm, "expect_symbol");
    assert_eq!(expected, "symbol");
}

#[test]
fn batch_sessions_reject_bare_expressions() {
    let mut st = LangState::new();
    let mut reader = Reader::new();
    reader.begin_batch_session();
    let ReaderResult::Error(ParseError::Syntax { ssm, .. }) =
        reader.read_expr("1 + 2;", true, &mut st)
    else {
        panic!("batch mode should reject a bare expression");
    };
    assert_eq!(ssm, "toplevel_seq");
}

#[test]
fn batch_sessions_accept_definitions() {
    let mut st = LangState::new();
    let mut reader = Reader::new();
    reader.begin_batch_session();
    let ReaderResult::Expression(expr) = reader.read_expr("def pi = 3.14;", true, &mut st)
    else {
        panic!("batch mode should accept a definition");
    };
    assert!(matches!(&*expr, Expr::Define(_)));
}

#[test]
fn reset_after_error_recovers_and_is_idempotent() {
    let mut st = LangState::new();
    let mut reader = Reader::new();
    reader.begin_interactive_session();
    assert!(matches!(
        reader.read_expr("def 42", true, &mut st),
        ReaderResult::Error(_)
    ));
    reader.reset_to_idle_toplevel();
    let depth = reader.parser_depth();
    let used = reader.parser_arena_used();
    reader.reset_to_idle_toplevel();
    assert_eq!(reader.parser_depth(), depth);
    assert_eq!(reader.parser_arena_used(), used);
    // The reader still works afterward.
    let ReaderResult::Expression(_) = reader.read_expr("def y = 2;", true, &mut st) else {
        panic!("reader should work after reset");
    };
}

#[test]
fn parser_stack_and_arena_return_to_idle_after_each_expression() {
    let mut st = LangState::new();
    let mut reader = Reader::new();
    reader.begin_interactive_session();
    let idle_used = reader.parser_arena_used();
    // Formal-argument names pass through the parser arena while the
    // lambda is in flight; all of it must be reclaimed by completion.
    let ReaderResult::Expression(_) =
        reader.read_expr("def sq = lambda(x : f64) : f64 x * x;", true, &mut st)
    else {
        panic!("definition should parse");
    };
    assert_eq!(reader.parser_depth(), 1);
    assert_eq!(reader.parser_arena_used(), idle_used);
}

#[test]
fn canonical_print_reparses_to_the_same_print() {
    for src in [
        "1 + 2 * 3;",
        "1 * 2 + 3;",
        "(1 + 2) * (3 - 4);",
        "def pi = 3.14;",
        "def sq = lambda(x : f64) : f64 x * x;",
        "if 1 < 2 then 10 else 20;",
        "{ 1; 2; 3 };",
    ] {
        let (expr, st) = parse_one(src);
        let printed = expr.to_source(&st.strings, &st.types);
        let (reparsed, st2) = parse_one(&format!("{printed};"));
        let printed2 = reparsed.to_source(&st2.strings, &st2.types);
        assert_eq!(printed, printed2, "round trip diverged for {src:?}");
    }
}

#[test]
fn session_survives_parse_errors() {
    let mut session = Session::new();
    assert!(session.execute("def x = 1; x + \"hello\";").is_err());
    let result = session.execute("def y = 2; y;").expect("session recovers");
    assert_eq!(result, schematika::Object::I64(2));
}
