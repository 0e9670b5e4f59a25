//! Expression-tree operations: visitors, layer transforms, free-variable
//! caching, binding validation, and type monotonicity.

use std::rc::Rc;

use schematika::{Expr, LangState, Literal, Reader, ReaderResult, TypeDescr};

fn parse_with(st: &mut LangState, reader: &mut Reader, src: &str) -> Rc<Expr> {
    match reader.read_expr(src, true, st) {
        ReaderResult::Expression(expr) => expr,
        other => panic!("expected an expression from {src:?}, got {other:?}"),
    }
}

fn fresh() -> (LangState, Reader) {
    let mut reader = Reader::new();
    reader.begin_interactive_session();
    (LangState::new(), reader)
}

#[test]
fn preorder_visits_parents_before_children() {
    let (mut st, mut reader) = fresh();
    let expr = parse_with(&mut st, &mut reader, "1 + 2 * 3;");
    let mut kinds = Vec::new();
    expr.visit_preorder(&mut |e| {
        kinds.push(match e {
            Expr::Apply(_) => "apply",
            Expr::Constant(_) => "constant",
            Expr::Primitive(_) => "primitive",
            _ => "other",
        });
    });
    assert_eq!(
        kinds,
        ["apply", "primitive", "constant", "apply", "primitive", "constant", "constant"]
    );
}

#[test]
fn layer_visits_only_immediate_children() {
    let (mut st, mut reader) = fresh();
    let expr = parse_with(&mut st, &mut reader, "1 + 2 * 3;");
    let mut n = 0;
    expr.visit_layer(&mut |_| n += 1);
    // Callee and two operands.
    assert_eq!(n, 3);
}

#[test]
fn transform_layer_rebuilds_with_replaced_children() {
    let (mut st, mut reader) = fresh();
    let expr = parse_with(&mut st, &mut reader, "1 + 2;");
    // A constant-folding-style pass: replace every child operand with 9.
    let transformed = expr.transform_layer(&mut |child| match &**child {
        Expr::Constant(_) => Expr::constant(Literal::I64(9)),
        _ => Rc::clone(child),
    });
    let Expr::Apply(a) = &*transformed else {
        panic!("transform should preserve the node kind");
    };
    for arg in &a.args {
        let Expr::Constant(c) = &**arg else {
            panic!("operand should still be a constant");
        };
        assert_eq!(c.literal, Literal::I64(9));
    }
    // The original is untouched.
    let Expr::Apply(orig) = &*expr else { unreachable!() };
    let Expr::Constant(c) = &*orig.args[0] else { unreachable!() };
    assert_eq!(c.literal, Literal::I64(1));
}

#[test]
fn free_variables_exclude_bound_parameters() {
    let (mut st, mut reader) = fresh();
    parse_with(&mut st, &mut reader, "def g = 1;");
    let lambda = parse_with(&mut st, &mut reader, "lambda(x : i64) x + g;");
    let free = lambda.free_variables();
    let g = st.strings.lookup("g").expect("g interned");
    let x = st.strings.lookup("x").expect("x interned");
    assert!(free.contains(&g));
    assert!(!free.contains(&x));
    // Cached: a second query returns the same set.
    let again = lambda.free_variables();
    assert!(Rc::ptr_eq(&free, &again));
}

#[test]
fn definitions_subtract_their_own_name() {
    let (mut st, mut reader) = fresh();
    parse_with(&mut st, &mut reader, "def f = lambda(n : i64) : i64 f(n);");
    // f occurs in its own rhs; the definition's free set must not
    // contain it.
    let define = parse_with(&mut st, &mut reader, "def g = lambda(n : i64) : i64 g(n);");
    let g = st.strings.lookup("g").expect("g interned");
    assert!(!define.free_variables().contains(&g));
}

#[test]
fn attach_envs_accepts_parser_output() {
    let (mut st, mut reader) = fresh();
    parse_with(&mut st, &mut reader, "def base = 10;");
    let expr = parse_with(&mut st, &mut reader, "{ def k = 5; base + k };");
    expr.attach_envs(&st.globals, &st.strings)
        .expect("parser-resolved bindings validate");
}

#[test]
fn value_types_are_set_at_most_once() {
    let (mut st, mut reader) = fresh();
    let define = parse_with(&mut st, &mut reader, "def x = 1;");
    let Expr::Define(d) = &*define else { panic!("expected a definition") };
    assert_eq!(d.lhs.value_type(), Some(TypeDescr::I64));
    // A later assignment attempt cannot change an established type.
    d.lhs.assign_value_type(TypeDescr::F64);
    assert_eq!(d.lhs.value_type(), Some(TypeDescr::I64));
}
