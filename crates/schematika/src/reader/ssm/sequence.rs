//! Braced expression sequences, and the definition-to-let rewrite.
//!
//! A block accumulates expressions until `}`. Each definition inside the
//! block opens a fresh one-variable scope, so references in the trailing
//! expressions resolve against it; at `}` the accumulated list is rewritten
//! so every definition becomes an application of a lambda:
//!
//! ```text
//! { def a = rhs; rest... }   =>   { (lambda(a) rest...)(rhs) }
//! ```
//!
//! The rewritten tree creates exactly the environments the recorded scopes
//! promised, so link depths line up, and the block stays referentially
//! transparent.

use std::rc::Rc;

use crate::{
    expr::{Expr, LambdaDef},
    session::LangState,
    symtab::LocalSymtab,
    token::{Token, TokenKind},
};

use super::{
    super::parser::{Parser, illegal_channel, illegal_token},
    Emission, ExpectExprSsm, Flow, Ssm,
};

#[derive(Debug)]
pub(crate) struct SequenceSsm {
    /// Accumulated elements, each with the scope its definition opened.
    items: Vec<(Rc<Expr>, Option<Rc<LocalSymtab>>)>,
}

impl SequenceSsm {
    pub(crate) fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        "expression, ';', or '}'"
    }

    fn accumulate(&mut self, expr: Rc<Expr>, p: &mut Parser) {
        let scope = if let Expr::Define(d) = &*expr {
            let symtab =
                LocalSymtab::from_vars(vec![Rc::clone(&d.lhs)], p.current_scope().cloned());
            p.push_scope(Rc::clone(&symtab));
            Some(symtab)
        } else {
            None
        };
        self.items.push((expr, scope));
    }

    fn finalize(&mut self, p: &mut Parser, st: &mut LangState) -> Flow {
        for (_, scope) in &self.items {
            if scope.is_some() {
                p.pop_scope();
            }
        }
        let expr = rewrite(&self.items, st);
        Flow::Emit(Emission::Expr(expr))
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match &tk.kind {
            TokenKind::RightBrace => self.finalize(p, st),
            TokenKind::Semicolon => {
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::in_block()));
                Flow::Continue
            }
            _ => illegal_token(p, "sequence", self.expect_str(), tk),
        }
    }

    pub(crate) fn on_parsed_expression(
        &mut self,
        expr: Rc<Expr>,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        self.accumulate(expr, p);
        p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::in_block()));
        Flow::Continue
    }

    pub(crate) fn on_parsed_expression_with_token(
        &mut self,
        expr: Rc<Expr>,
        tk: &Token,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        self.accumulate(expr, p);
        match &tk.kind {
            TokenKind::Semicolon => {
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::in_block()));
                Flow::Continue
            }
            TokenKind::RightBrace => self.finalize(p, st),
            _ => illegal_channel(p, "sequence", self.expect_str(), "terminated expression"),
        }
    }
}

/// The definition-to-let rewrite over an accumulated element list.
fn rewrite(items: &[(Rc<Expr>, Option<Rc<LocalSymtab>>)], st: &mut LangState) -> Rc<Expr> {
    for (i, (expr, scope)) in items.iter().enumerate() {
        if let Expr::Define(d) = &**expr {
            let body = rewrite(&items[i + 1..], st);
            let symtab = scope.clone().expect("definition recorded with its scope");
            let signature = match (d.lhs.value_type(), body.value_type(&st.types)) {
                (Some(param), Some(ret)) => Some(st.types.function(&[param], ret)),
                _ => None,
            };
            let lambda = LambdaDef::new(
                st.strings.gensym("let"),
                vec![Rc::clone(&d.lhs)],
                symtab,
                body,
                signature,
            );
            let apply = Expr::apply(Expr::lambda(lambda), vec![Rc::clone(&d.rhs)]);
            if i == 0 {
                return apply;
            }
            let mut exprs: Vec<Rc<Expr>> =
                items[..i].iter().map(|(e, _)| Rc::clone(e)).collect();
            exprs.push(apply);
            return Expr::sequence(exprs);
        }
    }
    Expr::sequence(items.iter().map(|(e, _)| Rc::clone(e)).collect())
}
