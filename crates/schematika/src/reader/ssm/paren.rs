//! Parenthesized expression: `( expr )`. Delivers the inner expression
//! unchanged.

use std::rc::Rc;

use crate::{expr::Expr, session::LangState, token::{Token, TokenKind}};

use super::{
    super::parser::{Parser, illegal_channel, illegal_token},
    Emission, Flow,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParenState {
    ExpectInner,
    HaveInner,
}

#[derive(Debug)]
pub(crate) struct ParenSsm {
    state: ParenState,
    inner: Option<Rc<Expr>>,
}

impl ParenSsm {
    pub(crate) fn new() -> Self {
        Self {
            state: ParenState::ExpectInner,
            inner: None,
        }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        match self.state {
            ParenState::ExpectInner => "expression",
            ParenState::HaveInner => "')'",
        }
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, _st: &mut LangState) -> Flow {
        match (&tk.kind, self.state) {
            (TokenKind::RightParen, ParenState::HaveInner) => {
                let inner = self.inner.take().expect("inner expression recorded");
                Flow::Emit(Emission::Expr(inner))
            }
            _ => illegal_token(p, "paren", self.expect_str(), tk),
        }
    }

    pub(crate) fn on_parsed_expression(
        &mut self,
        expr: Rc<Expr>,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        if self.state == ParenState::ExpectInner {
            self.inner = Some(expr);
            self.state = ParenState::HaveInner;
            return Flow::Continue;
        }
        illegal_channel(p, "paren", self.expect_str(), "parsed expression")
    }

    pub(crate) fn on_parsed_expression_with_token(
        &mut self,
        expr: Rc<Expr>,
        tk: &Token,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        let flow = self.on_parsed_expression(expr, p, st);
        if p.result_is_error() {
            return flow;
        }
        self.on_token(tk, p, st)
    }
}
