//! Conditional expressions: `if test then when-true [else when-false]`.
//!
//! When an `else` branch is present its type must agree with the true
//! branch's (when both are known); without one the conditional's type is
//! unknown and its value unspecified when the test fails. The terminator
//! that ends the conditional is not consumed here — it is handed up with
//! the finished expression, since it also ends the enclosing construct.

use std::rc::Rc;

use crate::{
    error::ParseError,
    expr::Expr,
    session::LangState,
    token::{Token, TokenKind},
};

use super::{
    super::parser::{Parser, illegal_channel, illegal_token},
    Emission, ExpectExprSsm, Flow, Ssm,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IfState {
    ExpectTest,
    ExpectThen,
    ExpectTrue,
    ExpectElseOrEnd,
    ExpectFalse,
    ExpectEnd,
}

#[derive(Debug)]
pub(crate) struct IfElseSsm {
    state: IfState,
    test: Option<Rc<Expr>>,
    when_true: Option<Rc<Expr>>,
    when_false: Option<Rc<Expr>>,
}

impl IfElseSsm {
    pub(crate) fn new() -> Self {
        Self {
            state: IfState::ExpectTest,
            test: None,
            when_true: None,
            when_false: None,
        }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        match self.state {
            IfState::ExpectTest | IfState::ExpectTrue | IfState::ExpectFalse => "expression",
            IfState::ExpectThen => "'then'",
            IfState::ExpectElseOrEnd => "'else' or ';'",
            IfState::ExpectEnd => "';'",
        }
    }

    fn finish(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        let test = self.test.take().expect("test recorded");
        let when_true = self.when_true.take().expect("true branch recorded");
        let when_false = self.when_false.take();
        if let Some(wf) = &when_false
            && let (Some(tt), Some(tf)) = (
                when_true.value_type(&st.types),
                wf.value_type(&st.types),
            )
            && tt != tf
        {
            p.capture_error(ParseError::Type {
                message: format!(
                    "if branches disagree: {} vs {}",
                    st.types.display(tt, &st.strings),
                    st.types.display(tf, &st.strings),
                ),
            });
            return Flow::Continue;
        }
        let expr = Expr::if_else(test, when_true, when_false);
        Flow::Emit(Emission::ExprWithToken(expr, tk.clone()))
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match (&tk.kind, self.state) {
            (TokenKind::Then, IfState::ExpectThen) => {
                self.state = IfState::ExpectTrue;
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::rhs()));
                Flow::Continue
            }
            (TokenKind::Else, IfState::ExpectElseOrEnd) => {
                self.state = IfState::ExpectFalse;
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::rhs()));
                Flow::Continue
            }
            (
                TokenKind::Semicolon
                | TokenKind::RightParen
                | TokenKind::RightBrace
                | TokenKind::Comma,
                IfState::ExpectElseOrEnd | IfState::ExpectEnd,
            ) => self.finish(tk, p, st),
            _ => illegal_token(p, "if_else", self.expect_str(), tk),
        }
    }

    pub(crate) fn on_parsed_expression(
        &mut self,
        expr: Rc<Expr>,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        match self.state {
            IfState::ExpectTest => {
                self.test = Some(expr);
                self.state = IfState::ExpectThen;
                Flow::Continue
            }
            IfState::ExpectTrue => {
                self.when_true = Some(expr);
                self.state = IfState::ExpectElseOrEnd;
                Flow::Continue
            }
            IfState::ExpectFalse => {
                self.when_false = Some(expr);
                self.state = IfState::ExpectEnd;
                Flow::Continue
            }
            _ => illegal_channel(p, "if_else", self.expect_str(), "parsed expression"),
        }
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
