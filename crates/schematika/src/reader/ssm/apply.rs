//! Function application: `fn ( arg, ... )`.
//!
//! Entered with the callee already parsed (the progress machine saw `(`
//! after an expression). Collects arguments, then performs the parse-time
//! checks: the callee must be function-typed if its type is known at all,
//! and known argument types must match the signature.

use std::rc::Rc;

use smallvec::SmallVec;

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
enum ApplyState {
    /// Callee in hand, '(' not yet seen.
    HaveFn,
    ExpectArg,
    HaveArg,
}

#[derive(Debug)]
pub(crate) struct ApplySsm {
    state: ApplyState,
    fn_expr: Rc<Expr>,
    args: SmallVec<[Rc<Expr>; 4]>,
}

impl ApplySsm {
    pub(crate) fn with_fn(fn_expr: Rc<Expr>) -> Self {
        Self {
            state: ApplyState::HaveFn,
            fn_expr,
            args: SmallVec::new(),
        }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        match self.state {
            ApplyState::HaveFn => "'('",
            ApplyState::ExpectArg => "expression or ')'",
            ApplyState::HaveArg => "',' or ')'",
        }
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match (&tk.kind, self.state) {
            (TokenKind::LeftParen, ApplyState::HaveFn) => {
                self.state = ApplyState::ExpectArg;
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::call_arg()));
                Flow::Continue
            }
            // `f()`: the dispatcher cancelled on ')' with no arguments in.
            (TokenKind::RightParen, ApplyState::ExpectArg) if self.args.is_empty() => {
                self.complete(p, st)
            }
            (TokenKind::Comma, ApplyState::HaveArg) => {
                self.state = ApplyState::ExpectArg;
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::rhs()));
                Flow::Continue
            }
            (TokenKind::RightParen, ApplyState::HaveArg) => self.complete(p, st),
            _ => illegal_token(p, "apply", self.expect_str(), tk),
        }
    }

    pub(crate) fn on_parsed_expression(
        &mut self,
        expr: Rc<Expr>,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        if self.state == ApplyState::ExpectArg {
            self.args.push(expr);
            self.state = ApplyState::HaveArg;
            return Flow::Continue;
        }
        illegal_channel(p, "apply", self.expect_str(), "parsed expression")
    }

    pub(crate) fn on_parsed_expression_with_token(
        &mut self,
        expr: Rc<Expr>,
        tk: &Token,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        if self.state != ApplyState::ExpectArg {
            return illegal_channel(p, "apply", self.expect_str(), "parsed expression");
        }
        // Empty argument lists arrive as the bare ')' token instead.
        self.args.push(expr);
        self.state = ApplyState::HaveArg;
        match &tk.kind {
            TokenKind::Comma => {
                self.state = ApplyState::ExpectArg;
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::rhs()));
                Flow::Continue
            }
            TokenKind::RightParen => self.complete(p, st),
            _ => illegal_token(p, "apply", "',' or ')'", tk),
        }
    }

    fn complete(&mut self, p: &mut Parser, st: &mut LangState) -> Flow {
        if let Some(fn_ty) = self.fn_expr.value_type(&st.types) {
            let Some(params) = st.types.param_types(fn_ty).map(<[_]>::to_vec) else {
                p.capture_error(ParseError::Type {
                    message: format!(
                        "cannot apply a value of type {}",
                        st.types.display(fn_ty, &st.strings)
                    ),
                });
                return Flow::Continue;
            };
            if params.len() != self.args.len() {
                p.capture_error(ParseError::Type {
                    message: format!(
                        "function expects {} argument(s), got {}",
                        params.len(),
                        self.args.len()
                    ),
                });
                return Flow::Continue;
            }
            for (i, (want, arg)) in params.iter().zip(self.args.iter()).enumerate() {
                if let Some(got) = arg.value_type(&st.types)
                    && got != *want
                {
                    p.capture_error(ParseError::Type {
                        message: format!(
                            "argument {} has type {}, expected {}",
                            i + 1,
                            st.types.display(got, &st.strings),
                            st.types.display(*want, &st.strings),
                        ),
                    });
                    return Flow::Continue;
                }
            }
        }
        let args = std::mem::take(&mut self.args).into_vec();
        let apply = Expr::apply(Rc::clone(&self.fn_expr), args);
        Flow::Emit(Emission::Expr(apply))
    }
}
