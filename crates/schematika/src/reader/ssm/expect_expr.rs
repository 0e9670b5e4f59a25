//! The expression dispatcher.
//!
//! Routes the first token of an expression to the machine for its
//! construct, or builds a constant / variable reference directly. Once a
//! primary expression is in hand, a progress frame is opened above this
//! machine so a following infix operator can join — except in operand
//! position, where the finished primary is delivered straight down to the
//! progress frame that requested it.

use std::rc::Rc;

use crate::{
    error::ParseError,
    expr::{Expr, Literal},
    session::LangState,
    token::{Token, TokenKind},
};

use super::{
    super::parser::{Parser, illegal_token},
    DefineSsm, Emission, ExpectFormalArglistSsm, ExpectSymbolSsm, Flow, IfElseSsm, LambdaSsm,
    ParenSsm, ProgressSsm, SequenceSsm, Ssm,
};

#[derive(Debug)]
pub(crate) struct ExpectExprSsm {
    /// May a `def` start here? Only inside braced blocks.
    allow_defs: bool,
    /// Is `}` a legitimate non-expression terminator here?
    cxl_on_rightbrace: bool,
    /// Is `)` a legitimate non-expression terminator here? Only for the
    /// first argument of a call, so `f()` parses.
    cxl_on_rightparen: bool,
    /// Is this the right operand of a pending infix operator? If so the
    /// finished primary is delivered directly instead of opening a new
    /// progress frame, so the next operator reaches the pending one.
    operand_position: bool,
}

impl ExpectExprSsm {
    /// An expression in ordinary (rhs/test/argument) position.
    pub(crate) fn rhs() -> Self {
        Self {
            allow_defs: false,
            cxl_on_rightbrace: false,
            cxl_on_rightparen: false,
            operand_position: false,
        }
    }

    /// The right operand of an infix operator.
    pub(crate) fn operand() -> Self {
        Self {
            allow_defs: false,
            cxl_on_rightbrace: false,
            cxl_on_rightparen: false,
            operand_position: true,
        }
    }

    /// An element of a braced block: definitions allowed, `}` cancels.
    pub(crate) fn in_block() -> Self {
        Self {
            allow_defs: true,
            cxl_on_rightbrace: true,
            cxl_on_rightparen: false,
            operand_position: false,
        }
    }

    /// The first argument of a call: `)` cancels, so `f()` parses.
    pub(crate) fn call_arg() -> Self {
        Self {
            allow_defs: false,
            cxl_on_rightbrace: false,
            cxl_on_rightparen: true,
            operand_position: false,
        }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        if self.allow_defs {
            "def, lambda, if, '(', '{', literal, or variable"
        } else {
            "lambda, if, '(', '{', literal, or variable"
        }
    }

    /// Wraps a finished primary according to position: operands go
    /// straight down, everything else waits for a possible operator.
    fn primary(&self, expr: Rc<Expr>, p: &mut Parser) -> Flow {
        if self.operand_position {
            Flow::Emit(Emission::Expr(expr))
        } else {
            p.push_ssm(Ssm::Progress(ProgressSsm::new(expr)));
            Flow::Continue
        }
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match &tk.kind {
            TokenKind::Symbol(text) => match p.lookup_varref(text, st) {
                Some(var) => self.primary(var, p),
                None => {
                    p.capture_error(ParseError::UnboundVariable {
                        name: text.clone(),
                    });
                    Flow::Continue
                }
            },
            TokenKind::Bool(v) => self.primary(Expr::constant(Literal::Bool(*v)), p),
            TokenKind::I64(v) => self.primary(Expr::constant(Literal::I64(*v)), p),
            TokenKind::F64(v) => self.primary(Expr::constant(Literal::F64(*v)), p),
            TokenKind::Str(s) => {
                self.primary(Expr::constant(Literal::Str(s.as_str().into())), p)
            }
            TokenKind::Lambda => {
                p.push_ssm(Ssm::Lambda(LambdaSsm::new()));
                p.push_ssm(Ssm::ExpectFormalArglist(ExpectFormalArglistSsm::new()));
                Flow::Continue
            }
            TokenKind::If => {
                p.push_ssm(Ssm::IfElse(IfElseSsm::new()));
                p.push_ssm(Ssm::ExpectExpr(Self::rhs()));
                Flow::Continue
            }
            TokenKind::LeftParen => {
                p.push_ssm(Ssm::Paren(ParenSsm::new()));
                p.push_ssm(Ssm::ExpectExpr(Self::rhs()));
                Flow::Continue
            }
            TokenKind::LeftBrace => {
                p.push_ssm(Ssm::Sequence(SequenceSsm::new()));
                p.push_ssm(Ssm::ExpectExpr(Self::in_block()));
                Flow::Continue
            }
            TokenKind::Def if self.allow_defs => {
                p.push_ssm(Ssm::Define(DefineSsm::new(false)));
                p.push_ssm(Ssm::ExpectSymbol(ExpectSymbolSsm::new()));
                Flow::Continue
            }
            TokenKind::RightBrace if self.cxl_on_rightbrace => {
                Flow::Emit(Emission::Cancel(tk.clone()))
            }
            TokenKind::RightParen if self.cxl_on_rightparen => {
                Flow::Emit(Emission::Cancel(tk.clone()))
            }
            _ => illegal_token(p, "expect_expr", self.expect_str(), tk),
        }
    }

    pub(crate) fn on_parsed_expression(
        &mut self,
        expr: Rc<Expr>,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        // Definitions are never operands; forward them for the enclosing
        // block to accumulate.
        if matches!(&*expr, Expr::Define(_)) || self.operand_position {
            return Flow::Emit(Emission::Expr(expr));
        }
        p.push_ssm(Ssm::Progress(ProgressSsm::new(expr)));
        Flow::Continue
    }

    pub(crate) fn on_parsed_expression_with_token(
        &mut self,
        expr: Rc<Expr>,
        tk: &Token,
        _p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        Flow::Emit(Emission::ExprWithToken(expr, tk.clone()))
    }
}
