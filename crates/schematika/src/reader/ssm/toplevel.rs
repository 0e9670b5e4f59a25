//! The top-level expression sequence.
//!
//! Always the bottom of the parser stack. Interactive sessions accept any
//! expression and publish each finished one as the parser's result; batch
//! sessions accept only definition forms. The global symbol table survives
//! across results — only per-expression state clears.

use std::rc::Rc;

use crate::{
    error::ParseError,
    expr::{Expr, Literal},
    session::LangState,
    token::{Token, TokenKind},
};

use super::{
    super::parser::{Parser, SessionMode, illegal_channel, illegal_token},
    DefineSsm, ExpectExprSsm, ExpectFormalArglistSsm, ExpectSymbolSsm, Flow, IfElseSsm,
    LambdaSsm, ParenSsm, ProgressSsm, SequenceSsm, Ssm,
};

#[derive(Debug)]
pub(crate) struct ToplevelSeqSsm {
    mode: SessionMode,
}

impl ToplevelSeqSsm {
    pub(crate) fn new(mode: SessionMode) -> Self {
        Self { mode }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        match self.mode {
            SessionMode::Interactive => "def or expression",
            SessionMode::Batch => "def",
        }
    }

    fn interactive(&self) -> bool {
        self.mode == SessionMode::Interactive
    }

    /// Starts a definition. The stack is empty here (this machine is
    /// detached while its handler runs), which is exactly the top-level
    /// condition the define machine wants to know about.
    fn start_define(p: &mut Parser) -> Flow {
        let at_toplevel = p.depth() == 0;
        p.push_ssm(Ssm::Define(DefineSsm::new(at_toplevel)));
        p.push_ssm(Ssm::ExpectSymbol(ExpectSymbolSsm::new()));
        Flow::Continue
    }

    fn start_progress(expr: Rc<Expr>, p: &mut Parser) -> Flow {
        p.push_ssm(Ssm::Progress(ProgressSsm::new(expr)));
        Flow::Continue
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match &tk.kind {
            TokenKind::Def => Self::start_define(p),
            // Stray separators between top-level forms are harmless.
            TokenKind::Semicolon => Flow::Continue,
            TokenKind::Symbol(text) if self.interactive() => match p.lookup_varref(text, st) {
                Some(var) => Self::start_progress(var, p),
                None => {
                    p.capture_error(ParseError::UnboundVariable { name: text.clone() });
                    Flow::Continue
                }
            },
            TokenKind::Bool(v) if self.interactive() => {
                Self::start_progress(Expr::constant(Literal::Bool(*v)), p)
            }
            TokenKind::I64(v) if self.interactive() => {
                Self::start_progress(Expr::constant(Literal::I64(*v)), p)
            }
            TokenKind::F64(v) if self.interactive() => {
                Self::start_progress(Expr::constant(Literal::F64(*v)), p)
            }
            TokenKind::Str(s) if self.interactive() => {
                Self::start_progress(Expr::constant(Literal::Str(s.as_str().into())), p)
            }
            TokenKind::Lambda if self.interactive() => {
                p.push_ssm(Ssm::Lambda(LambdaSsm::new()));
                p.push_ssm(Ssm::ExpectFormalArglist(ExpectFormalArglistSsm::new()));
                Flow::Continue
            }
            TokenKind::If if self.interactive() => {
                p.push_ssm(Ssm::IfElse(IfElseSsm::new()));
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::rhs()));
                Flow::Continue
            }
            TokenKind::LeftParen if self.interactive() => {
                p.push_ssm(Ssm::Paren(ParenSsm::new()));
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::rhs()));
                Flow::Continue
            }
            TokenKind::LeftBrace if self.interactive() => {
                p.push_ssm(Ssm::Sequence(SequenceSsm::new()));
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::in_block()));
                Flow::Continue
            }
            _ => illegal_token(p, "toplevel_seq", self.expect_str(), tk),
        }
    }

    pub(crate) fn on_parsed_expression(
        &mut self,
        expr: Rc<Expr>,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        // Definitions publish as they complete; anything else might still
        // be followed by an infix operator.
        if matches!(&*expr, Expr::Define(_)) {
            p.capture_result(expr);
            return Flow::Continue;
        }
        Self::start_progress(expr, p)
    }

    pub(crate) fn on_parsed_expression_with_token(
        &mut self,
        expr: Rc<Expr>,
        tk: &Token,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        match &tk.kind {
            TokenKind::Semicolon => {
                p.capture_result(expr);
                Flow::Continue
            }
            _ => illegal_channel(p, "toplevel_seq", "';'", "terminated expression"),
        }
    }
}
