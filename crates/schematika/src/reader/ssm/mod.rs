//! The syntax state machines, one per grammatical construct.
//!
//! Every SSM is a small finite automaton. The [`Ssm`] enum is the closed
//! family; dispatch is a match, per the tagged-variant rendition of the
//! original open dispatch tables. A handler returns a [`Flow`] telling the
//! parser what became of the machine: it survives (possibly with children
//! pushed above it), it is replaced wholesale, or it completed and emits a
//! product through one of the callback channels in [`Emission`].

mod apply;
mod define;
mod expect;
mod expect_expr;
mod ifelse;
mod lambda;
mod paren;
mod progress;
mod sequence;
mod toplevel;

pub(crate) use apply::ApplySsm;
pub(crate) use define::DefineSsm;
pub(crate) use expect::{ExpectFormalArgSsm, ExpectFormalArglistSsm, ExpectSymbolSsm, ExpectTypeSsm};
pub(crate) use expect_expr::ExpectExprSsm;
pub(crate) use ifelse::IfElseSsm;
pub(crate) use lambda::LambdaSsm;
pub(crate) use paren::ParenSsm;
pub(crate) use progress::ProgressSsm;
pub(crate) use sequence::SequenceSsm;
pub(crate) use toplevel::ToplevelSeqSsm;

use std::rc::Rc;

use strum::IntoStaticStr;

use crate::{
    expr::Expr,
    intern::USym,
    session::LangState,
    token::Token,
    types::TypeDescr,
};

use super::parser::{Parser, illegal_channel};

/// A parsed formal parameter, possibly annotated.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Formal {
    pub name: USym,
    pub ty: Option<TypeDescr>,
}

/// A completed SSM's product, delivered to the machine beneath it.
#[derive(Debug)]
pub(crate) enum Emission {
    /// A finished expression; the terminator (if any) was consumed.
    Expr(Rc<Expr>),
    /// A finished expression together with the token that ended it, for
    /// the parent to act on (`;`, `,`, `)`, `}`, `then`, `else`).
    ExprWithToken(Rc<Expr>, Token),
    Symbol(USym),
    TypeDescr(TypeDescr),
    /// A formal parameter plus its trailing `,` or `)`.
    Formal(Formal, Token),
    FormalArglist(Vec<Formal>),
    /// Popped without a product; the token is re-delivered to the parent.
    Cancel(Token),
}

/// What the dispatcher should do with the SSM after a handler ran.
#[derive(Debug)]
pub(crate) enum Flow {
    /// Keep this machine (children the handler pushed sit above it).
    Continue,
    /// Keep this machine, then feed the token to the new stack top.
    ContinueAndRedeliver(Token),
    /// This machine is done; push these in its place.
    Replace(Vec<Ssm>),
    /// As `Replace`, then feed the token to the new stack top.
    ReplaceAndRedeliver(Vec<Ssm>, Token),
    /// This machine completed; deliver its product below.
    Emit(Emission),
}

/// One stacked syntax state machine.
#[derive(Debug, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum Ssm {
    ToplevelSeq(ToplevelSeqSsm),
    Define(DefineSsm),
    Lambda(LambdaSsm),
    IfElse(IfElseSsm),
    Sequence(SequenceSsm),
    Apply(ApplySsm),
    Progress(ProgressSsm),
    Paren(ParenSsm),
    ExpectExpr(ExpectExprSsm),
    ExpectSymbol(ExpectSymbolSsm),
    ExpectType(ExpectTypeSsm),
    ExpectFormalArg(ExpectFormalArgSsm),
    ExpectFormalArglist(ExpectFormalArglistSsm),
}

impl Ssm {
    /// Static machine name for diagnostics.
    pub(crate) fn kind_name(&self) -> &'static str {
        self.into()
    }

    /// What this machine is prepared to accept right now.
    pub(crate) fn expect_str(&self) -> &'static str {
        match self {
            Self::ToplevelSeq(s) => s.expect_str(),
            Self::Define(s) => s.expect_str(),
            Self::Lambda(s) => s.expect_str(),
            Self::IfElse(s) => s.expect_str(),
            Self::Sequence(s) => s.expect_str(),
            Self::Apply(s) => s.expect_str(),
            Self::Progress(s) => s.expect_str(),
            Self::Paren(s) => s.expect_str(),
            Self::ExpectExpr(s) => s.expect_str(),
            Self::ExpectSymbol(s) => s.expect_str(),
            Self::ExpectType(s) => s.expect_str(),
            Self::ExpectFormalArg(s) => s.expect_str(),
            Self::ExpectFormalArglist(s) => s.expect_str(),
        }
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match self {
            Self::ToplevelSeq(s) => s.on_token(tk, p, st),
            Self::Define(s) => s.on_token(tk, p, st),
            Self::Lambda(s) => s.on_token(tk, p, st),
            Self::IfElse(s) => s.on_token(tk, p, st),
            Self::Sequence(s) => s.on_token(tk, p, st),
            Self::Apply(s) => s.on_token(tk, p, st),
            Self::Progress(s) => s.on_token(tk, p, st),
            Self::Paren(s) => s.on_token(tk, p, st),
            Self::ExpectExpr(s) => s.on_token(tk, p, st),
            Self::ExpectSymbol(s) => s.on_token(tk, p, st),
            Self::ExpectType(s) => s.on_token(tk, p, st),
            Self::ExpectFormalArg(s) => s.on_token(tk, p, st),
            Self::ExpectFormalArglist(s) => s.on_token(tk, p, st),
        }
    }

    pub(crate) fn on_parsed_symbol(&mut self, sym: USym, p: &mut Parser, st: &mut LangState) -> Flow {
        match self {
            Self::Define(s) => s.on_parsed_symbol(sym, p, st),
            other => illegal_channel(p, other.kind_name(), other.expect_str(), "parsed symbol"),
        }
    }

    pub(crate) fn on_parsed_typedescr(
        &mut self,
        td: TypeDescr,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        match self {
            Self::Define(s) => s.on_parsed_typedescr(td, p, st),
            Self::Lambda(s) => s.on_parsed_typedescr(td, p, st),
            Self::ExpectFormalArg(s) => s.on_parsed_typedescr(td, p, st),
            other => illegal_channel(p, other.kind_name(), other.expect_str(), "parsed type"),
        }
    }

    pub(crate) fn on_parsed_formal(
        &mut self,
        formal: Formal,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        match self {
            Self::ExpectFormalArglist(s) => s.on_parsed_formal(formal, p, st),
            other => illegal_channel(p, other.kind_name(), other.expect_str(), "parsed formal"),
        }
    }

    pub(crate) fn on_parsed_formal_arglist(
        &mut self,
        formals: Vec<Formal>,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        match self {
            Self::Define(s) => s.on_parsed_formal_arglist(formals, p, st),
            Self::Lambda(s) => s.on_parsed_formal_arglist(formals, p, st),
            other => {
                illegal_channel(p, other.kind_name(), other.expect_str(), "parsed formal list")
            }
        }
    }

    pub(crate) fn on_parsed_expression(
        &mut self,
        expr: Rc<Expr>,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        match self {
            Self::ToplevelSeq(s) => s.on_parsed_expression(expr, p, st),
            Self::Define(s) => s.on_parsed_expression(expr, p, st),
            Self::Lambda(s) => s.on_parsed_expression(expr, p, st),
            Self::IfElse(s) => s.on_parsed_expression(expr, p, st),
            Self::Sequence(s) => s.on_parsed_expression(expr, p, st),
            Self::Apply(s) => s.on_parsed_expression(expr, p, st),
            Self::Progress(s) => s.on_parsed_expression(expr, p, st),
            Self::Paren(s) => s.on_parsed_expression(expr, p, st),
            Self::ExpectExpr(s) => s.on_parsed_expression(expr, p, st),
            other => illegal_channel(p, other.kind_name(), other.expect_str(), "parsed expression"),
        }
    }

    pub(crate) fn on_parsed_expression_with_token(
        &mut self,
        expr: Rc<Expr>,
        tk: &Token,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        match self {
            Self::ToplevelSeq(s) => s.on_parsed_expression_with_token(expr, tk, p, st),
            Self::Define(s) => s.on_parsed_expression_with_token(expr, tk, p, st),
            Self::Lambda(s) => s.on_parsed_expression_with_token(expr, tk, p, st),
            Self::IfElse(s) => s.on_parsed_expression_with_token(expr, tk, p, st),
            Self::Sequence(s) => s.on_parsed_expression_with_token(expr, tk, p, st),
            Self::Apply(s) => s.on_parsed_expression_with_token(expr, tk, p, st),
            Self::Progress(s) => s.on_parsed_expression_with_token(expr, tk, p, st),
            Self::Paren(s) => s.on_parsed_expression_with_token(expr, tk, p, st),
            Self::ExpectExpr(s) => s.on_parsed_expression_with_token(expr, tk, p, st),
            other => {
                illegal_channel(p, other.kind_name(), other.expect_str(), "parsed expression")
            }
        }
    }
}
