//! Single-purpose resumable sub-parsers: symbols, type names, formal
//! parameters, and formal parameter lists.
//!
//! These exist so that, say, parsing a parameter list stays a tiny
//! automaton of its own instead of threading through the lambda machine.

use smallvec::SmallVec;

use crate::{
    arena::ArenaStr,
    error::ParseError,
    session::LangState,
    token::{Token, TokenKind},
    types::{TypeDescr, TypeTable},
};

use super::{
    super::parser::{Parser, illegal_channel, illegal_token},
    Emission, Flow, Formal, Ssm,
};

/// Accepts exactly one symbol token and hands it up interned.
#[derive(Debug, Default)]
pub(crate) struct ExpectSymbolSsm;

impl ExpectSymbolSsm {
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        "symbol"
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match &tk.kind {
            TokenKind::Symbol(text) => Flow::Emit(Emission::Symbol(st.strings.intern(text))),
            _ => illegal_token(p, "expect_symbol", self.expect_str(), tk),
        }
    }
}

/// Accepts one type name: a built-in, or a host-named opaque type.
#[derive(Debug, Default)]
pub(crate) struct ExpectTypeSsm;

impl ExpectTypeSsm {
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        "type"
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match &tk.kind {
            TokenKind::Symbol(text) => {
                let td = match TypeTable::builtin_by_name(text) {
                    Some(td) => td,
                    None => {
                        let name = st.strings.intern(text);
                        st.types.named(name)
                    }
                };
                Flow::Emit(Emission::TypeDescr(td))
            }
            _ => illegal_token(p, "expect_type", self.expect_str(), tk),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormalState {
    ExpectName,
    HaveName,
    ExpectTy,
    HaveTy,
}

/// Parses one `name [: type]` formal. The name text sits in the parser
/// arena until the formal commits, so abandoned parses never intern it.
#[derive(Debug)]
pub(crate) struct ExpectFormalArgSsm {
    state: FormalState,
    name: Option<ArenaStr>,
    ty: Option<TypeDescr>,
}

impl ExpectFormalArgSsm {
    pub(crate) fn new() -> Self {
        Self {
            state: FormalState::ExpectName,
            name: None,
            ty: None,
        }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        match self.state {
            FormalState::ExpectName => "parameter name or ')'",
            FormalState::HaveName => "':' or ',' or ')'",
            FormalState::ExpectTy => "type",
            FormalState::HaveTy => "',' or ')'",
        }
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match (&tk.kind, self.state) {
            (TokenKind::Symbol(text), FormalState::ExpectName) => {
                self.name = Some(p.arena_alloc(text));
                self.state = FormalState::HaveName;
                Flow::Continue
            }
            // An immediately closing paren means the list was empty; let
            // the list machine see the ')'.
            (TokenKind::RightParen, FormalState::ExpectName) => {
                Flow::Emit(Emission::Cancel(tk.clone()))
            }
            (TokenKind::Colon, FormalState::HaveName) => {
                self.state = FormalState::ExpectTy;
                p.push_ssm(Ssm::ExpectType(ExpectTypeSsm::new()));
                Flow::Continue
            }
            (TokenKind::Comma | TokenKind::RightParen, FormalState::HaveName | FormalState::HaveTy) => {
                let handle = self.name.expect("formal committed without a name");
                let name = st.strings.intern(p.arena_str(handle));
                Flow::Emit(Emission::Formal(
                    Formal { name, ty: self.ty },
                    tk.clone(),
                ))
            }
            _ => illegal_token(p, "expect_formal_arg", self.expect_str(), tk),
        }
    }

    pub(crate) fn on_parsed_typedescr(
        &mut self,
        td: TypeDescr,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        if self.state == FormalState::ExpectTy {
            self.ty = Some(td);
            self.state = FormalState::HaveTy;
            return Flow::Continue;
        }
        illegal_channel(p, "expect_formal_arg", self.expect_str(), "parsed type")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArglState {
    ExpectLParen,
    ExpectFormal,
    HaveFormal,
}

/// Parses `( formal, ... )`, accumulating the formals in order.
#[derive(Debug)]
pub(crate) struct ExpectFormalArglistSsm {
    state: ArglState,
    formals: SmallVec<[Formal; 4]>,
}

impl ExpectFormalArglistSsm {
    pub(crate) fn new() -> Self {
        Self {
            state: ArglState::ExpectLParen,
            formals: SmallVec::new(),
        }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        match self.state {
            ArglState::ExpectLParen => "'('",
            ArglState::ExpectFormal => "parameter",
            ArglState::HaveFormal => "',' or ')'",
        }
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, _st: &mut LangState) -> Flow {
        match (&tk.kind, self.state) {
            (TokenKind::LeftParen, ArglState::ExpectLParen) => {
                self.state = ArglState::ExpectFormal;
                p.push_ssm(Ssm::ExpectFormalArg(ExpectFormalArgSsm::new()));
                Flow::Continue
            }
            (TokenKind::RightParen, ArglState::ExpectFormal) if self.formals.is_empty() => {
                Flow::Emit(Emission::FormalArglist(self.formals.to_vec()))
            }
            (TokenKind::Comma, ArglState::HaveFormal) => {
                self.state = ArglState::ExpectFormal;
                p.push_ssm(Ssm::ExpectFormalArg(ExpectFormalArgSsm::new()));
                Flow::Continue
            }
            (TokenKind::RightParen, ArglState::HaveFormal) => {
                Flow::Emit(Emission::FormalArglist(self.formals.to_vec()))
            }
            _ => illegal_token(p, "expect_formal_arglist", self.expect_str(), tk),
        }
    }

    pub(crate) fn on_parsed_formal(
        &mut self,
        formal: Formal,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        if self.state != ArglState::ExpectFormal {
            return illegal_channel(p, "expect_formal_arglist", self.expect_str(), "parsed formal");
        }
        if self.formals.iter().any(|f| f.name == formal.name) {
            p.capture_error(ParseError::Type {
                message: format!(
                    "duplicate parameter name {}",
                    st.strings.resolve(formal.name)
                ),
            });
            return Flow::Continue;
        }
        self.formals.push(formal);
        self.state = ArglState::HaveFormal;
        Flow::Continue
    }
}
