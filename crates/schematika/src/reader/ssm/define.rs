//! Definitions.
//!
//! Two surface forms share this machine:
//!
//! ```text
//! def name [: type] = expr ;
//! def name ( formal, ... ) [: type] { body... }
//! ```
//!
//! The second desugars to a definition whose right-hand side is a lambda
//! named after the variable. The first time a top-level definition learns
//! its name, the variable is upserted into the global symbol table
//! immediately, so the body of a recursive function can already refer to
//! the symbol being defined.

use std::rc::Rc;

use crate::{
    error::ParseError,
    expr::{Expr, LambdaDef, VarDef},
    intern::USym,
    session::LangState,
    symtab::LocalSymtab,
    token::{Token, TokenKind},
    types::TypeDescr,
};

use super::{
    super::parser::{Parser, illegal_channel, illegal_token},
    Emission, ExpectExprSsm, ExpectFormalArglistSsm, ExpectTypeSsm, Flow, Formal, SequenceSsm,
    Ssm,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefState {
    /// `def` seen, symbol parser pushed.
    ExpectName,
    HaveName,
    ExpectType,
    HaveType,
    ExpectRhs,
    ExpectSemicolon,
    /// Function form: formal list being parsed.
    FnArglist,
    FnAfterArgs,
    FnExpectRet,
    FnHaveRet,
    FnBody,
}

#[derive(Debug)]
pub(crate) struct DefineSsm {
    state: DefState,
    at_toplevel: bool,
    lhs: Option<Rc<VarDef>>,
    declared: Option<TypeDescr>,
    rhs: Option<Rc<Expr>>,
    fn_params: Vec<Rc<VarDef>>,
    fn_symtab: Option<Rc<LocalSymtab>>,
    fn_ret: Option<TypeDescr>,
}

impl DefineSsm {
    pub(crate) fn new(at_toplevel: bool) -> Self {
        Self {
            state: DefState::ExpectName,
            at_toplevel,
            lhs: None,
            declared: None,
            rhs: None,
            fn_params: Vec::new(),
            fn_symtab: None,
            fn_ret: None,
        }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        match self.state {
            DefState::ExpectName => "symbol",
            DefState::HaveName => "':', '=', or '('",
            DefState::ExpectType | DefState::FnExpectRet => "type",
            DefState::HaveType => "'='",
            DefState::ExpectRhs | DefState::FnBody => "expression",
            DefState::ExpectSemicolon => "';'",
            DefState::FnArglist => "formal argument list",
            DefState::FnAfterArgs => "':' or '{'",
            DefState::FnHaveRet => "'{'",
        }
    }

    /// True while the right-hand side expression is being parsed; used by
    /// the lambda machine's signature propagation.
    pub(crate) fn awaiting_rhs(&self) -> bool {
        self.state == DefState::ExpectRhs
    }

    /// Gives the defined variable a type if it has none yet.
    pub(crate) fn propagate_lhs_type(&self, td: TypeDescr) {
        if let Some(lhs) = &self.lhs {
            lhs.assign_value_type(td);
        }
    }

    fn lhs(&self) -> &Rc<VarDef> {
        self.lhs.as_ref().expect("definition name recorded")
    }

    fn complete(&mut self, st: &mut LangState) -> Result<Rc<Expr>, ParseError> {
        let lhs = self.lhs.take().expect("definition name recorded");
        let rhs = self.rhs.take().expect("definition rhs recorded");
        if let (Some(declared), Some(actual)) = (self.declared, rhs.value_type(&st.types))
            && declared != actual
        {
            return Err(ParseError::Type {
                message: format!(
                    "{} declared {} but defined as {}",
                    st.strings.resolve(lhs.name()),
                    st.types.display(declared, &st.strings),
                    st.types.display(actual, &st.strings),
                ),
            });
        }
        Ok(Expr::define(lhs, rhs, &st.types))
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match (&tk.kind, self.state) {
            (TokenKind::Colon, DefState::HaveName) => {
                self.state = DefState::ExpectType;
                p.push_ssm(Ssm::ExpectType(ExpectTypeSsm::new()));
                Flow::Continue
            }
            (TokenKind::SingleAssign, DefState::HaveName | DefState::HaveType) => {
                self.state = DefState::ExpectRhs;
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::rhs()));
                Flow::Continue
            }
            (TokenKind::LeftParen, DefState::HaveName) => {
                self.state = DefState::FnArglist;
                p.push_ssm(Ssm::ExpectFormalArglist(ExpectFormalArglistSsm::new()));
                Flow::ContinueAndRedeliver(tk.clone())
            }
            (TokenKind::Colon, DefState::FnAfterArgs) => {
                self.state = DefState::FnExpectRet;
                p.push_ssm(Ssm::ExpectType(ExpectTypeSsm::new()));
                Flow::Continue
            }
            (TokenKind::LeftBrace, DefState::FnAfterArgs | DefState::FnHaveRet) => {
                self.state = DefState::FnBody;
                p.push_ssm(Ssm::Sequence(SequenceSsm::new()));
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::in_block()));
                Flow::Continue
            }
            (TokenKind::Semicolon, DefState::ExpectSemicolon) => {
                match self.complete(st) {
                    Ok(define) => Flow::Emit(Emission::ExprWithToken(define, tk.clone())),
                    Err(e) => {
                        p.capture_error(e);
                        Flow::Continue
                    }
                }
            }
            _ => illegal_token(p, "define", self.expect_str(), tk),
        }
    }

    pub(crate) fn on_parsed_symbol(&mut self, sym: USym, p: &mut Parser, st: &mut LangState) -> Flow {
        if self.state != DefState::ExpectName {
            return illegal_channel(p, "define", self.expect_str(), "parsed symbol");
        }
        let lhs = VarDef::untyped(sym);
        // A genuine top-level definition binds its name immediately, so
        // the right-hand side can refer to it (recursive functions).
        // Inside a block the name is bound by the let rewrite instead.
        if self.at_toplevel {
            st.globals.upsert(Rc::clone(&lhs));
        }
        self.lhs = Some(lhs);
        self.state = DefState::HaveName;
        Flow::Continue
    }

    pub(crate) fn on_parsed_typedescr(
        &mut self,
        td: TypeDescr,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        match self.state {
            DefState::ExpectType => {
                self.declared = Some(td);
                self.lhs().assign_value_type(td);
                self.state = DefState::HaveType;
                Flow::Continue
            }
            DefState::FnExpectRet => {
                self.fn_ret = Some(td);
                let param_types: Option<Vec<TypeDescr>> =
                    self.fn_params.iter().map(|v| v.value_type()).collect();
                if let Some(params) = param_types {
                    let sig = st.types.function(&params, td);
                    self.lhs().assign_value_type(sig);
                }
                self.state = DefState::FnHaveRet;
                Flow::Continue
            }
            _ => illegal_channel(p, "define", self.expect_str(), "parsed type"),
        }
    }

    pub(crate) fn on_parsed_formal_arglist(
        &mut self,
        formals: Vec<Formal>,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        if self.state != DefState::FnArglist {
            return illegal_channel(p, "define", self.expect_str(), "parsed formal list");
        }
        self.fn_params = formals
            .iter()
            .map(|f| VarDef::new(f.name, f.ty))
            .collect();
        let symtab = LocalSymtab::from_vars(self.fn_params.clone(), p.current_scope().cloned());
        p.push_scope(Rc::clone(&symtab));
        self.fn_symtab = Some(symtab);
        self.state = DefState::FnAfterArgs;
        Flow::Continue
    }

    pub(crate) fn on_parsed_expression(
        &mut self,
        expr: Rc<Expr>,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        match self.state {
            DefState::ExpectRhs => {
                self.rhs = Some(expr);
                self.state = DefState::ExpectSemicolon;
                Flow::Continue
            }
            DefState::FnBody => {
                // Assemble the lambda the function form desugars to,
                // named after the variable it defines.
                p.pop_scope();
                let name = self.lhs().name();
                let ret = self.fn_ret.or_else(|| expr.value_type(&st.types));
                let param_types: Option<Vec<TypeDescr>> =
                    self.fn_params.iter().map(|v| v.value_type()).collect();
                let signature = match (param_types, ret) {
                    (Some(params), Some(ret)) => Some(st.types.function(&params, ret)),
                    _ => None,
                };
                let lambda = LambdaDef::new(
                    name,
                    std::mem::take(&mut self.fn_params),
                    self.fn_symtab.take().expect("scope recorded at arglist"),
                    expr,
                    signature,
                );
                self.rhs = Some(Expr::lambda(lambda));
                match self.complete(st) {
                    Ok(define) => Flow::Emit(Emission::Expr(define)),
                    Err(e) => {
                        p.capture_error(e);
                        Flow::Continue
                    }
                }
            }
            _ => illegal_channel(p, "define", self.expect_str(), "parsed expression"),
        }
    }

    pub(crate) fn on_parsed_expression_with_token(
        &mut self,
        expr: Rc<Expr>,
        tk: &Token,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        if self.state != DefState::ExpectRhs {
            return illegal_channel(p, "define", self.expect_str(), "parsed expression");
        }
        self.rhs = Some(expr);
        self.state = DefState::ExpectSemicolon;
        self.on_token(tk, p, st)
    }
}
