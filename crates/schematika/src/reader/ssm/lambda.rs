//! Lambda expressions: `lambda formal-args [: type] body`.
//!
//! Between the formal list and the body a fresh scope is pushed so the
//! body resolves its parameters; the scope pops when the body completes.
//! If the lambda sits on the right-hand side of a definition whose
//! variable has no type yet, the signature (when computable from the
//! annotations) is propagated to that variable before the body parses —
//! which is what makes direct recursive definitions work without a
//! separate forward declaration.

use std::rc::Rc;

use crate::{
    expr::{Expr, LambdaDef, VarDef},
    session::LangState,
    symtab::LocalSymtab,
    token::{Token, TokenKind},
    types::TypeDescr,
};

use super::{
    super::parser::{Parser, illegal_channel, illegal_token},
    Emission, ExpectExprSsm, ExpectTypeSsm, Flow, Formal, Ssm,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LambdaState {
    ExpectArglist,
    AfterArgs,
    ExpectRetType,
    ExpectBody,
}

#[derive(Debug)]
pub(crate) struct LambdaSsm {
    state: LambdaState,
    params: Vec<Rc<VarDef>>,
    symtab: Option<Rc<LocalSymtab>>,
    ret: Option<TypeDescr>,
}

impl LambdaSsm {
    pub(crate) fn new() -> Self {
        Self {
            state: LambdaState::ExpectArglist,
            params: Vec::new(),
            symtab: None,
            ret: None,
        }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        match self.state {
            LambdaState::ExpectArglist => "formal argument list",
            LambdaState::AfterArgs => "':' or body expression",
            LambdaState::ExpectRetType => "type",
            LambdaState::ExpectBody => "body expression",
        }
    }

    fn param_types(&self) -> Option<Vec<TypeDescr>> {
        self.params.iter().map(|p| p.value_type()).collect()
    }

    fn complete(&mut self, body: Rc<Expr>, p: &mut Parser, st: &mut LangState) -> Rc<Expr> {
        p.pop_scope();
        let ret = self.ret.or_else(|| body.value_type(&st.types));
        let signature = match (self.param_types(), ret) {
            (Some(params), Some(ret)) => Some(st.types.function(&params, ret)),
            _ => None,
        };
        let def = LambdaDef::new(
            st.strings.gensym("lambda"),
            std::mem::take(&mut self.params),
            self.symtab.take().expect("scope recorded at arglist"),
            body,
            signature,
        );
        Expr::lambda(def)
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match (&tk.kind, self.state) {
            (TokenKind::Colon, LambdaState::AfterArgs) => {
                self.state = LambdaState::ExpectRetType;
                p.push_ssm(Ssm::ExpectType(ExpectTypeSsm::new()));
                Flow::Continue
            }
            (_, LambdaState::AfterArgs) => {
                // Anything else begins the body.
                self.state = LambdaState::ExpectBody;
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::rhs()));
                Flow::ContinueAndRedeliver(tk.clone())
            }
            _ => illegal_token(p, "lambda", self.expect_str(), tk),
        }
    }

    pub(crate) fn on_parsed_formal_arglist(
        &mut self,
        formals: Vec<Formal>,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        if self.state != LambdaState::ExpectArglist {
            return illegal_channel(p, "lambda", self.expect_str(), "parsed formal list");
        }
        self.params = formals
            .iter()
            .map(|f| VarDef::new(f.name, f.ty))
            .collect();
        let symtab = LocalSymtab::from_vars(self.params.clone(), p.current_scope().cloned());
        p.push_scope(Rc::clone(&symtab));
        self.symtab = Some(symtab);
        self.state = LambdaState::AfterArgs;
        Flow::Continue
    }

    pub(crate) fn on_parsed_typedescr(
        &mut self,
        td: TypeDescr,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        if self.state != LambdaState::ExpectRetType {
            return illegal_channel(p, "lambda", self.expect_str(), "parsed type");
        }
        self.ret = Some(td);
        if let Some(params) = self.param_types() {
            let sig = st.types.function(&params, td);
            p.propagate_signature_to_pending_define(sig);
        }
        self.state = LambdaState::ExpectBody;
        p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::rhs()));
        Flow::Continue
    }

    pub(crate) fn on_parsed_expression(
        &mut self,
        expr: Rc<Expr>,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        if self.state != LambdaState::ExpectBody {
            return illegal_channel(p, "lambda", self.expect_str(), "parsed expression");
        }
        let lambda = self.complete(expr, p, st);
        Flow::Emit(Emission::Expr(lambda))
    }

    pub(crate) fn on_parsed_expression_with_token(
        &mut self,
        expr: Rc<Expr>,
        tk: &Token,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        if self.state != LambdaState::ExpectBody {
            return illegal_channel(p, "lambda", self.expect_str(), "parsed expression");
        }
        let lambda = self.complete(expr, p, st);
        Flow::Emit(Emission::ExprWithToken(lambda, tk.clone()))
    }
}
