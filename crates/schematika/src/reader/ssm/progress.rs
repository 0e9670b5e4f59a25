//! Operator progress: infix parsing with one deferred commitment.
//!
//! A just-parsed expression may or may not be followed by an infix
//! operator; stashing it here defers the decision until the next token
//! arrives (the tokenizer has no push-back). The machine holds
//! `(lhs, op?, rhs?)`:
//!
//! - a new operator with no pending one is taken, and an operand is
//!   requested;
//! - a new operator at lower-or-equal precedence folds `(lhs op rhs)`
//!   and restarts with the folded expression as the new lhs;
//! - a new operator at higher precedence opens a nested progress frame on
//!   `rhs` so the tighter-binding group completes first;
//! - a terminator assembles whatever is pending and hands the expression
//!   up together with the terminator.

use std::rc::Rc;

use crate::{
    error::ParseError,
    expr::Expr,
    primitive::Primitive,
    session::LangState,
    token::{Token, TokenKind},
};

use super::{
    super::parser::{Parser, illegal_channel, illegal_token},
    ApplySsm, Emission, ExpectExprSsm, Flow, Ssm,
};

/// One infix operator of the surface syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Assign,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub(crate) fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Assign => Some(Self::Assign),
            TokenKind::CmpEq => Some(Self::CmpEq),
            TokenKind::CmpNe => Some(Self::CmpNe),
            TokenKind::LeftAngle => Some(Self::CmpLt),
            TokenKind::LessEqual => Some(Self::CmpLe),
            TokenKind::RightAngle => Some(Self::CmpGt),
            TokenKind::GreatEqual => Some(Self::CmpGe),
            TokenKind::Plus => Some(Self::Add),
            TokenKind::Minus => Some(Self::Sub),
            TokenKind::Star => Some(Self::Mul),
            TokenKind::Slash => Some(Self::Div),
            _ => None,
        }
    }

    /// 1 is loosest (`:=`), 4 tightest (`*`, `/`).
    pub(crate) fn precedence(self) -> u8 {
        match self {
            Self::Assign => 1,
            Self::CmpEq | Self::CmpNe | Self::CmpLt | Self::CmpLe | Self::CmpGt | Self::CmpGe => 2,
            Self::Add | Self::Sub => 3,
            Self::Mul | Self::Div => 4,
        }
    }

    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Assign => ":=",
            Self::CmpEq => "==",
            Self::CmpNe => "!=",
            Self::CmpLt => "<",
            Self::CmpLe => "<=",
            Self::CmpGt => ">",
            Self::CmpGe => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    /// Specialized primitives for known operand types, and the polymorphic
    /// fallback used when a type is still unknown.
    fn primitives(self) -> Option<(Primitive, Primitive, Primitive)> {
        use Primitive as P;
        match self {
            Self::Assign => None,
            Self::Add => Some((P::AddI64, P::AddF64, P::Add)),
            Self::Sub => Some((P::SubI64, P::SubF64, P::Sub)),
            Self::Mul => Some((P::MulI64, P::MulF64, P::Mul)),
            Self::Div => Some((P::DivI64, P::DivF64, P::Div)),
            Self::CmpEq => Some((P::CmpEqI64, P::CmpEqF64, P::CmpEq)),
            Self::CmpNe => Some((P::CmpNeI64, P::CmpNeF64, P::CmpNe)),
            Self::CmpLt => Some((P::CmpLtI64, P::CmpLtF64, P::CmpLt)),
            Self::CmpLe => Some((P::CmpLeI64, P::CmpLeF64, P::CmpLe)),
            Self::CmpGt => Some((P::CmpGtI64, P::CmpGtF64, P::CmpGt)),
            Self::CmpGe => Some((P::CmpGeI64, P::CmpGeF64, P::CmpGe)),
        }
    }
}

/// Combines `lhs op rhs` into an expression, mapping the operator to a
/// primitive by operand type. Known-incompatible operand types are a
/// parse-time type error; an unknown side selects the polymorphic
/// primitive, which specializes at run time.
pub(crate) fn assemble(
    lhs: Rc<Expr>,
    op: BinOp,
    rhs: Rc<Expr>,
    st: &mut LangState,
) -> Result<Rc<Expr>, ParseError> {
    if op == BinOp::Assign {
        let Expr::VarRef(vr) = &*lhs else {
            return Err(ParseError::Type {
                message: "left of := must be a variable".to_owned(),
            });
        };
        if let (Some(lt), Some(rt)) = (vr.def.value_type(), rhs.value_type(&st.types))
            && lt != rt
        {
            return Err(ParseError::Type {
                message: format!(
                    "cannot assign {} to {} variable {}",
                    st.types.display(rt, &st.strings),
                    st.types.display(lt, &st.strings),
                    st.strings.resolve(vr.def.name()),
                ),
            });
        }
        return Ok(Expr::assign(vr.clone(), rhs));
    }

    let (on_i64, on_f64, generic) = op.primitives().expect("non-assign operator has primitives");
    let lt = lhs.value_type(&st.types);
    let rt = rhs.value_type(&st.types);
    let prim = match (lt, rt) {
        (Some(a), Some(b)) if a == b && a.is_i64() => on_i64,
        (Some(a), Some(b)) if a == b && a.is_f64() => on_f64,
        (Some(a), Some(b)) => {
            return Err(ParseError::Type {
                message: format!(
                    "operator {} cannot combine {} and {}",
                    op.symbol(),
                    st.types.display(a, &st.strings),
                    st.types.display(b, &st.strings),
                ),
            });
        }
        _ => generic,
    };
    Ok(Expr::apply(Expr::primitive(prim), vec![lhs, rhs]))
}

#[derive(Debug)]
pub(crate) struct ProgressSsm {
    lhs: Rc<Expr>,
    op: Option<BinOp>,
    rhs: Option<Rc<Expr>>,
}

impl ProgressSsm {
    pub(crate) fn new(lhs: Rc<Expr>) -> Self {
        Self {
            lhs,
            op: None,
            rhs: None,
        }
    }

    pub(crate) fn with_op(lhs: Rc<Expr>, op: BinOp) -> Self {
        Self {
            lhs,
            op: Some(op),
            rhs: None,
        }
    }

    pub(crate) fn expect_str(&self) -> &'static str {
        match (&self.op, &self.rhs) {
            (None, _) => "operator, '(', or terminator",
            (Some(_), None) => "expression",
            (Some(_), Some(_)) => "operator or terminator",
        }
    }

    pub(crate) fn on_token(&mut self, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        if let Some(op2) = BinOp::from_token(&tk.kind) {
            return self.on_operator(op2, tk, p, st);
        }
        match &tk.kind {
            TokenKind::Semicolon
            | TokenKind::Comma
            | TokenKind::RightParen
            | TokenKind::RightBrace
            | TokenKind::Then
            | TokenKind::Else => match self.assemble_current(st) {
                Ok(expr) => Flow::Emit(Emission::ExprWithToken(expr, tk.clone())),
                Err(e) => {
                    p.capture_error(e);
                    Flow::Continue
                }
            },
            TokenKind::LeftParen => {
                if self.op.is_none() && self.rhs.is_none() {
                    // The held expression turns out to be a callee.
                    let fn_expr = Rc::clone(&self.lhs);
                    Flow::ReplaceAndRedeliver(
                        vec![Ssm::Apply(ApplySsm::with_fn(fn_expr))],
                        tk.clone(),
                    )
                } else if self.op.is_some() && self.rhs.is_some() {
                    // The operand just parsed is the callee; its call
                    // result becomes the new rhs.
                    let callee = self.rhs.take().expect("rhs present");
                    p.push_ssm(Ssm::Apply(ApplySsm::with_fn(callee)));
                    Flow::ContinueAndRedeliver(tk.clone())
                } else {
                    illegal_token(p, "progress", self.expect_str(), tk)
                }
            }
            _ => illegal_token(p, "progress", self.expect_str(), tk),
        }
    }

    fn on_operator(&mut self, op2: BinOp, tk: &Token, p: &mut Parser, st: &mut LangState) -> Flow {
        match (self.op, self.rhs.is_some()) {
            (None, _) => {
                self.op = Some(op2);
                p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::operand()));
                Flow::Continue
            }
            (Some(op), true) => {
                if op.precedence() >= op2.precedence() {
                    // Left association: fold what we hold, restart with
                    // the folded expression as lhs of the new operator.
                    let rhs = self.rhs.take().expect("rhs present");
                    match assemble(Rc::clone(&self.lhs), op, rhs, st) {
                        Ok(folded) => Flow::Replace(vec![
                            Ssm::Progress(Self::with_op(folded, op2)),
                            Ssm::ExpectExpr(ExpectExprSsm::operand()),
                        ]),
                        Err(e) => {
                            p.capture_error(e);
                            Flow::Continue
                        }
                    }
                } else {
                    // Right association: the tighter group completes
                    // first, then lands back here as our rhs.
                    let rhs = self.rhs.take().expect("rhs present");
                    p.push_ssm(Ssm::Progress(Self::with_op(rhs, op2)));
                    p.push_ssm(Ssm::ExpectExpr(ExpectExprSsm::operand()));
                    Flow::Continue
                }
            }
            (Some(_), false) => illegal_token(p, "progress", self.expect_str(), tk),
        }
    }

    fn assemble_current(&mut self, st: &mut LangState) -> Result<Rc<Expr>, ParseError> {
        match (self.op, self.rhs.take()) {
            (None, _) => Ok(Rc::clone(&self.lhs)),
            (Some(op), Some(rhs)) => assemble(Rc::clone(&self.lhs), op, rhs, st),
            (Some(op), None) => Err(ParseError::Syntax {
                ssm: "progress",
                expected: "expression",
                found: format!("nothing after operator {}", op.symbol()),
            }),
        }
    }

    pub(crate) fn on_parsed_expression(
        &mut self,
        expr: Rc<Expr>,
        p: &mut Parser,
        _st: &mut LangState,
    ) -> Flow {
        if self.op.is_some() {
            self.rhs = Some(expr);
            return Flow::Continue;
        }
        illegal_channel(p, "progress", self.expect_str(), "parsed expression")
    }

    pub(crate) fn on_parsed_expression_with_token(
        &mut self,
        expr: Rc<Expr>,
        tk: &Token,
        p: &mut Parser,
        st: &mut LangState,
    ) -> Flow {
        if self.op.is_none() {
            return illegal_channel(p, "progress", self.expect_str(), "parsed expression");
        }
        self.rhs = Some(expr);
        self.on_token(tk, p, st)
    }
}
