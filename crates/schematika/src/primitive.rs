//! Native numeric and comparison procedures.
//!
//! Infix operators compile to applications of these primitives. When both
//! operand types are known at parse time the reader picks a specialized
//! variant (`AddI64`, `CmpLtF64`, ...); when at least one side is still
//! untyped it emits the polymorphic variant, which dispatches on the runtime
//! tags and rejects mismatched operands with a runtime error.

use strum::IntoStaticStr;

use crate::{
    error::VmError,
    types::{TypeDescr, TypeKind, TypeTable},
    value::Value,
};

/// Handle for a native procedure. All current primitives are binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Primitive {
    // i64 arithmetic
    AddI64,
    SubI64,
    MulI64,
    DivI64,
    // f64 arithmetic
    AddF64,
    SubF64,
    MulF64,
    DivF64,
    // i64 comparisons
    CmpEqI64,
    CmpNeI64,
    CmpLtI64,
    CmpLeI64,
    CmpGtI64,
    CmpGeI64,
    // f64 comparisons
    CmpEqF64,
    CmpNeF64,
    CmpLtF64,
    CmpLeF64,
    CmpGtF64,
    CmpGeF64,
    // polymorphic fallbacks, specialized at runtime
    Add,
    Sub,
    Mul,
    Div,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
}

impl Primitive {
    /// Number of arguments the procedure consumes.
    #[must_use]
    pub fn arity(self) -> usize {
        2
    }

    /// Static name, e.g. `add_i64`.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Surface operator this primitive implements.
    #[must_use]
    pub fn op_symbol(self) -> &'static str {
        use Primitive::{
            Add, AddF64, AddI64, CmpEq, CmpEqF64, CmpEqI64, CmpGe, CmpGeF64, CmpGeI64, CmpGt,
            CmpGtF64, CmpGtI64, CmpLe, CmpLeF64, CmpLeI64, CmpLt, CmpLtF64, CmpLtI64, CmpNe,
            CmpNeF64, CmpNeI64, Div, DivF64, DivI64, Mul, MulF64, MulI64, Sub, SubF64, SubI64,
        };
        match self {
            Add | AddI64 | AddF64 => "+",
            Sub | SubI64 | SubF64 => "-",
            Mul | MulI64 | MulF64 => "*",
            Div | DivI64 | DivF64 => "/",
            CmpEq | CmpEqI64 | CmpEqF64 => "==",
            CmpNe | CmpNeI64 | CmpNeF64 => "!=",
            CmpLt | CmpLtI64 | CmpLtF64 => "<",
            CmpLe | CmpLeI64 | CmpLeF64 => "<=",
            CmpGt | CmpGtI64 | CmpGtF64 => ">",
            CmpGe | CmpGeI64 | CmpGeF64 => ">=",
        }
    }

    /// Binding strength of the implemented operator: comparisons 2,
    /// additive 3, multiplicative 4.
    #[must_use]
    pub fn op_precedence(self) -> u8 {
        match self.op_symbol() {
            "+" | "-" => 3,
            "*" | "/" => 4,
            _ => 2,
        }
    }

    /// Signature of a specialized primitive, when one is pre-interned in
    /// `types`. Polymorphic variants have no static signature.
    #[must_use]
    pub fn signature(self, types: &TypeTable) -> Option<TypeDescr> {
        use Primitive as P;
        let (arg, ret) = match self {
            P::AddI64 | P::SubI64 | P::MulI64 | P::DivI64 => (TypeDescr::I64, TypeDescr::I64),
            P::AddF64 | P::SubF64 | P::MulF64 | P::DivF64 => (TypeDescr::F64, TypeDescr::F64),
            P::CmpEqI64 | P::CmpNeI64 | P::CmpLtI64 | P::CmpLeI64 | P::CmpGtI64 | P::CmpGeI64 => {
                (TypeDescr::I64, TypeDescr::BOOL)
            }
            P::CmpEqF64 | P::CmpNeF64 | P::CmpLtF64 | P::CmpLeF64 | P::CmpGtF64 | P::CmpGeF64 => {
                (TypeDescr::F64, TypeDescr::BOOL)
            }
            _ => return None,
        };
        types.lookup(&TypeKind::Function {
            params: smallvec::SmallVec::from_slice(&[arg, arg]),
            ret,
        })
    }

    /// Invokes the procedure on evaluated arguments.
    pub fn invoke(self, args: &[Value]) -> Result<Value, VmError> {
        use Primitive as P;
        if args.len() != self.arity() {
            return Err(VmError::ArityMismatch {
                expected: self.arity(),
                found: args.len(),
            });
        }
        match self {
            P::AddI64 => i64_arith(args, i64::checked_add),
            P::SubI64 => i64_arith(args, i64::checked_sub),
            P::MulI64 => i64_arith(args, i64::checked_mul),
            P::DivI64 => i64_div(args),
            P::AddF64 => f64_arith(args, |a, b| a + b),
            P::SubF64 => f64_arith(args, |a, b| a - b),
            P::MulF64 => f64_arith(args, |a, b| a * b),
            P::DivF64 => f64_arith(args, |a, b| a / b),
            P::CmpEqI64 => i64_cmp(args, |a, b| a == b),
            P::CmpNeI64 => i64_cmp(args, |a, b| a != b),
            P::CmpLtI64 => i64_cmp(args, |a, b| a < b),
            P::CmpLeI64 => i64_cmp(args, |a, b| a <= b),
            P::CmpGtI64 => i64_cmp(args, |a, b| a > b),
            P::CmpGeI64 => i64_cmp(args, |a, b| a >= b),
            P::CmpEqF64 => f64_cmp(args, |a, b| a == b),
            P::CmpNeF64 => f64_cmp(args, |a, b| a != b),
            P::CmpLtF64 => f64_cmp(args, |a, b| a < b),
            P::CmpLeF64 => f64_cmp(args, |a, b| a <= b),
            P::CmpGtF64 => f64_cmp(args, |a, b| a > b),
            P::CmpGeF64 => f64_cmp(args, |a, b| a >= b),
            P::Add => self.dispatch(args, P::AddI64, P::AddF64),
            P::Sub => self.dispatch(args, P::SubI64, P::SubF64),
            P::Mul => self.dispatch(args, P::MulI64, P::MulF64),
            P::Div => self.dispatch(args, P::DivI64, P::DivF64),
            P::CmpEq => self.dispatch(args, P::CmpEqI64, P::CmpEqF64),
            P::CmpNe => self.dispatch(args, P::CmpNeI64, P::CmpNeF64),
            P::CmpLt => self.dispatch(args, P::CmpLtI64, P::CmpLtF64),
            P::CmpLe => self.dispatch(args, P::CmpLeI64, P::CmpLeF64),
            P::CmpGt => self.dispatch(args, P::CmpGtI64, P::CmpGtF64),
            P::CmpGe => self.dispatch(args, P::CmpGeI64, P::CmpGeF64),
        }
    }

    /// Runtime specialization of a polymorphic primitive.
    fn dispatch(self, args: &[Value], on_i64: Self, on_f64: Self) -> Result<Value, VmError> {
        match (&args[0], &args[1]) {
            (Value::I64(_), Value::I64(_)) => on_i64.invoke(args),
            (Value::F64(_), Value::F64(_)) => on_f64.invoke(args),
            _ => Err(VmError::TypeMismatch {
                expected: "two i64 or two f64 operands",
                found: format!("operands to {}", self.op_symbol()),
            }),
        }
    }
}

fn i64_pair(args: &[Value]) -> Result<(i64, i64), VmError> {
    match (&args[0], &args[1]) {
        (Value::I64(a), Value::I64(b)) => Ok((*a, *b)),
        _ => Err(VmError::TypeMismatch {
            expected: "i64 operands",
            found: "mixed operand types".to_owned(),
        }),
    }
}

fn f64_pair(args: &[Value]) -> Result<(f64, f64), VmError> {
    match (&args[0], &args[1]) {
        (Value::F64(a), Value::F64(b)) => Ok((*a, *b)),
        _ => Err(VmError::TypeMismatch {
            expected: "f64 operands",
            found: "mixed operand types".to_owned(),
        }),
    }
}

fn i64_arith(args: &[Value], op: fn(i64, i64) -> Option<i64>) -> Result<Value, VmError> {
    let (a, b) = i64_pair(args)?;
    op(a, b).map(Value::I64).ok_or(VmError::IntegerOverflow)
}

fn i64_div(args: &[Value]) -> Result<Value, VmError> {
    let (a, b) = i64_pair(args)?;
    if b == 0 {
        return Err(VmError::DivisionByZero);
    }
    a.checked_div(b).map(Value::I64).ok_or(VmError::IntegerOverflow)
}

fn f64_arith(args: &[Value], op: fn(f64, f64) -> f64) -> Result<Value, VmError> {
    let (a, b) = f64_pair(args)?;
    Ok(Value::F64(op(a, b)))
}

fn i64_cmp(args: &[Value], op: fn(i64, i64) -> bool) -> Result<Value, VmError> {
    let (a, b) = i64_pair(args)?;
    Ok(Value::Bool(op(a, b)))
}

fn f64_cmp(args: &[Value], op: fn(f64, f64) -> bool) -> Result<Value, VmError> {
    let (a, b) = f64_pair(args)?;
    Ok(Value::Bool(op(a, b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialized_arithmetic() {
        assert_eq!(
            Primitive::AddI64.invoke(&[Value::I64(2), Value::I64(3)]),
            Ok(Value::I64(5))
        );
        assert_eq!(
            Primitive::MulF64.invoke(&[Value::F64(4.0), Value::F64(4.0)]),
            Ok(Value::F64(16.0))
        );
    }

    #[test]
    fn polymorphic_dispatch_picks_operand_kind() {
        assert_eq!(
            Primitive::Add.invoke(&[Value::I64(1), Value::I64(2)]),
            Ok(Value::I64(3))
        );
        assert_eq!(
            Primitive::CmpLt.invoke(&[Value::F64(1.0), Value::F64(2.0)]),
            Ok(Value::Bool(true))
        );
        assert!(Primitive::Add
            .invoke(&[Value::I64(1), Value::F64(2.0)])
            .is_err());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(
            Primitive::DivI64.invoke(&[Value::I64(1), Value::I64(0)]),
            Err(VmError::DivisionByZero)
        );
    }
}
