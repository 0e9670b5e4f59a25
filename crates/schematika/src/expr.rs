//! Typed expression trees.
//!
//! An expression is a tagged variant; every composite node caches its
//! free-variable set on first query. A node's `value_type` may be unknown
//! (`None`) during construction and transitions to a concrete descriptor at
//! most once — types only ever become more known, never change.
//!
//! Nodes are shared through `Rc`: the reader builds them, closures keep
//! their bodies alive, and VM frames hold the expression they are midway
//! through evaluating. The GC never moves expressions; heap objects hold
//! plain `Rc` handles to them.

use std::{
    cell::{Cell, OnceCell},
    rc::Rc,
};

use ahash::AHashSet;

use crate::{
    error::ParseError,
    intern::{StringTable, USym},
    primitive::Primitive,
    symtab::{Binding, GlobalSymtab, LocalSymtab},
    types::{TypeDescr, TypeTable},
};

/// A variable binder: its name, its static type when known, and the slot it
/// occupies in its scope.
#[derive(Debug)]
pub struct VarDef {
    name: USym,
    value_type: Cell<Option<TypeDescr>>,
    slot: Cell<u16>,
}

impl VarDef {
    #[must_use]
    pub fn new(name: USym, value_type: Option<TypeDescr>) -> Rc<Self> {
        Rc::new(Self {
            name,
            value_type: Cell::new(value_type),
            slot: Cell::new(0),
        })
    }

    #[must_use]
    pub fn untyped(name: USym) -> Rc<Self> {
        Self::new(name, None)
    }

    #[must_use]
    pub fn name(&self) -> USym {
        self.name
    }

    #[must_use]
    pub fn value_type(&self) -> Option<TypeDescr> {
        self.value_type.get()
    }

    /// Supplies the type if it is still unknown. A type, once set, never
    /// changes; later calls with any value are ignored.
    pub fn assign_value_type(&self, td: TypeDescr) {
        if self.value_type.get().is_none() {
            self.value_type.set(Some(td));
        }
    }

    #[must_use]
    pub fn slot(&self) -> u16 {
        self.slot.get()
    }

    pub(crate) fn assign_slot(&self, slot: u16) {
        self.slot.set(slot);
    }
}

/// A literal value carried by a `Constant` node.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(Box<str>),
}

impl Literal {
    #[must_use]
    pub fn value_type(&self) -> TypeDescr {
        match self {
            Self::Bool(_) => TypeDescr::BOOL,
            Self::I64(_) => TypeDescr::I64,
            Self::F64(_) => TypeDescr::F64,
            Self::Str(_) => TypeDescr::STR,
        }
    }
}

type FreeVarCell = OnceCell<Rc<AHashSet<USym>>>;

#[derive(Debug)]
pub struct Constant {
    pub literal: Literal,
}

/// Reference to a binder, resolved at parse time. `link_depth` counts the
/// lexical scopes to cross at evaluation time before indexing by slot.
#[derive(Debug, Clone)]
pub struct VarRef {
    pub def: Rc<VarDef>,
    pub link_depth: u32,
}

#[derive(Debug)]
pub struct Assign {
    pub lhs: VarRef,
    pub rhs: Rc<Expr>,
    free_vars: FreeVarCell,
}

#[derive(Debug)]
pub struct Define {
    pub lhs: Rc<VarDef>,
    pub rhs: Rc<Expr>,
    free_vars: FreeVarCell,
}

#[derive(Debug)]
pub struct IfElse {
    pub test: Rc<Expr>,
    pub when_true: Rc<Expr>,
    pub when_false: Option<Rc<Expr>>,
    free_vars: FreeVarCell,
}

#[derive(Debug)]
pub struct Sequence {
    pub exprs: Vec<Rc<Expr>>,
    free_vars: FreeVarCell,
}

#[derive(Debug)]
pub struct Apply {
    pub fn_expr: Rc<Expr>,
    pub args: Vec<Rc<Expr>>,
    free_vars: FreeVarCell,
}

/// A lambda: formal parameters, their scope, and the body. The signature is
/// set once it is known (explicit return annotation, or the body's type).
#[derive(Debug)]
pub struct LambdaDef {
    pub name: USym,
    pub params: Vec<Rc<VarDef>>,
    pub symtab: Rc<LocalSymtab>,
    pub body: Rc<Expr>,
    signature: Cell<Option<TypeDescr>>,
    free_vars: FreeVarCell,
}

impl LambdaDef {
    #[must_use]
    pub fn new(
        name: USym,
        params: Vec<Rc<VarDef>>,
        symtab: Rc<LocalSymtab>,
        body: Rc<Expr>,
        signature: Option<TypeDescr>,
    ) -> Rc<Self> {
        Rc::new(Self {
            name,
            params,
            symtab,
            body,
            signature: Cell::new(signature),
            free_vars: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn signature(&self) -> Option<TypeDescr> {
        self.signature.get()
    }

    /// Supplies the signature if still unknown; set-once like variables.
    pub fn assign_signature(&self, td: TypeDescr) {
        if self.signature.get().is_none() {
            self.signature.set(Some(td));
        }
    }
}

/// One expression node.
#[derive(Debug)]
pub enum Expr {
    Constant(Constant),
    VarRef(VarRef),
    Assign(Assign),
    Define(Define),
    IfElse(IfElse),
    Sequence(Sequence),
    Apply(Apply),
    Lambda(Rc<LambdaDef>),
    Primitive(Primitive),
}

impl Expr {
    #[must_use]
    pub fn constant(literal: Literal) -> Rc<Self> {
        Rc::new(Self::Constant(Constant { literal }))
    }

    #[must_use]
    pub fn var_ref(def: Rc<VarDef>, link_depth: u32) -> Rc<Self> {
        Rc::new(Self::VarRef(VarRef { def, link_depth }))
    }

    #[must_use]
    pub fn assign(lhs: VarRef, rhs: Rc<Self>) -> Rc<Self> {
        Rc::new(Self::Assign(Assign {
            lhs,
            rhs,
            free_vars: OnceCell::new(),
        }))
    }

    /// Builds a definition. If the binder's type is still unknown it
    /// receives the right-hand side's type.
    #[must_use]
    pub fn define(lhs: Rc<VarDef>, rhs: Rc<Self>, types: &TypeTable) -> Rc<Self> {
        if let Some(td) = rhs.value_type(types) {
            lhs.assign_value_type(td);
        }
        Rc::new(Self::Define(Define {
            lhs,
            rhs,
            free_vars: OnceCell::new(),
        }))
    }

    #[must_use]
    pub fn if_else(test: Rc<Self>, when_true: Rc<Self>, when_false: Option<Rc<Self>>) -> Rc<Self> {
        Rc::new(Self::IfElse(IfElse {
            test,
            when_true,
            when_false,
            free_vars: OnceCell::new(),
        }))
    }

    #[must_use]
    pub fn sequence(exprs: Vec<Rc<Self>>) -> Rc<Self> {
        Rc::new(Self::Sequence(Sequence {
            exprs,
            free_vars: OnceCell::new(),
        }))
    }

    #[must_use]
    pub fn apply(fn_expr: Rc<Self>, args: Vec<Rc<Self>>) -> Rc<Self> {
        Rc::new(Self::Apply(Apply {
            fn_expr,
            args,
            free_vars: OnceCell::new(),
        }))
    }

    #[must_use]
    pub fn lambda(def: Rc<LambdaDef>) -> Rc<Self> {
        Rc::new(Self::Lambda(def))
    }

    #[must_use]
    pub fn primitive(p: Primitive) -> Rc<Self> {
        Rc::new(Self::Primitive(p))
    }

    /// Current best-known static type; `None` while still unknown.
    #[must_use]
    pub fn value_type(&self, types: &TypeTable) -> Option<TypeDescr> {
        match self {
            Self::Constant(c) => Some(c.literal.value_type()),
            Self::VarRef(v) => v.def.value_type(),
            Self::Assign(a) => a.rhs.value_type(types),
            Self::Define(d) => d.rhs.value_type(types).or_else(|| d.lhs.value_type()),
            Self::IfElse(i) => {
                let when_false = i.when_false.as_ref()?;
                let tt = i.when_true.value_type(types)?;
                let tf = when_false.value_type(types)?;
                (tt == tf).then_some(tt)
            }
            Self::Sequence(s) => s.exprs.last()?.value_type(types),
            Self::Apply(a) => {
                let fn_ty = a.fn_expr.value_type(types)?;
                types.return_type(fn_ty)
            }
            Self::Lambda(l) => l.signature(),
            Self::Primitive(p) => p.signature(types),
        }
    }

    /// Set of variable names occurring free in this expression. Cached per
    /// node after the first computation.
    #[must_use]
    pub fn free_variables(&self) -> Rc<AHashSet<USym>> {
        fn union_of(exprs: &[&Rc<Expr>]) -> AHashSet<USym> {
            let mut out = AHashSet::new();
            for e in exprs {
                out.extend(e.free_variables().iter().copied());
            }
            out
        }
        match self {
            Self::Constant(_) | Self::Primitive(_) => Rc::new(AHashSet::new()),
            Self::VarRef(v) => {
                let mut set = AHashSet::new();
                set.insert(v.def.name());
                Rc::new(set)
            }
            Self::Assign(a) => Rc::clone(a.free_vars.get_or_init(|| {
                let mut set = union_of(&[&a.rhs]);
                set.insert(a.lhs.def.name());
                Rc::new(set)
            })),
            Self::Define(d) => Rc::clone(d.free_vars.get_or_init(|| {
                let mut set = union_of(&[&d.rhs]);
                set.remove(&d.lhs.name());
                Rc::new(set)
            })),
            Self::IfElse(i) => Rc::clone(i.free_vars.get_or_init(|| {
                let mut parts: Vec<&Rc<Expr>> = vec![&i.test, &i.when_true];
                if let Some(f) = &i.when_false {
                    parts.push(f);
                }
                Rc::new(union_of(&parts))
            })),
            Self::Sequence(s) => Rc::clone(s.free_vars.get_or_init(|| {
                Rc::new(union_of(&s.exprs.iter().collect::<Vec<_>>()))
            })),
            Self::Apply(a) => Rc::clone(a.free_vars.get_or_init(|| {
                let mut parts: Vec<&Rc<Expr>> = vec![&a.fn_expr];
                parts.extend(a.args.iter());
                Rc::new(union_of(&parts))
            })),
            Self::Lambda(l) => Rc::clone(l.free_vars.get_or_init(|| {
                let mut set = (*l.body.free_variables()).clone();
                for p in &l.params {
                    set.remove(&p.name());
                }
                Rc::new(set)
            })),
        }
    }

    /// Drives `f` over this node and every descendant, parents first.
    pub fn visit_preorder(&self, f: &mut dyn FnMut(&Self)) {
        f(self);
        self.visit_layer(&mut |child| child.visit_preorder(f));
    }

    /// Drives `f` over the immediate children only.
    pub fn visit_layer(&self, f: &mut dyn FnMut(&Self)) {
        match self {
            Self::Constant(_) | Self::VarRef(_) | Self::Primitive(_) => {}
            Self::Assign(a) => f(&a.rhs),
            Self::Define(d) => f(&d.rhs),
            Self::IfElse(i) => {
                f(&i.test);
                f(&i.when_true);
                if let Some(e) = &i.when_false {
                    f(e);
                }
            }
            Self::Sequence(s) => {
                for e in &s.exprs {
                    f(e);
                }
            }
            Self::Apply(a) => {
                f(&a.fn_expr);
                for e in &a.args {
                    f(e);
                }
            }
            Self::Lambda(l) => f(&l.body),
        }
    }

    /// Rebuilds this node with each immediate child replaced by
    /// `f(child)`. Leaves are returned unchanged (sharing the `Rc`).
    #[must_use]
    pub fn transform_layer(
        self: &Rc<Self>,
        f: &mut dyn FnMut(&Rc<Self>) -> Rc<Self>,
    ) -> Rc<Self> {
        match &**self {
            Self::Constant(_) | Self::VarRef(_) | Self::Primitive(_) => Rc::clone(self),
            Self::Assign(a) => Expr::assign(a.lhs.clone(), f(&a.rhs)),
            Self::Define(d) => Rc::new(Self::Define(Define {
                lhs: Rc::clone(&d.lhs),
                rhs: f(&d.rhs),
                free_vars: OnceCell::new(),
            })),
            Self::IfElse(i) => {
                Expr::if_else(f(&i.test), f(&i.when_true), i.when_false.as_ref().map(|e| f(e)))
            }
            Self::Sequence(s) => Expr::sequence(s.exprs.iter().map(|e| f(e)).collect()),
            Self::Apply(a) => {
                Expr::apply(f(&a.fn_expr), a.args.iter().map(|e| f(e)).collect())
            }
            Self::Lambda(l) => Expr::lambda(LambdaDef::new(
                l.name,
                l.params.clone(),
                Rc::clone(&l.symtab),
                f(&l.body),
                l.signature(),
            )),
        }
    }

    /// Verifies that every variable reference in the tree resolves, through
    /// `link_depth` scopes from its use site, to the slot its definition
    /// occupies. Called after parsing, before evaluation.
    pub fn attach_envs(
        &self,
        globals: &GlobalSymtab,
        strings: &StringTable,
    ) -> Result<(), ParseError> {
        fn check(
            expr: &Expr,
            scopes: &mut Vec<Rc<LocalSymtab>>,
            globals: &GlobalSymtab,
            strings: &StringTable,
        ) -> Result<(), ParseError> {
            if let Expr::VarRef(v) = expr {
                let name = v.def.name();
                for (depth, scope) in scopes.iter().rev().enumerate() {
                    if let Binding::Local { slot, .. } = scope.lookup_binding(name) {
                        let depth = u32::try_from(depth).expect("scope depth overflow");
                        if v.link_depth == depth && v.def.slot() == slot {
                            return Ok(());
                        }
                        return Err(ParseError::Type {
                            message: format!(
                                "binding linkage mismatch for {}",
                                strings.resolve(name)
                            ),
                        });
                    }
                }
                let global_depth =
                    u32::try_from(scopes.len()).expect("scope depth overflow");
                return match globals.lookup(name) {
                    Some(def) if v.link_depth == global_depth && def.slot() == v.def.slot() => {
                        Ok(())
                    }
                    Some(_) => Err(ParseError::Type {
                        message: format!(
                            "binding linkage mismatch for {}",
                            strings.resolve(name)
                        ),
                    }),
                    None => Err(ParseError::UnboundVariable {
                        name: strings.resolve(name).to_owned(),
                    }),
                };
            }
            if let Expr::Lambda(l) = expr {
                scopes.push(Rc::clone(&l.symtab));
                let result = check(&l.body, scopes, globals, strings);
                scopes.pop();
                return result;
            }
            let mut result = Ok(());
            expr.visit_layer(&mut |child| {
                if result.is_ok() {
                    result = check(child, scopes, globals, strings);
                }
            });
            result
        }
        check(self, &mut Vec::new(), globals, strings)
    }

    /// Canonical printed form: surface syntax that re-parses to an equal
    /// expression (up to gensym renaming of lambda names).
    #[must_use]
    pub fn to_source(&self, strings: &StringTable, types: &TypeTable) -> String {
        let mut out = String::new();
        self.write_source(&mut out, strings, types, 0);
        out
    }

    /// Binding strength for the printer: atoms 7, calls 6, infix 2–4,
    /// assignment 1, statement-like forms 0.
    fn print_precedence(&self) -> u8 {
        match self {
            Self::Constant(_) | Self::VarRef(_) | Self::Sequence(_) | Self::Primitive(_) => 7,
            Self::Apply(a) => match (&*a.fn_expr, a.args.len()) {
                (Self::Primitive(p), 2) => p.op_precedence(),
                _ => 6,
            },
            Self::Assign(_) => 1,
            Self::Define(_) | Self::IfElse(_) | Self::Lambda(_) => 0,
        }
    }

    fn write_source(&self, out: &mut String, strings: &StringTable, types: &TypeTable, ctx: u8) {
        let prec = self.print_precedence();
        let needs_parens = prec < ctx;
        if needs_parens {
            out.push('(');
        }
        match self {
            Self::Constant(c) => match &c.literal {
                Literal::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
                Literal::I64(v) => out.push_str(&v.to_string()),
                Literal::F64(v) => out.push_str(ryu::Buffer::new().format(*v)),
                Literal::Str(s) => out.push_str(&format!("{s:?}")),
            },
            Self::VarRef(v) => out.push_str(strings.resolve(v.def.name())),
            Self::Assign(a) => {
                out.push_str(strings.resolve(a.lhs.def.name()));
                out.push_str(" := ");
                a.rhs.write_source(out, strings, types, 1);
            }
            Self::Define(d) => {
                out.push_str("def ");
                out.push_str(strings.resolve(d.lhs.name()));
                // Only simple type names have surface syntax in annotations.
                if let Some(td) = d.lhs.value_type().filter(|td| !types.is_function(*td)) {
                    out.push_str(" : ");
                    out.push_str(&types.display(td, strings));
                }
                out.push_str(" = ");
                d.rhs.write_source(out, strings, types, 0);
                out.push(';');
            }
            Self::IfElse(i) => {
                out.push_str("if ");
                i.test.write_source(out, strings, types, 0);
                out.push_str(" then ");
                i.when_true.write_source(out, strings, types, 0);
                if let Some(e) = &i.when_false {
                    out.push_str(" else ");
                    e.write_source(out, strings, types, 0);
                }
            }
            Self::Sequence(s) => {
                out.push('{');
                for (i, e) in s.exprs.iter().enumerate() {
                    out.push(' ');
                    e.write_source(out, strings, types, 0);
                    if i + 1 < s.exprs.len() {
                        out.push(';');
                    }
                }
                out.push_str(" }");
            }
            Self::Apply(a) => {
                if let (Self::Primitive(p), 2) = (&*a.fn_expr, a.args.len()) {
                    let op_prec = p.op_precedence();
                    a.args[0].write_source(out, strings, types, op_prec);
                    out.push(' ');
                    out.push_str(p.op_symbol());
                    out.push(' ');
                    a.args[1].write_source(out, strings, types, op_prec + 1);
                } else {
                    a.fn_expr.write_source(out, strings, types, 7);
                    out.push('(');
                    for (i, arg) in a.args.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        arg.write_source(out, strings, types, 0);
                    }
                    out.push(')');
                }
            }
            Self::Lambda(l) => {
                out.push_str("lambda(");
                for (i, p) in l.params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(strings.resolve(p.name()));
                    if let Some(td) = p.value_type().filter(|td| !types.is_function(*td)) {
                        out.push_str(" : ");
                        out.push_str(&types.display(td, strings));
                    }
                }
                out.push(')');
                if let Some(ret) = l
                    .signature()
                    .and_then(|sig| types.return_type(sig))
                    .filter(|ret| !types.is_function(*ret))
                {
                    out.push_str(" : ");
                    out.push_str(&types.display(ret, strings));
                }
                out.push(' ');
                l.body.write_source(out, strings, types, 1);
            }
            Self::Primitive(p) => out.push_str(p.name()),
        }
        if needs_parens {
            out.push(')');
        }
    }
}
