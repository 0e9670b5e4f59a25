//! Interned type descriptors.
//!
//! A [`TypeDescr`] identifies a static type. Descriptors are interned in a
//! [`TypeTable`], so equality is identity (an integer compare), including
//! for structural function signatures: `function(i64 -> i64)` interned twice
//! yields the same handle.
//!
//! The canonical built-ins (`bool`, `i64`, `f64`, `string`) occupy fixed
//! slots so they are available as constants without a table lookup. Hosts
//! can extend the universe with named opaque types via [`TypeTable::named`].

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::intern::{StringTable, USym};

/// Handle for an interned type descriptor. Equality is identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescr(u32);

impl TypeDescr {
    pub const BOOL: Self = Self(0);
    pub const I64: Self = Self(1);
    pub const F64: Self = Self(2);
    pub const STR: Self = Self(3);

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub fn is_i64(self) -> bool {
        self == Self::I64
    }

    #[must_use]
    pub fn is_f64(self) -> bool {
        self == Self::F64
    }

    #[must_use]
    pub fn is_bool(self) -> bool {
        self == Self::BOOL
    }
}

/// Structure of a type. Interned by [`TypeTable`]; compared by handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Bool,
    I64,
    F64,
    Str,
    /// A function signature: argument types and return type.
    Function {
        params: SmallVec<[TypeDescr; 4]>,
        ret: TypeDescr,
    },
    /// An opaque host-named type.
    Named(USym),
}

/// Interner for [`TypeDescr`] handles.
#[derive(Debug)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    index: AHashMap<TypeKind, u32>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Creates a table pre-seeded with the built-in scalar types in their
    /// canonical slots, plus the numeric primitive signatures.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            kinds: Vec::new(),
            index: AHashMap::new(),
        };
        // Order must match the TypeDescr constants.
        table.intern(TypeKind::Bool);
        table.intern(TypeKind::I64);
        table.intern(TypeKind::F64);
        table.intern(TypeKind::Str);
        // Signatures of the built-in numeric primitives.
        for (a, r) in [
            (TypeDescr::I64, TypeDescr::I64),
            (TypeDescr::I64, TypeDescr::BOOL),
            (TypeDescr::F64, TypeDescr::F64),
            (TypeDescr::F64, TypeDescr::BOOL),
        ] {
            table.intern(TypeKind::Function {
                params: SmallVec::from_slice(&[a, a]),
                ret: r,
            });
        }
        table
    }

    /// Interns `kind`, returning its unique handle.
    pub fn intern(&mut self, kind: TypeKind) -> TypeDescr {
        if let Some(&id) = self.index.get(&kind) {
            return TypeDescr(id);
        }
        let id = u32::try_from(self.kinds.len()).expect("type table overflow");
        self.kinds.push(kind.clone());
        self.index.insert(kind, id);
        TypeDescr(id)
    }

    /// Returns the handle for `kind` without interning it.
    #[must_use]
    pub fn lookup(&self, kind: &TypeKind) -> Option<TypeDescr> {
        self.index.get(kind).map(|&id| TypeDescr(id))
    }

    /// Interns a function signature.
    pub fn function(&mut self, params: &[TypeDescr], ret: TypeDescr) -> TypeDescr {
        self.intern(TypeKind::Function {
            params: SmallVec::from_slice(params),
            ret,
        })
    }

    /// Interns a host-named opaque type.
    pub fn named(&mut self, name: USym) -> TypeDescr {
        self.intern(TypeKind::Named(name))
    }

    /// Resolves a built-in type by its surface name.
    #[must_use]
    pub fn builtin_by_name(name: &str) -> Option<TypeDescr> {
        match name {
            "bool" => Some(TypeDescr::BOOL),
            "i64" => Some(TypeDescr::I64),
            "f64" => Some(TypeDescr::F64),
            "string" => Some(TypeDescr::STR),
            _ => None,
        }
    }

    /// Returns the structure of `td`.
    #[must_use]
    pub fn kind(&self, td: TypeDescr) -> &TypeKind {
        &self.kinds[td.index()]
    }

    #[must_use]
    pub fn is_function(&self, td: TypeDescr) -> bool {
        matches!(self.kind(td), TypeKind::Function { .. })
    }

    /// Return type of a function descriptor, if `td` is one.
    #[must_use]
    pub fn return_type(&self, td: TypeDescr) -> Option<TypeDescr> {
        match self.kind(td) {
            TypeKind::Function { ret, .. } => Some(*ret),
            _ => None,
        }
    }

    /// Parameter types of a function descriptor, if `td` is one.
    #[must_use]
    pub fn param_types(&self, td: TypeDescr) -> Option<&[TypeDescr]> {
        match self.kind(td) {
            TypeKind::Function { params, .. } => Some(params),
            _ => None,
        }
    }

    /// Renders `td` for diagnostics, e.g. `function(i64, i64 -> bool)`.
    #[must_use]
    pub fn display(&self, td: TypeDescr, strings: &StringTable) -> String {
        match self.kind(td) {
            TypeKind::Bool => "bool".to_owned(),
            TypeKind::I64 => "i64".to_owned(),
            TypeKind::F64 => "f64".to_owned(),
            TypeKind::Str => "string".to_owned(),
            TypeKind::Function { params, ret } => {
                let mut out = String::from("function(");
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&self.display(*p, strings));
                }
                out.push_str(" -> ");
                out.push_str(&self.display(*ret, strings));
                out.push(')');
                out
            }
            TypeKind::Named(name) => strings.resolve(*name).to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_occupy_canonical_slots() {
        let table = TypeTable::new();
        assert!(matches!(table.kind(TypeDescr::BOOL), TypeKind::Bool));
        assert!(matches!(table.kind(TypeDescr::I64), TypeKind::I64));
        assert!(matches!(table.kind(TypeDescr::F64), TypeKind::F64));
        assert!(matches!(table.kind(TypeDescr::STR), TypeKind::Str));
    }

    #[test]
    fn function_signatures_are_identity_interned() {
        let mut table = TypeTable::new();
        let a = table.function(&[TypeDescr::I64], TypeDescr::I64);
        let b = table.function(&[TypeDescr::I64], TypeDescr::I64);
        let c = table.function(&[TypeDescr::F64], TypeDescr::I64);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.return_type(a), Some(TypeDescr::I64));
    }
}
