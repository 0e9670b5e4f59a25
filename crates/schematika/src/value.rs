//! The runtime value universe.
//!
//! Scalars are immediate: a [`Value`] is a small `Copy` tag that either
//! carries its payload inline (`Bool`, `I64`, `F64`, a [`Primitive`]) or
//! points into the GC heap (`Ref`). The collector only ever has to forward
//! `Ref` fields; everything else is untouched by a collection.

use crate::{heap::Heap, intern::StringTable, primitive::Primitive};

pub use crate::heap::HeapId;

/// One runtime value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// No useful value: an unassigned slot, or the result of an `if` with
    /// no `else` branch.
    Unspecified,
    Bool(bool),
    I64(i64),
    F64(f64),
    /// Reference to a heap object (string, array, closure, environment,
    /// frame).
    Ref(HeapId),
    /// A native procedure.
    Primitive(Primitive),
}

impl Value {
    /// Runtime kind name for diagnostics.
    #[must_use]
    pub fn kind_name(&self, heap: &Heap) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Bool(_) => "bool",
            Self::I64(_) => "i64",
            Self::F64(_) => "f64",
            Self::Primitive(_) => "primitive",
            Self::Ref(id) => heap.kind_name(*id),
        }
    }

    /// Renders the value for output.
    #[must_use]
    pub fn display(&self, heap: &Heap, strings: &StringTable) -> String {
        match self {
            Self::Unspecified => "#unspecified".to_owned(),
            Self::Bool(b) => b.to_string(),
            Self::I64(v) => v.to_string(),
            Self::F64(v) => ryu::Buffer::new().format(*v).to_owned(),
            Self::Primitive(p) => format!("#primitive:{}", p.name()),
            Self::Ref(id) => heap.display_object(*id, strings),
        }
    }
}
