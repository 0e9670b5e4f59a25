//! Host-facing values.
//!
//! [`Object`] is the public result type: it owns its data and needs no heap
//! to inspect, unlike the internal `Value`, which may point into the GC
//! heap. Conversion happens once, when a top-level evaluation finishes.

use std::fmt;

use crate::{
    heap::{Heap, HeapData},
    intern::StringTable,
    value::Value,
};

/// A Schematika value that crossed the boundary out of the interpreter.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// No useful value (`if` without `else`, empty block).
    Unspecified,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    /// Functions have no owned representation; only the name crosses over.
    Closure { name: String },
    /// A native procedure.
    Primitive { name: &'static str },
}

impl Object {
    pub(crate) fn from_value(value: Value, heap: &Heap, strings: &StringTable) -> Self {
        match value {
            Value::Unspecified => Self::Unspecified,
            Value::Bool(b) => Self::Bool(b),
            Value::I64(v) => Self::I64(v),
            Value::F64(v) => Self::F64(v),
            Value::Primitive(p) => Self::Primitive { name: p.name() },
            Value::Ref(id) => match heap.get(id) {
                HeapData::Str(s) => Self::Str(s.to_string()),
                HeapData::Closure(c) => Self::Closure {
                    name: strings.resolve(c.code.name).to_owned(),
                },
                _ => Self::Unspecified,
            },
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "#unspecified"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{}", ryu::Buffer::new().format(*v)),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Closure { name } => write!(f, "<closure {name}>"),
            Self::Primitive { name } => write!(f, "#primitive:{name}"),
        }
    }
}
