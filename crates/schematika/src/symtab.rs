//! Symbol tables and binding resolution.
//!
//! Two kinds share one lookup vocabulary. The [`GlobalSymtab`] is
//! process-wide, survives across top-level expressions, and is mutated only
//! at the interactive top level. A [`LocalSymtab`] belongs to one lexical
//! scope (a lambda's formals, one let-region variable); it is immutable once
//! the binding form has finished parsing, and chains to its parent scope.
//!
//! A [`Binding`] locates a variable as `(i_link, slot)`: hops up the scope
//! chain, then position within the scope. Slot order in the global table is
//! definition order, which is why it is insertion-ordered.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::{expr::VarDef, intern::USym};

/// Result of a scope-local lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Not found.
    Null,
    /// Found: cross `i_link` enclosing scopes, then index by `slot`.
    Local { i_link: u32, slot: u16 },
}

impl Binding {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// One lexical scope: an ordered list of variable definitions (positions are
/// the slot numbers) and a pointer to the enclosing scope.
#[derive(Debug)]
pub struct LocalSymtab {
    vars: Vec<Rc<VarDef>>,
    parent: Option<Rc<LocalSymtab>>,
}

impl LocalSymtab {
    /// Builds a scope from binder-order definitions, assigning slots.
    #[must_use]
    pub fn from_vars(vars: Vec<Rc<VarDef>>, parent: Option<Rc<Self>>) -> Rc<Self> {
        for (slot, var) in vars.iter().enumerate() {
            var.assign_slot(u16::try_from(slot).expect("scope slot overflow"));
        }
        Rc::new(Self { vars, parent })
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Rc<Self>> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Looks `name` up in this scope only; `i_link` is always 0.
    #[must_use]
    pub fn lookup_binding(&self, name: USym) -> Binding {
        for (slot, var) in self.vars.iter().enumerate() {
            if var.name() == name {
                return Binding::Local {
                    i_link: 0,
                    slot: u16::try_from(slot).expect("scope slot overflow"),
                };
            }
        }
        Binding::Null
    }

    /// Definition at `slot`, if in range.
    #[must_use]
    pub fn lookup_var(&self, slot: u16) -> Option<&Rc<VarDef>> {
        self.vars.get(slot as usize)
    }
}

/// Process-wide symbol table for top-level definitions.
#[derive(Debug, Default)]
pub struct GlobalSymtab {
    vars: IndexMap<USym, Rc<VarDef>, ahash::RandomState>,
}

impl GlobalSymtab {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the definition for `var`'s name, assigning its
    /// slot. Redefinition keeps the original slot so existing references
    /// stay valid.
    pub fn upsert(&mut self, var: Rc<VarDef>) -> u16 {
        let name = var.name();
        let slot = if let Some(i) = self.vars.get_index_of(&name) {
            self.vars[i] = Rc::clone(&var);
            i
        } else {
            self.vars.insert(name, Rc::clone(&var));
            self.vars.len() - 1
        };
        let slot = u16::try_from(slot).expect("global slot overflow");
        var.assign_slot(slot);
        slot
    }

    #[must_use]
    pub fn lookup(&self, name: USym) -> Option<&Rc<VarDef>> {
        self.vars.get(&name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::StringTable;

    #[test]
    fn local_lookup_reports_slot_positions() {
        let mut strings = StringTable::new();
        let x = VarDef::untyped(strings.intern("x"));
        let y = VarDef::untyped(strings.intern("y"));
        let scope = LocalSymtab::from_vars(vec![Rc::clone(&x), Rc::clone(&y)], None);
        assert_eq!(
            scope.lookup_binding(y.name()),
            Binding::Local { i_link: 0, slot: 1 }
        );
        assert!(scope.lookup_binding(strings.intern("z")).is_null());
    }

    #[test]
    fn global_redefinition_keeps_slot() {
        let mut strings = StringTable::new();
        let mut globals = GlobalSymtab::new();
        let name = strings.intern("x");
        let first = globals.upsert(VarDef::untyped(name));
        globals.upsert(VarDef::untyped(strings.intern("y")));
        let again = globals.upsert(VarDef::untyped(name));
        assert_eq!(first, again);
        assert_eq!(globals.len(), 2);
    }
}
