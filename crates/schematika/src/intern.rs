//! String interning for symbols and identifiers.
//!
//! A [`StringTable`] stores each distinct byte sequence once and hands out
//! [`USym`] handles. Two handles are equal iff they name the same sequence,
//! so symbol comparison everywhere else in the crate is an integer compare.
//! Handles live as long as the table; callers never release them.
//!
//! [`StringTable::gensym`] manufactures symbols guaranteed distinct from
//! anything previously interned or gensymed. Generated names contain a `#`,
//! which the tokenizer never produces, so surface programs cannot collide
//! with them.

use ahash::AHashMap;

/// Handle for an interned string.
///
/// Uses `u32` to save space (4 bytes vs 8 for `usize`). This limits us to
/// ~4 billion unique symbols, which is more than sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct USym(u32);

impl USym {
    /// Returns the raw index into the table's storage.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Process-wide table mapping byte sequences to unique [`USym`] handles.
///
/// Append-only: interning is the only write, and entries are never removed.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: Vec<Box<str>>,
    index: AHashMap<Box<str>, u32>,
    n_gensym: u32,
}

impl StringTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `text`, returning the unique handle for that sequence.
    pub fn intern(&mut self, text: &str) -> USym {
        if let Some(&id) = self.index.get(text) {
            return USym(id);
        }
        let id = u32::try_from(self.strings.len()).expect("string table overflow");
        self.strings.push(text.into());
        self.index.insert(text.into(), id);
        USym(id)
    }

    /// Returns the handle for `text` if it has already been interned.
    #[must_use]
    pub fn lookup(&self, text: &str) -> Option<USym> {
        self.index.get(text).map(|&id| USym(id))
    }

    /// Returns the text named by `sym`.
    #[must_use]
    pub fn resolve(&self, sym: USym) -> &str {
        &self.strings[sym.index()]
    }

    /// Manufactures a fresh symbol distinct from every existing one.
    ///
    /// The generated name is `{prefix}#{n}`; the counter is bumped until a
    /// free name is found, so host-side interning of a `#` name cannot make
    /// a later gensym collide.
    pub fn gensym(&mut self, prefix: &str) -> USym {
        loop {
            let candidate = format!("{prefix}#{}", self.n_gensym);
            self.n_gensym += 1;
            if !self.index.contains_key(candidate.as_str()) {
                return self.intern(&candidate);
            }
        }
    }

    /// Number of interned strings (including gensyms).
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut table = StringTable::new();
        let a = table.intern("pi");
        let b = table.intern("pi");
        assert_eq!(a, b);
        assert_eq!(table.resolve(a), "pi");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_handles() {
        let mut table = StringTable::new();
        let a = table.intern("x");
        let b = table.intern("y");
        assert_ne!(a, b);
    }

    #[test]
    fn gensym_never_collides() {
        let mut table = StringTable::new();
        // Pre-intern a name shaped like the first gensym would be.
        let taken = table.intern("tmp#0");
        let fresh = table.gensym("tmp");
        assert_ne!(taken, fresh);
        let fresh2 = table.gensym("tmp");
        assert_ne!(fresh, fresh2);
    }

    #[test]
    fn lookup_does_not_intern() {
        let table = StringTable::new();
        assert!(table.lookup("nope").is_none());
        assert_eq!(table.len(), 0);
    }
}
