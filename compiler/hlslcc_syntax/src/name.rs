//! Interned identifiers.
//!
//! Identifiers are compared constantly by the parser's scope chain and by
//! lowering, so they are interned once by the lexer into a per-compilation
//! [`NameTable`] and passed around as a 4-byte [`Name`].

use std::fmt;

use rustc_hash::FxHashMap;

/// Interned identifier, valid for the [`NameTable`] that produced it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// Per-compilation identifier table.
///
/// Not shared between compilations; concurrent compilations each own one.
#[derive(Clone, Default, Debug)]
pub struct NameTable {
    strings: Vec<Box<str>>,
    lookup: FxHashMap<Box<str>, Name>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "identifier count is bounded by source size"
    )]
    pub fn intern(&mut self, text: &str) -> Name {
        if let Some(&name) = self.lookup.get(text) {
            return name;
        }
        let name = Name(self.strings.len() as u32);
        self.strings.push(text.into());
        self.lookup.insert(text.into(), name);
        name
    }

    /// Find an already-interned identifier without inserting.
    pub fn get(&self, text: &str) -> Option<Name> {
        self.lookup.get(text).copied()
    }

    /// Text of `name`. Names from a different table resolve to `""`.
    pub fn resolve(&self, name: Name) -> &str {
        self.strings.get(name.0 as usize).map_or("", |s| s)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut names = NameTable::new();
        let a = names.intern("Color");
        let b = names.intern("Color");
        let c = names.intern("Position");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(names.resolve(c), "Position");
        assert_eq!(names.get("Position"), Some(c));
        assert_eq!(names.get("Missing"), None);
        assert_eq!(names.len(), 2);
    }
}
