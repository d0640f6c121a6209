//! Scope chain for type-name disambiguation.
//!
//! HLSL cannot be parsed without knowing which identifiers name types:
//! `Foo (x);` is a declaration if `Foo` is a struct and a call otherwise.
//! Each `{}`-delimited construct opens a scope; a name is a type while a
//! scope declaring `struct Name` is on the chain.
//!
//! Declarations are journaled so a rule that declines can take back the
//! types it declared along with the tokens it consumed.

use rustc_hash::FxHashSet;

use hlslcc_syntax::Name;

#[derive(Debug)]
pub(crate) struct ScopeStack {
    scopes: Vec<FxHashSet<Name>>,
    /// `(scope index, name)` of every declaration still in effect, oldest
    /// first.
    journal: Vec<(usize, Name)>,
}

/// Journal position to rewind to with [`ScopeStack::rewind`].
#[derive(Copy, Clone, Debug)]
pub(crate) struct ScopeMark(usize);

impl ScopeStack {
    /// A chain holding only the global scope.
    pub(crate) fn new() -> Self {
        ScopeStack {
            scopes: vec![FxHashSet::default()],
            journal: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self) {
        self.scopes.push(FxHashSet::default());
    }

    /// Leave the innermost scope. The global scope is never popped.
    pub(crate) fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
            let depth = self.scopes.len();
            while self.journal.last().is_some_and(|&(scope, _)| scope >= depth) {
                self.journal.pop();
            }
        }
    }

    pub(crate) fn declare_type(&mut self, name: Name) {
        let index = self.scopes.len() - 1;
        if let Some(scope) = self.scopes.last_mut() {
            if scope.insert(name) {
                self.journal.push((index, name));
            }
        }
    }

    pub(crate) fn mark(&self) -> ScopeMark {
        ScopeMark(self.journal.len())
    }

    /// Undo every declaration made since `mark`. Scopes pushed since then
    /// must have been popped.
    pub(crate) fn rewind(&mut self, mark: ScopeMark) {
        while self.journal.len() > mark.0 {
            let Some((scope, name)) = self.journal.pop() else {
                break;
            };
            if let Some(scope) = self.scopes.get_mut(scope) {
                scope.remove(&name);
            }
        }
    }

    /// Look `name` up through the chain, innermost first.
    pub(crate) fn is_type(&self, name: Name) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(&name))
    }

    pub(crate) fn depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use hlslcc_syntax::NameTable;

    use super::*;

    #[test]
    fn inner_declarations_disappear_on_pop() {
        let mut names = NameTable::new();
        let outer = names.intern("Outer");
        let inner = names.intern("Inner");
        let mut scopes = ScopeStack::new();
        scopes.declare_type(outer);
        scopes.push();
        scopes.declare_type(inner);
        assert!(scopes.is_type(outer));
        assert!(scopes.is_type(inner));
        scopes.pop();
        assert!(!scopes.is_type(inner));
        assert!(scopes.is_type(outer));
        scopes.pop();
        assert_eq!(scopes.depth(), 1);
    }

    #[test]
    fn rewind_takes_back_later_declarations() {
        let mut names = NameTable::new();
        let kept = names.intern("Kept");
        let dropped = names.intern("Dropped");
        let mut scopes = ScopeStack::new();
        scopes.declare_type(kept);
        let mark = scopes.mark();
        scopes.declare_type(dropped);
        scopes.declare_type(kept);
        scopes.push();
        scopes.declare_type(names.intern("Nested"));
        scopes.pop();
        scopes.rewind(mark);
        assert!(scopes.is_type(kept));
        assert!(!scopes.is_type(dropped));
    }
}
