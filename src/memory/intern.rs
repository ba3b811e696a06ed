//! String interning for highly repeated values.
//!
//! Project, module, and folder names repeat across hundreds of
//! thousands of records. Interning hands out shared `Arc<str>` values
//! so the multimaps key one allocation per distinct string; cloning an
//! interned key is a pointer bump.

use ahash::AHashSet;
use std::sync::Arc;

#[derive(Default)]
pub struct Interner {
    strings: AHashSet<Arc<str>>,
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared copy of `s`, inserting it on first sight.
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let arc: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&arc));
        arc
    }

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
    fn test_intern_shares_allocation() {
        let mut interner = Interner::new();
        let a = interner.intern("Game.Source.Runtime");
        let b = interner.intern("Game.Source.Runtime");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn test_distinct_strings() {
        let mut interner = Interner::new();
        let a = interner.intern("Game");
        let b = interner.intern("Engine");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 2);
    }
}
