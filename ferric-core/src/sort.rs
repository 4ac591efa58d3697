//! Sort System for Terms.
//!
//! Provides the built-in `Bool` and `Int` sorts plus user-declared
//! uninterpreted sorts, referenced by lightweight [`SortId`] handles.

use lasso::{Rodeo, Spur};
use rustc_hash::FxHashMap;

/// A sort identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortId(u32);

impl SortId {
    /// Create a sort id from a raw index.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A declared sort.
#[derive(Debug, Clone)]
pub struct Sort {
    /// Interned sort name.
    pub name: Spur,
}

/// Registry of all sorts known to a term manager.
///
/// The built-in sorts are available as public fields, so callers write
/// `tm.sorts.bool_sort` rather than looking them up by name.
#[derive(Debug)]
pub struct SortRegistry {
    sorts: Vec<Sort>,
    index: FxHashMap<Spur, SortId>,
    names: Rodeo,
    /// The Boolean sort.
    pub bool_sort: SortId,
    /// The integer sort.
    pub int_sort: SortId,
}

impl SortRegistry {
    /// Create a registry with the built-in sorts installed.
    pub fn new() -> Self {
        let mut registry = Self {
            sorts: Vec::new(),
            index: FxHashMap::default(),
            names: Rodeo::default(),
            bool_sort: SortId::new(0),
            int_sort: SortId::new(0),
        };
        registry.bool_sort = registry.declare("Bool");
        registry.int_sort = registry.declare("Int");
        registry
    }

    /// Declare a sort by name, returning the existing id if already declared.
    pub fn declare(&mut self, name: &str) -> SortId {
        let key = self.names.get_or_intern(name);
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = SortId::new(self.sorts.len() as u32);
        self.sorts.push(Sort { name: key });
        self.index.insert(key, id);
        id
    }

    /// Get a sort by id.
    #[must_use]
    pub fn get(&self, id: SortId) -> Option<&Sort> {
        self.sorts.get(id.raw() as usize)
    }

    /// Get the name of a sort.
    #[must_use]
    pub fn name(&self, id: SortId) -> &str {
        self.get(id).map_or("?", |s| self.names.resolve(&s.name))
    }

    /// Number of declared sorts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sorts.len()
    }

    /// Check if the registry is empty (never true: built-ins are installed).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sorts.is_empty()
    }
}

impl Default for SortRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sorts() {
        let sorts = SortRegistry::new();
        assert_ne!(sorts.bool_sort, sorts.int_sort);
        assert_eq!(sorts.name(sorts.bool_sort), "Bool");
        assert_eq!(sorts.name(sorts.int_sort), "Int");
    }

    #[test]
    fn test_declare_idempotent() {
        let mut sorts = SortRegistry::new();
        let s1 = sorts.declare("Elem");
        let s2 = sorts.declare("Elem");
        assert_eq!(s1, s2);
        assert_eq!(sorts.name(s1), "Elem");
    }

    #[test]
    fn test_declare_distinct() {
        let mut sorts = SortRegistry::new();
        let a = sorts.declare("A");
        let b = sorts.declare("B");
        assert_ne!(a, b);
    }
}
