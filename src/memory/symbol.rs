//! Interned symbols
//!
//! Symbol slots hold a `SymbolId`, a copyable handle into a pool that
//! stores each distinct name once. The pool lives outside the heap and
//! is never collected.

use std::fmt;

use indexmap::IndexSet;

/// Handle to an interned symbol name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolId(u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym#{}", self.0)
    }
}

/// Deduplicating registry of symbol names
#[derive(Default, Debug)]
pub struct SymbolPool {
    names: IndexSet<String>,
}

impl SymbolPool {
    pub fn new() -> Self {
        SymbolPool::default()
    }

    /// Intern `name`, returning the existing id if already present
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(index) = self.names.get_index_of(name) {
            return SymbolId(index as u32);
        }
        let (index, _) = self.names.insert_full(name.to_string());
        SymbolId(index as u32)
    }

    /// Name for `id`, or `None` if the id came from another pool
    pub fn resolve(&self, id: SymbolId) -> Option<&str> {
        self.names.get_index(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
