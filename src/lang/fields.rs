//! Per-document memoized field resolution
//!
//! A `Fields` wrapper is created for one document as it passes through a
//! stage and dropped with it. Lookups that fail to resolve yield
//! `Field::Absent`, which is distinct from a stored `null`.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;

use super::{Document, Path};

/// Outcome of resolving a path against a document
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    /// Missing terminal key, or an intermediate that is missing or not nested
    Absent,
    /// Resolved value (possibly `null`)
    Present(&'a Value),
}

impl<'a> Field<'a> {
    /// Returns true if the field resolved
    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }

    /// Returns the resolved value, if any
    pub fn value(&self) -> Option<&'a Value> {
        match self {
            Field::Absent => None,
            Field::Present(v) => Some(v),
        }
    }
}

impl<'a> From<Option<&'a Value>> for Field<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        value.map(Field::Present).unwrap_or(Field::Absent)
    }
}

/// Memoizing resolver bound to a single document
pub struct Fields<'a> {
    document: &'a Document,
    cache: RefCell<HashMap<String, Field<'a>>>,
}

impl<'a> Fields<'a> {
    /// Wraps a document
    pub fn new(document: &'a Document) -> Self {
        Self {
            document,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The wrapped document
    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Resolves a path, caching the result for this document
    pub fn get(&self, path: &Path) -> Field<'a> {
        if let Some(hit) = self.cache.borrow().get(path.literal()) {
            return *hit;
        }
        let field = Field::from(path.resolve(self.document));
        self.cache
            .borrow_mut()
            .insert(path.literal().to_string(), field);
        field
    }

    /// Returns true iff every path resolves to a present value
    pub fn ensure(&self, paths: &[Path]) -> bool {
        paths.iter().all(|path| self.get(path).is_present())
    }
}
