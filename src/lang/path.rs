//! Dotted field references
//!
//! A `Path` is parsed once into its pieces and then only compared by its
//! literal. Traversal descends through objects by key and through arrays
//! by numeric index.

use std::fmt;

use serde_json::{Map, Value};

use super::{Document, ID_FIELD};
use crate::errors::{QueryError, QueryResult};

/// An immutable, parsed dotted field reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    literal: String,
    pieces: Vec<String>,
}

impl Path {
    /// Parses a dotted literal into a path
    pub fn new(literal: impl Into<String>) -> Self {
        let literal = literal.into();
        let pieces = literal.split('.').map(str::to_string).collect();
        Self { literal, pieces }
    }

    /// Parses a dotted literal, rejecting empty pieces and operator-prefixed pieces
    pub fn parse(literal: &str) -> QueryResult<Self> {
        let path = Self::new(literal);
        for piece in &path.pieces {
            if piece.is_empty() {
                return Err(QueryError::validation(format!(
                    "path '{}' contains an empty piece",
                    literal
                )));
            }
            if piece.starts_with('$') {
                return Err(QueryError::validation(format!(
                    "path '{}' contains a piece starting with '$'",
                    literal
                )));
            }
        }
        Ok(path)
    }

    /// The identity path `_id`
    pub fn id() -> Self {
        Self::new(ID_FIELD)
    }

    /// The literal dotted string
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// The parsed pieces in traversal order
    pub fn pieces(&self) -> &[String] {
        &self.pieces
    }

    /// The final piece
    pub fn last(&self) -> &str {
        self.pieces.last().map(String::as_str).unwrap_or("")
    }

    /// Returns true for the identity path
    pub fn is_id(&self) -> bool {
        self.literal == ID_FIELD
    }

    /// Resolves the path against a document.
    ///
    /// Returns `None` when an intermediate value is missing or not nested,
    /// or when the terminal key is missing. A stored `null` resolves to
    /// `Some(Value::Null)`.
    pub fn resolve<'a>(&self, document: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.pieces.split_first()?;
        let mut current = document.get(first)?;
        for piece in rest {
            current = child(current, piece)?;
        }
        Some(current)
    }

    /// Sets a value, creating intermediate objects where keys are missing.
    ///
    /// Returns false if an intermediate value exists but is not nested.
    pub fn set(&self, document: &mut Document, value: Value) -> bool {
        match self.pieces.split_first() {
            None => false,
            Some((first, [])) => {
                document.insert(first.clone(), value);
                true
            }
            Some((first, rest)) => {
                let slot = document
                    .entry(first.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                set_nested(slot, rest, value)
            }
        }
    }

    /// Removes the value at this path. Returns the removed value, if any.
    pub fn remove(&self, document: &mut Document) -> Option<Value> {
        let (last, parents) = self.pieces.split_last()?;
        let (first, rest) = match parents.split_first() {
            Some(split) => split,
            None => return document.remove(last),
        };

        let mut current = document.get_mut(first)?;
        for piece in rest {
            current = child_mut(current, piece)?;
        }
        match current {
            Value::Object(map) => map.remove(last),
            Value::Array(items) => {
                let index = last.parse::<usize>().ok()?;
                (index < items.len()).then(|| items.remove(index))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.literal)
    }
}

/// Descends one piece into a nested value
pub(crate) fn child<'a>(value: &'a Value, piece: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(piece),
        Value::Array(items) => piece.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, piece: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(piece),
        Value::Array(items) => piece
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

// Arrays are only descended by existing index; they are never grown.
fn set_nested(target: &mut Value, pieces: &[String], value: Value) -> bool {
    let Some((piece, rest)) = pieces.split_first() else {
        return false;
    };

    if rest.is_empty() {
        return match target {
            Value::Object(map) => {
                map.insert(piece.clone(), value);
                true
            }
            Value::Array(items) => match piece.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            _ => false,
        };
    }

    let next = match target {
        Value::Object(map) => map
            .entry(piece.clone())
            .or_insert_with(|| Value::Object(Map::new())),
        Value::Array(items) => match piece.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => slot,
            None => return false,
        },
        _ => return false,
    };
    set_nested(next, rest, value)
}
