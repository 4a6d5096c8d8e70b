//! Update specs
//!
//! `{ "<path>": <expression>, ... }` assigns each expression's value to its
//! path on every matched document, creating intermediate objects as
//! needed. All expressions are evaluated against the document as it was
//! before the update. An expression whose inputs are absent leaves its
//! path untouched.

use serde_json::Value;

use super::validator::validate_document;
use crate::errors::{QueryError, QueryResult};
use crate::lang::{CompiledExpression, Document, Fields, OperatorTable, Path, ID_FIELD};

/// A compiled update spec
#[derive(Debug, Clone)]
pub struct UpdateSpec {
    assignments: Vec<(Path, CompiledExpression)>,
}

impl UpdateSpec {
    /// Compiles an update spec. `_id` and paths below it cannot be assigned.
    pub fn compile(spec: &Value, operators: &OperatorTable) -> QueryResult<Self> {
        let map = match spec {
            Value::Object(map) if !map.is_empty() => map,
            other => {
                return Err(QueryError::validation(format!(
                    "update spec must be a non-empty document, got {}",
                    other
                )))
            }
        };

        let mut assignments = Vec::with_capacity(map.len());
        for (key, value) in map {
            let path = Path::parse(key)?;
            if path.pieces().first().map(String::as_str) == Some(ID_FIELD) {
                return Err(QueryError::validation("_id cannot be updated"));
            }
            assignments.push((path, CompiledExpression::compile(value, operators)?));
        }
        Ok(Self { assignments })
    }

    /// Applies the spec to one document
    pub fn apply(&self, mut document: Document) -> QueryResult<Document> {
        let values: Vec<(&Path, Value)> = {
            let fields = Fields::new(&document);
            self.assignments
                .iter()
                .filter_map(|(path, expr)| expr.evaluate(&fields).map(|v| (path, v)))
                .collect()
        };

        for (path, value) in values {
            if !path.set(&mut document, value) {
                return Err(QueryError::validation(format!(
                    "cannot set '{}': an intermediate value is not a document",
                    path
                )));
            }
        }
        validate_document(&document)?;
        Ok(document)
    }
}
