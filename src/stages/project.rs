//! Project stage
//!
//! A projection spec maps paths to either a directive or an expression:
//! - `true`/`1` includes an existing field, `false`/`0` excludes it
//! - anything else computes a new field with the expression compiler
//!
//! Directives on existing fields must all agree. `_id` is kept unless the
//! spec excludes it explicitly, and its directive never conflicts with the
//! others.

use serde_json::{Map, Value};

use crate::cursor::{Producer, ProducerFuture};
use crate::errors::{QueryError, QueryResult};
use crate::lang::{CompiledExpression, Document, Fields, OperatorTable, Path, ID_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Inclusion,
    Exclusion,
    /// Only computed fields: the document passes through
    Computed,
}

/// A compiled projection
#[derive(Debug, Clone)]
pub struct Projection {
    mode: Mode,
    paths: Vec<Path>,
    include_id: bool,
    computed: Vec<(Path, CompiledExpression)>,
    spec: Value,
}

fn directive(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    }
}

impl Projection {
    /// Compiles a projection spec
    pub fn compile(spec: &Value, operators: &OperatorTable) -> QueryResult<Self> {
        let map = spec
            .as_object()
            .ok_or_else(|| QueryError::pipeline(format!("projection must be a document, got {}", spec)))?;

        let mut inclusion: Option<bool> = None;
        let mut paths = Vec::new();
        let mut include_id = true;
        let mut computed = Vec::new();

        for (key, value) in map {
            let path = Path::parse(key)?;
            match directive(value) {
                Some(flag) if path.is_id() => include_id = flag,
                Some(flag) => {
                    match inclusion {
                        Some(mode) if mode != flag => {
                            return Err(QueryError::ProjectionModeConflict(format!(
                                "'{}' {} a field while an earlier directive {} one",
                                key,
                                if flag { "includes" } else { "excludes" },
                                if mode { "includes" } else { "excludes" },
                            )))
                        }
                        _ => inclusion = Some(flag),
                    }
                    paths.push(path);
                }
                None => computed.push((path, CompiledExpression::compile(value, operators)?)),
            }
        }

        let mode = match inclusion {
            Some(true) => Mode::Inclusion,
            Some(false) => Mode::Exclusion,
            None => Mode::Computed,
        };

        Ok(Self {
            mode,
            paths,
            include_id,
            computed,
            spec: spec.clone(),
        })
    }

    /// The source spec
    pub fn spec(&self) -> &Value {
        &self.spec
    }

    /// Applies the projection to one document
    pub fn apply(&self, document: Document) -> Document {
        let values: Vec<(&Path, Value)> = {
            let fields = Fields::new(&document);
            self.computed
                .iter()
                .filter_map(|(path, expr)| expr.evaluate(&fields).map(|v| (path, v)))
                .collect()
        };

        let mut out = match self.mode {
            Mode::Inclusion => {
                let mut out = Map::new();
                if self.include_id {
                    if let Some(id) = document.get(ID_FIELD) {
                        out.insert(ID_FIELD.to_string(), id.clone());
                    }
                }
                for path in &self.paths {
                    if let Some(value) = path.resolve(&document) {
                        path.set(&mut out, value.clone());
                    }
                }
                out
            }
            Mode::Exclusion | Mode::Computed => {
                let mut out = document;
                for path in &self.paths {
                    path.remove(&mut out);
                }
                if !self.include_id {
                    out.remove(ID_FIELD);
                }
                out
            }
        };

        for (path, value) in values {
            path.set(&mut out, value);
        }
        out
    }
}

/// Reshapes each document
pub struct ProjectProducer {
    inner: Box<dyn Producer>,
    projection: Projection,
}

impl ProjectProducer {
    pub fn new(inner: Box<dyn Producer>, projection: Projection) -> Self {
        Self { inner, projection }
    }
}

impl Producer for ProjectProducer {
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
        Box::pin(async move {
            let next = self.inner.advance().await?;
            Ok(next.map(|document| self.projection.apply(document)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project(spec: Value, doc: Value) -> Value {
        let projection = Projection::compile(&spec, &OperatorTable::standard()).unwrap();
        let doc = doc.as_object().cloned().unwrap_or_default();
        Value::Object(projection.apply(doc))
    }

    #[test]
    fn test_inclusion_keeps_id() {
        let out = project(json!({"a": 1}), json!({"a": 1, "b": 2, "_id": 9}));
        assert_eq!(out, json!({"a": 1, "_id": 9}));
    }

    #[test]
    fn test_exclusion() {
        let out = project(json!({"b": 0}), json!({"a": 1, "b": 2, "_id": 9}));
        assert_eq!(out, json!({"a": 1, "_id": 9}));

        let out = project(json!({"b": false, "_id": 0}), json!({"a": 1, "b": 2, "_id": 9}));
        assert_eq!(out, json!({"a": 1}));
    }

    #[test]
    fn test_mixed_directives_conflict() {
        let err = Projection::compile(&json!({"a": 1, "b": 0}), &OperatorTable::standard())
            .unwrap_err();
        assert_eq!(err.code(), "QUERY_PROJECTION_MODE_CONFLICT");

        // The _id directive never conflicts.
        assert!(Projection::compile(&json!({"a": 1, "_id": 0}), &OperatorTable::standard()).is_ok());
    }

    #[test]
    fn test_nested_inclusion() {
        let out = project(json!({"a.b": 1, "_id": false}), json!({"a": {"b": 1, "c": 2}, "d": 3}));
        assert_eq!(out, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_computed_fields() {
        let out = project(
            json!({"total": {"$add": ["$x", "$y"]}, "label": "fixed"}),
            json!({"_id": 1, "x": 2, "y": 3}),
        );
        assert_eq!(out, json!({"_id": 1, "x": 2, "y": 3, "total": 5, "label": "fixed"}));
    }

    #[test]
    fn test_computed_field_skipped_when_dependency_absent() {
        let out = project(
            json!({"a": 1, "double": {"$multiply": ["$n", 2]}}),
            json!({"_id": 1, "a": 4}),
        );
        assert_eq!(out, json!({"_id": 1, "a": 4}));
    }
}
