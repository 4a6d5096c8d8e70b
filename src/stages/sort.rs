//! Sort stage
//!
//! Materializes the remaining stream once, then emits it in multi-key
//! order. For each key:
//! - present values compare by the engine-wide value order
//! - a side that does not resolve (missing terminal key, or an
//!   intermediate that is not nested) sorts as the greater element
//! - two unresolved sides tie and fall through to the next key
//!
//! When every key ties, documents are ordered by `_id` in the direction of
//! the last key, which is also the order an index scan yields ties in.

use std::cmp::Ordering;
use std::collections::VecDeque;

use serde_json::{Map, Value};

use crate::cursor::{Producer, ProducerFuture};
use crate::errors::{QueryError, QueryResult};
use crate::lang::{compare_values, Document, Path};
use crate::storage::Direction;

/// Ordered sort keys
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    keys: Vec<(Path, Direction)>,
}

impl SortSpec {
    /// Compiles `{ path: 1 | -1, ... }`
    pub fn compile(spec: &Value) -> QueryResult<Self> {
        let map = match spec {
            Value::Object(map) if !map.is_empty() => map,
            other => {
                return Err(QueryError::pipeline(format!(
                    "sort spec must be a non-empty document, got {}",
                    other
                )))
            }
        };

        let mut keys = Vec::with_capacity(map.len());
        for (key, value) in map {
            let direction = Direction::from_directive(value).ok_or_else(|| {
                QueryError::pipeline(format!(
                    "sort direction for '{}' must be 1 or -1, got {}",
                    key, value
                ))
            })?;
            keys.push((Path::parse(key)?, direction));
        }
        Ok(Self { keys })
    }

    /// Merges a later spec into this one.
    ///
    /// A path present in both takes the later direction and keeps its
    /// earlier position; new paths are appended.
    pub fn merge(&mut self, later: SortSpec) {
        for (path, direction) in later.keys {
            match self.keys.iter_mut().find(|(p, _)| *p == path) {
                Some(entry) => entry.1 = direction,
                None => self.keys.push((path, direction)),
            }
        }
    }

    /// The ordered keys
    pub fn keys(&self) -> &[(Path, Direction)] {
        &self.keys
    }

    /// The direction requested for a path, if it is a sort key
    pub fn direction_of(&self, path: &Path) -> Option<Direction> {
        self.keys
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, direction)| *direction)
    }

    /// Returns true if a scan over `path` alone yields this order
    pub fn is_served_by(&self, path: &Path) -> bool {
        matches!(self.keys.as_slice(), [(only, _)] if only == path)
    }

    /// Compares two documents
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (path, direction) in &self.keys {
            let ord = direction.apply(compare_resolved(path.resolve(a), path.resolve(b)));
            if ord != Ordering::Equal {
                return ord;
            }
        }

        let direction = self
            .keys
            .last()
            .map(|(_, d)| *d)
            .unwrap_or(Direction::Ascending);
        let id = Path::id();
        direction.apply(compare_resolved(id.resolve(a), id.resolve(b)))
    }

    /// Describes the spec as a sort document
    pub fn describe(&self) -> Value {
        let mut map = Map::new();
        for (path, direction) in &self.keys {
            map.insert(path.literal().to_string(), Value::from(direction.directive()));
        }
        Value::Object(map)
    }
}

fn compare_resolved(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => compare_values(x, y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}

/// Buffers its source and emits it sorted
pub struct SortProducer {
    inner: Box<dyn Producer>,
    spec: SortSpec,
    sorted: Option<VecDeque<Document>>,
}

impl SortProducer {
    pub fn new(inner: Box<dyn Producer>, spec: SortSpec) -> Self {
        Self {
            inner,
            spec,
            sorted: None,
        }
    }
}

impl Producer for SortProducer {
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
        Box::pin(async move {
            if self.sorted.is_none() {
                let mut buffer = Vec::new();
                while let Some(document) = self.inner.advance().await? {
                    buffer.push(document);
                }
                buffer.sort_by(|a, b| self.spec.compare(a, b));
                self.sorted = Some(buffer.into());
            }
            Ok(self.sorted.as_mut().and_then(VecDeque::pop_front))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::testing::{collect, VecProducer};
    use serde_json::json;

    fn spec(value: Value) -> SortSpec {
        SortSpec::compile(&value).unwrap()
    }

    #[test]
    fn test_compile_rejects_bad_direction() {
        assert!(SortSpec::compile(&json!({"a": 2})).is_err());
        assert!(SortSpec::compile(&json!({})).is_err());
        assert!(SortSpec::compile(&json!([1])).is_err());
    }

    #[test]
    fn test_merge_later_overwrites() {
        let mut merged = spec(json!({"a": 1, "b": 1}));
        merged.merge(spec(json!({"b": -1, "c": 1})));
        assert_eq!(merged.describe(), json!({"a": 1, "b": -1, "c": 1}));
        assert_eq!(merged.direction_of(&Path::new("b")), Some(Direction::Descending));
        assert!(!merged.is_served_by(&Path::new("a")));
        assert!(spec(json!({"a": -1})).is_served_by(&Path::new("a")));
    }

    #[tokio::test]
    async fn test_multi_key_sort() {
        let source = VecProducer::new(vec![
            json!({"_id": 1, "a": 2, "b": 1}),
            json!({"_id": 2, "a": 1, "b": 5}),
            json!({"_id": 3, "a": 2, "b": 3}),
            json!({"_id": 4, "b": 0}),
        ]);
        let mut sort = SortProducer::new(Box::new(source), spec(json!({"a": 1, "b": -1})));
        let ids: Vec<Value> = collect(&mut sort).await.into_iter().map(|d| d["_id"].clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(3), json!(1), json!(4)]);
    }

    #[tokio::test]
    async fn test_missing_sorts_first_when_descending() {
        let source = VecProducer::new(vec![
            json!({"_id": 1, "a": {"b": 1}}),
            json!({"_id": 2, "a": 5}),
            json!({"_id": 3, "a": {"b": 2}}),
        ]);
        let mut sort = SortProducer::new(Box::new(source), spec(json!({"a.b": -1})));
        let ids: Vec<Value> = collect(&mut sort).await.into_iter().map(|d| d["_id"].clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(3), json!(1)]);
    }

    #[tokio::test]
    async fn test_ties_fall_back_to_id() {
        let source = VecProducer::new(vec![
            json!({"_id": 3, "a": 1}),
            json!({"_id": 1, "a": 1}),
            json!({"_id": 2}),
            json!({"_id": 0}),
        ]);
        let mut sort = SortProducer::new(Box::new(source), spec(json!({"a": 1})));
        let ids: Vec<Value> = collect(&mut sort).await.into_iter().map(|d| d["_id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(3), json!(0), json!(2)]);
    }

    #[tokio::test]
    async fn test_structural_values() {
        let source = VecProducer::new(vec![
            json!({"_id": 1, "a": [1, 2]}),
            json!({"_id": 2, "a": [1]}),
            json!({"_id": 3, "a": "x"}),
        ]);
        let mut sort = SortProducer::new(Box::new(source), spec(json!({"a": 1})));
        let ids: Vec<Value> = collect(&mut sort).await.into_iter().map(|d| d["_id"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(2), json!(1)]);
    }
}
