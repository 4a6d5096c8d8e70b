//! Unwind stage
//!
//! For each source document whose path resolves to an array, emits one
//! single-field document `{ <last piece>: element }` per element, in array
//! order. Sources where the path is absent, empty or not an array emit
//! nothing.

use std::collections::VecDeque;

use serde_json::{Map, Value};

use crate::cursor::{Producer, ProducerFuture};
use crate::errors::{QueryError, QueryResult};
use crate::lang::{Document, Path};

/// Parses an unwind argument of the form `"$a.b"`
pub fn parse_unwind_path(spec: &str) -> QueryResult<Path> {
    let literal = spec.strip_prefix('$').ok_or_else(|| {
        QueryError::pipeline(format!("unwind path must start with '$', got '{}'", spec))
    })?;
    Path::parse(literal).map_err(|_| QueryError::pipeline(format!("invalid unwind path '{}'", spec)))
}

/// Expands array fields into one document per element
pub struct UnwindProducer {
    inner: Box<dyn Producer>,
    path: Path,
    pending: VecDeque<Document>,
}

impl UnwindProducer {
    pub fn new(inner: Box<dyn Producer>, path: Path) -> Self {
        Self {
            inner,
            path,
            pending: VecDeque::new(),
        }
    }

    fn expand(&mut self, document: &Document) {
        let Some(Value::Array(elements)) = self.path.resolve(document) else {
            return;
        };
        let field = self.path.last().to_string();
        for element in elements {
            let mut out = Map::new();
            out.insert(field.clone(), element.clone());
            self.pending.push_back(out);
        }
    }
}

impl Producer for UnwindProducer {
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
        Box::pin(async move {
            loop {
                if let Some(next) = self.pending.pop_front() {
                    return Ok(Some(next));
                }
                match self.inner.advance().await? {
                    Some(document) => self.expand(&document),
                    None => return Ok(None),
                }
            }
        })
    }
}
