//! Group stage
//!
//! `{ "_id": <key expression>, "<field>": { "<$accumulator>": <expression> }, ... }`
//!
//! Emits one document per distinct key, in first-seen order. Keys are
//! compared structurally, so `1` and `1.0` land in the same group. An
//! absent key expression groups under `null`.

use std::collections::{HashMap, VecDeque};

use serde_json::{Map, Value};

use crate::cursor::{Producer, ProducerFuture};
use crate::errors::{QueryError, QueryResult};
use crate::lang::{
    structural_hash, Accumulator, AccumulatorFactory, CompiledExpression, Document, Fields,
    OperatorTable, ValueHash, ID_FIELD,
};

#[derive(Debug, Clone)]
struct Output {
    field: String,
    accumulator: String,
    factory: AccumulatorFactory,
    input: CompiledExpression,
}

/// A compiled group spec
#[derive(Debug, Clone)]
pub struct Grouping {
    key: CompiledExpression,
    outputs: Vec<Output>,
    spec: Value,
}

impl Grouping {
    /// Compiles a group spec against an operator table
    pub fn compile(spec: &Value, operators: &OperatorTable) -> QueryResult<Self> {
        let map = spec
            .as_object()
            .ok_or_else(|| QueryError::pipeline(format!("group spec must be a document, got {}", spec)))?;

        let key_spec = map
            .get(ID_FIELD)
            .ok_or_else(|| QueryError::pipeline("group spec requires an '_id' key expression"))?;
        let key = CompiledExpression::compile(key_spec, operators)?;

        let mut outputs = Vec::new();
        for (field, value) in map {
            if field == ID_FIELD {
                continue;
            }
            if field.starts_with('$') || field.contains('.') {
                return Err(QueryError::pipeline(format!(
                    "invalid group output field '{}'",
                    field
                )));
            }

            let (accumulator, input) = match value.as_object() {
                Some(inner) if inner.len() == 1 => inner.iter().next().ok_or_else(|| {
                    QueryError::pipeline(format!("group field '{}' needs an accumulator", field))
                })?,
                _ => {
                    return Err(QueryError::pipeline(format!(
                        "group field '{}' must be a single accumulator document",
                        field
                    )))
                }
            };
            let factory = operators.accumulator(accumulator).ok_or_else(|| {
                QueryError::pipeline(format!("unknown accumulator '{}'", accumulator))
            })?;

            outputs.push(Output {
                field: field.clone(),
                accumulator: accumulator.clone(),
                factory,
                input: CompiledExpression::compile(input, operators)?,
            });
        }

        Ok(Self {
            key,
            outputs,
            spec: spec.clone(),
        })
    }

    /// The source spec
    pub fn spec(&self) -> &Value {
        &self.spec
    }
}

struct Group {
    key: Value,
    accumulators: Vec<Box<dyn Accumulator>>,
}

/// Folds its whole source into one document per group
pub struct GroupProducer {
    inner: Box<dyn Producer>,
    grouping: Grouping,
    groups: Vec<Group>,
    positions: HashMap<ValueHash, usize>,
    output: Option<VecDeque<Document>>,
}

impl GroupProducer {
    pub fn new(inner: Box<dyn Producer>, grouping: Grouping) -> Self {
        Self {
            inner,
            grouping,
            groups: Vec::new(),
            positions: HashMap::new(),
            output: None,
        }
    }

    fn absorb(&mut self, document: &Document) {
        let fields = Fields::new(document);
        let key = self.grouping.key.evaluate(&fields).unwrap_or(Value::Null);

        let hash = structural_hash(&key);
        let position = match self.positions.get(&hash) {
            Some(&position) => position,
            None => {
                let accumulators = self.grouping.outputs.iter().map(|o| (o.factory)()).collect();
                self.groups.push(Group { key, accumulators });
                self.positions.insert(hash, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };

        if let Some(group) = self.groups.get_mut(position) {
            for (output, accumulator) in self.grouping.outputs.iter().zip(group.accumulators.iter_mut()) {
                let value = output.input.evaluate(&fields);
                accumulator.accumulate(value.as_ref());
            }
        }
    }

    fn finish(&mut self) -> VecDeque<Document> {
        let groups = std::mem::take(&mut self.groups);
        self.positions.clear();
        groups
            .into_iter()
            .map(|group| {
                let mut document = Map::new();
                document.insert(ID_FIELD.to_string(), group.key);
                for (output, accumulator) in self.grouping.outputs.iter().zip(group.accumulators) {
                    document.insert(output.field.clone(), accumulator.finish());
                }
                document
            })
            .collect()
    }
}

impl Producer for GroupProducer {
    fn advance(&mut self) -> ProducerFuture<'_, Option<Document>> {
        Box::pin(async move {
            if self.output.is_none() {
                while let Some(document) = self.inner.advance().await? {
                    self.absorb(&document);
                }
                self.output = Some(self.finish());
            }
            Ok(self.output.as_mut().and_then(VecDeque::pop_front))
        })
    }
}
