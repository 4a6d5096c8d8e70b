//! Pipeline stage vocabulary
//!
//! `Stage` is the raw, append-only form recorded by cursor builder calls
//! and by aggregation stage documents. `CompiledStage` is what the planner
//! hands to the runtime once every argument has been compiled.

use serde_json::{json, Value};

use crate::errors::{QueryError, QueryResult};
use crate::lang::{Compiled, OperatorTable, Path, Predicate};
use crate::stages::{parse_unwind_path, Grouping, Projection, SortSpec};

/// A pipeline stage as requested by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Filter(Value),
    Project(Value),
    Group(Value),
    Unwind(String),
    Sort(Value),
    Skip(u64),
    Limit(u64),
}

impl Stage {
    /// Parses an aggregation stage document such as `{ "$match": {...} }`
    pub fn parse(document: &Value) -> QueryResult<Self> {
        let (name, argument) = match document.as_object() {
            Some(map) if map.len() == 1 => map.iter().next().ok_or_else(|| {
                QueryError::pipeline("stage document must have exactly one key")
            })?,
            _ => {
                return Err(QueryError::pipeline(format!(
                    "stage must be a single-key document, got {}",
                    document
                )))
            }
        };

        match name.as_str() {
            "$match" => Ok(Stage::Filter(argument.clone())),
            "$project" => Ok(Stage::Project(argument.clone())),
            "$group" => Ok(Stage::Group(argument.clone())),
            "$sort" => Ok(Stage::Sort(argument.clone())),
            "$unwind" => match argument {
                Value::String(path) => Ok(Stage::Unwind(path.clone())),
                other => Err(QueryError::pipeline(format!(
                    "$unwind takes a path string, got {}",
                    other
                ))),
            },
            "$skip" => count(name, argument).map(Stage::Skip),
            "$limit" => count(name, argument).map(Stage::Limit),
            other => Err(QueryError::pipeline(format!("unknown stage '{}'", other))),
        }
    }

    /// The aggregation name of this stage kind
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Filter(_) => "$match",
            Stage::Project(_) => "$project",
            Stage::Group(_) => "$group",
            Stage::Unwind(_) => "$unwind",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
        }
    }

    /// Compiles the stage argument
    pub(crate) fn compile(&self, operators: &OperatorTable) -> QueryResult<Compilation> {
        let stage = match self {
            Stage::Filter(query) => match Predicate::compile(query)? {
                Compiled::Contradiction => return Ok(Compilation::Contradiction),
                Compiled::Tautology => return Ok(Compilation::Pass),
                Compiled::Tree(predicate) => CompiledStage::Filter(predicate),
            },
            Stage::Project(spec) => CompiledStage::Project(Projection::compile(spec, operators)?),
            Stage::Group(spec) => CompiledStage::Group(Grouping::compile(spec, operators)?),
            Stage::Unwind(path) => CompiledStage::Unwind(parse_unwind_path(path)?),
            Stage::Sort(spec) => CompiledStage::Sort(SortSpec::compile(spec)?),
            Stage::Skip(n) => CompiledStage::Skip(*n),
            Stage::Limit(n) => CompiledStage::Limit(*n),
        };
        Ok(Compilation::Stage(stage))
    }
}

fn count(name: &str, argument: &Value) -> QueryResult<u64> {
    argument.as_u64().ok_or_else(|| {
        QueryError::pipeline(format!(
            "{} takes a non-negative integer, got {}",
            name, argument
        ))
    })
}

/// Outcome of compiling one stage
#[derive(Debug)]
pub(crate) enum Compilation {
    Stage(CompiledStage),
    /// A filter every document passes
    Pass,
    /// A filter no document passes
    Contradiction,
}

/// A stage with its argument compiled
#[derive(Debug, Clone)]
pub enum CompiledStage {
    Filter(Predicate),
    Project(Projection),
    Group(Grouping),
    Unwind(Path),
    Sort(SortSpec),
    Skip(u64),
    Limit(u64),
}

impl CompiledStage {
    /// Describes the stage as an aggregation stage document
    pub fn describe(&self) -> Value {
        match self {
            CompiledStage::Filter(predicate) => json!({ "$match": predicate.describe() }),
            CompiledStage::Project(projection) => json!({ "$project": projection.spec() }),
            CompiledStage::Group(grouping) => json!({ "$group": grouping.spec() }),
            CompiledStage::Unwind(path) => json!({ "$unwind": format!("${}", path) }),
            CompiledStage::Sort(spec) => json!({ "$sort": spec.describe() }),
            CompiledStage::Skip(n) => json!({ "$skip": n }),
            CompiledStage::Limit(n) => json!({ "$limit": n }),
        }
    }
}
