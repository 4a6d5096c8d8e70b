//! Query language for aeroquery
//!
//! This module provides:
//! - `Path`: parsed dotted field references
//! - `Fields`: per-document memoized resolution with an absent marker
//! - `Predicate`: query document compiler and evaluator
//! - `CompiledExpression`: projection/update expression compiler
//! - `OperatorTable`: pluggable expression operators and accumulators
//! - value ordering, equality and structural hashing
//!
//! Everything here is synchronous and free of I/O.

mod expression;
mod fields;
mod operators;
mod path;
mod predicate;
pub mod value;

pub use expression::{CompiledExpression, Expression};
pub use fields::{Field, Fields};
pub use operators::{Accumulator, AccumulatorFactory, Arity, ExpressionFn, ExpressionOperator, OperatorTable};
pub use path::Path;
pub use predicate::{Clause, ComparisonOp, Compiled, Leaf, Node, NodeId, Predicate};
pub use value::{compare_values, structural_hash, values_equal, ValueHash};

/// A stored document: an ordered field map
pub type Document = serde_json::Map<String, serde_json::Value>;

/// The identity field present on every stored document
pub const ID_FIELD: &str = "_id";
