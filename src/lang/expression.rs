//! Expression compiler
//!
//! Expression grammar:
//! - `"$a.b"`: field reference
//! - `{ "$op": arg }` or `{ "$op": [args...] }`: operator application
//! - `{ "$literal": v }`: `v` taken verbatim
//! - objects without `$` keys and arrays: built element-wise
//! - anything else: literal
//!
//! An expression without field references is folded to a constant at
//! compile time. Otherwise evaluation is gated on every referenced path
//! being present in the document.

use serde_json::{Map, Value};

use super::fields::Fields;
use super::operators::{ExpressionOperator, OperatorTable};
use super::Path;
use crate::errors::{QueryError, QueryResult};

/// Expression tree
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    Field(Path),
    Apply {
        name: String,
        operator: ExpressionOperator,
        args: Vec<Expression>,
    },
    Object(Vec<(String, Expression)>),
    Array(Vec<Expression>),
}

impl Expression {
    fn eval(&self, fields: &Fields<'_>) -> Value {
        match self {
            Expression::Literal(v) => v.clone(),
            Expression::Field(path) => fields.get(path).value().cloned().unwrap_or(Value::Null),
            Expression::Apply { operator, args, .. } => {
                let values: Vec<Value> = args.iter().map(|a| a.eval(fields)).collect();
                (operator.apply)(&values)
            }
            Expression::Object(entries) => {
                let mut map = Map::new();
                for (key, expr) in entries {
                    map.insert(key.clone(), expr.eval(fields));
                }
                Value::Object(map)
            }
            Expression::Array(items) => Value::Array(items.iter().map(|e| e.eval(fields)).collect()),
        }
    }

    fn collect_paths(&self, out: &mut Vec<Path>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Field(path) => {
                if !out.contains(path) {
                    out.push(path.clone());
                }
            }
            Expression::Apply { args, .. } => args.iter().for_each(|a| a.collect_paths(out)),
            Expression::Object(entries) => entries.iter().for_each(|(_, e)| e.collect_paths(out)),
            Expression::Array(items) => items.iter().for_each(|e| e.collect_paths(out)),
        }
    }
}

/// A compiled expression with its field dependencies
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    tree: Expression,
    paths: Vec<Path>,
    constant: Option<Value>,
}

impl CompiledExpression {
    /// Compiles an expression specification
    pub fn compile(spec: &Value, operators: &OperatorTable) -> QueryResult<Self> {
        let tree = compile_node(spec, operators)?;
        let mut paths = Vec::new();
        tree.collect_paths(&mut paths);

        let constant = if paths.is_empty() {
            let empty = Map::new();
            Some(tree.eval(&Fields::new(&empty)))
        } else {
            None
        };

        Ok(Self {
            tree,
            paths,
            constant,
        })
    }

    /// The expression tree
    pub fn tree(&self) -> &Expression {
        &self.tree
    }

    /// Paths this expression reads
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// Returns true if the expression references any field
    pub fn has_refs(&self) -> bool {
        self.constant.is_none()
    }

    /// Evaluates against a document.
    ///
    /// Returns `None` when a referenced path is absent.
    pub fn evaluate(&self, fields: &Fields<'_>) -> Option<Value> {
        if let Some(constant) = &self.constant {
            return Some(constant.clone());
        }
        if !fields.ensure(&self.paths) {
            return None;
        }
        Some(self.tree.eval(fields))
    }
}

fn compile_node(spec: &Value, operators: &OperatorTable) -> QueryResult<Expression> {
    match spec {
        Value::String(s) if s.starts_with('$') => field_reference(s).map(Expression::Field),
        Value::Object(map) => compile_object(map, operators),
        Value::Array(items) => items
            .iter()
            .map(|item| compile_node(item, operators))
            .collect::<QueryResult<Vec<_>>>()
            .map(Expression::Array),
        literal => Ok(Expression::Literal(literal.clone())),
    }
}

fn field_reference(s: &str) -> QueryResult<Path> {
    let path = Path::new(&s[1..]);
    let bad = path
        .pieces()
        .iter()
        .any(|piece| piece.is_empty() || piece.starts_with('$'));
    if bad {
        return Err(QueryError::expression(format!(
            "invalid field reference '{}'",
            s
        )));
    }
    Ok(path)
}

fn compile_object(map: &Map<String, Value>, operators: &OperatorTable) -> QueryResult<Expression> {
    let operator_keys = map.keys().filter(|k| k.starts_with('$')).count();

    if operator_keys == 0 {
        let mut entries = Vec::with_capacity(map.len());
        for (key, value) in map {
            entries.push((key.clone(), compile_node(value, operators)?));
        }
        return Ok(Expression::Object(entries));
    }

    let (name, arg) = match map.iter().next() {
        Some(entry) if map.len() == 1 => entry,
        _ => {
            return Err(QueryError::expression(
                "an operator expression must have exactly one key",
            ))
        }
    };

    if name == "$literal" {
        return Ok(Expression::Literal(arg.clone()));
    }

    let operator = operators
        .expression(name)
        .ok_or_else(|| QueryError::expression(format!("unknown expression operator '{}'", name)))?;

    let args = match arg {
        Value::Array(items) => items
            .iter()
            .map(|item| compile_node(item, operators))
            .collect::<QueryResult<Vec<_>>>()?,
        single => vec![compile_node(single, operators)?],
    };

    if !operator.arity.accepts(args.len()) {
        return Err(QueryError::expression(format!(
            "'{}' expects {} argument(s), got {}",
            name,
            operator.arity,
            args.len()
        )));
    }

    Ok(Expression::Apply {
        name: name.clone(),
        operator,
        args,
    })
}
