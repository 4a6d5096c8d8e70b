//! Pluggable operator tables
//!
//! Expression operators are pure functions over evaluated arguments.
//! A type mismatch yields `null` rather than an error, so a projection
//! never aborts half-way through a stream.
//!
//! Accumulators fold one value per document into a group result.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Number, Value};

use super::value::{as_number, compare_values, number_value};

/// Signature of an expression operator
pub type ExpressionFn = fn(&[Value]) -> Value;

/// Number of arguments an operator accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    /// Returns true if `count` arguments are acceptable
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// A registered expression operator
#[derive(Debug, Clone, Copy)]
pub struct ExpressionOperator {
    pub arity: Arity,
    pub apply: ExpressionFn,
}

/// Folds values into a single group result
pub trait Accumulator: Send {
    /// Adds one document's value; `None` when the input field is absent
    fn accumulate(&mut self, value: Option<&Value>);

    /// Produces the final value
    fn finish(self: Box<Self>) -> Value;
}

/// Creates a fresh accumulator for each group
pub type AccumulatorFactory = fn() -> Box<dyn Accumulator>;

/// Registry of expression operators and accumulators
#[derive(Clone, Default)]
pub struct OperatorTable {
    expressions: HashMap<String, ExpressionOperator>,
    accumulators: HashMap<String, AccumulatorFactory>,
}

impl OperatorTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The default operator set
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register_expression("$add", Arity::AtLeast(1), add);
        table.register_expression("$subtract", Arity::Exact(2), subtract);
        table.register_expression("$multiply", Arity::AtLeast(1), multiply);
        table.register_expression("$divide", Arity::Exact(2), divide);
        table.register_expression("$concat", Arity::AtLeast(1), concat);
        table.register_expression("$toLower", Arity::Exact(1), to_lower);
        table.register_expression("$toUpper", Arity::Exact(1), to_upper);
        table.register_expression("$size", Arity::Exact(1), size);

        table.register_accumulator("$sum", || Box::new(Sum(Total::Int(0))));
        table.register_accumulator("$avg", || {
            Box::new(Avg {
                total: Total::Int(0),
                count: 0,
            })
        });
        table.register_accumulator("$min", || Box::new(Extreme::min()));
        table.register_accumulator("$max", || Box::new(Extreme::max()));
        table.register_accumulator("$push", || Box::new(Push(Vec::new())));
        table.register_accumulator("$first", || Box::new(First(None)));
        table.register_accumulator("$last", || Box::new(Last(Value::Null)));
        table
    }

    /// Registers or replaces an expression operator
    pub fn register_expression(&mut self, name: &str, arity: Arity, apply: ExpressionFn) {
        self.expressions
            .insert(name.to_string(), ExpressionOperator { arity, apply });
    }

    /// Registers or replaces an accumulator
    pub fn register_accumulator(&mut self, name: &str, factory: AccumulatorFactory) {
        self.accumulators.insert(name.to_string(), factory);
    }

    /// Looks up an expression operator
    pub fn expression(&self, name: &str) -> Option<ExpressionOperator> {
        self.expressions.get(name).copied()
    }

    /// Looks up an accumulator factory
    pub fn accumulator(&self, name: &str) -> Option<AccumulatorFactory> {
        self.accumulators.get(name).copied()
    }
}

impl fmt::Debug for OperatorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut expressions: Vec<&String> = self.expressions.keys().collect();
        let mut accumulators: Vec<&String> = self.accumulators.keys().collect();
        expressions.sort();
        accumulators.sort();
        f.debug_struct("OperatorTable")
            .field("expressions", &expressions)
            .field("accumulators", &accumulators)
            .finish()
    }
}

fn numbers(args: &[Value]) -> Option<Vec<f64>> {
    args.iter().map(as_number).collect()
}

fn add(args: &[Value]) -> Value {
    numbers(args)
        .map(|n| number_value(n.iter().sum()))
        .unwrap_or(Value::Null)
}

fn subtract(args: &[Value]) -> Value {
    match numbers(args).as_deref() {
        Some([a, b]) => number_value(a - b),
        _ => Value::Null,
    }
}

fn multiply(args: &[Value]) -> Value {
    numbers(args)
        .map(|n| number_value(n.iter().product()))
        .unwrap_or(Value::Null)
}

fn divide(args: &[Value]) -> Value {
    match numbers(args).as_deref() {
        Some([_, b]) if *b == 0.0 => Value::Null,
        Some([a, b]) => number_value(a / b),
        _ => Value::Null,
    }
}

fn concat(args: &[Value]) -> Value {
    let mut out = String::new();
    for arg in args {
        match arg.as_str() {
            Some(s) => out.push_str(s),
            None => return Value::Null,
        }
    }
    Value::String(out)
}

fn to_lower(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => Value::String(s.to_lowercase()),
        _ => Value::Null,
    }
}

fn to_upper(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => Value::String(s.to_uppercase()),
        _ => Value::Null,
    }
}

fn size(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Array(items)) => Value::from(items.len()),
        _ => Value::Null,
    }
}

/// Running numeric total, exact while every input is an integer and the
/// sum fits in i64
#[derive(Debug, Clone, Copy)]
enum Total {
    Int(i64),
    Float(f64),
}

impl Total {
    fn add(self, n: &Number) -> Self {
        match (self, n.as_i64()) {
            (Total::Int(acc), Some(i)) => match acc.checked_add(i) {
                Some(sum) => Total::Int(sum),
                None => Total::Float(acc as f64 + i as f64),
            },
            (total, _) => Total::Float(total.as_f64() + n.as_f64().unwrap_or(0.0)),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Total::Int(i) => i as f64,
            Total::Float(f) => f,
        }
    }
}

struct Sum(Total);

impl Accumulator for Sum {
    fn accumulate(&mut self, value: Option<&Value>) {
        if let Some(Value::Number(n)) = value {
            self.0 = self.0.add(n);
        }
    }

    fn finish(self: Box<Self>) -> Value {
        match self.0 {
            Total::Int(i) => Value::from(i),
            Total::Float(f) => number_value(f),
        }
    }
}

struct Avg {
    total: Total,
    count: i64,
}

impl Accumulator for Avg {
    fn accumulate(&mut self, value: Option<&Value>) {
        if let Some(Value::Number(n)) = value {
            self.total = self.total.add(n);
            self.count += 1;
        }
    }

    fn finish(self: Box<Self>) -> Value {
        if self.count == 0 {
            return Value::Null;
        }
        match self.total {
            Total::Int(i) if i % self.count == 0 => Value::from(i / self.count),
            total => number_value(total.as_f64() / self.count as f64),
        }
    }
}

struct Extreme {
    best: Option<Value>,
    want: std::cmp::Ordering,
}

impl Extreme {
    fn min() -> Self {
        Self {
            best: None,
            want: std::cmp::Ordering::Less,
        }
    }

    fn max() -> Self {
        Self {
            best: None,
            want: std::cmp::Ordering::Greater,
        }
    }
}

impl Accumulator for Extreme {
    fn accumulate(&mut self, value: Option<&Value>) {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return;
        };
        let replace = match &self.best {
            None => true,
            Some(best) => compare_values(value, best) == self.want,
        };
        if replace {
            self.best = Some(value.clone());
        }
    }

    fn finish(self: Box<Self>) -> Value {
        self.best.unwrap_or(Value::Null)
    }
}

struct Push(Vec<Value>);

impl Accumulator for Push {
    fn accumulate(&mut self, value: Option<&Value>) {
        if let Some(value) = value {
            self.0.push(value.clone());
        }
    }

    fn finish(self: Box<Self>) -> Value {
        Value::Array(self.0)
    }
}

struct First(Option<Value>);

impl Accumulator for First {
    fn accumulate(&mut self, value: Option<&Value>) {
        if self.0.is_none() {
            self.0 = Some(value.cloned().unwrap_or(Value::Null));
        }
    }

    fn finish(self: Box<Self>) -> Value {
        self.0.unwrap_or(Value::Null)
    }
}

struct Last(Value);

impl Accumulator for Last {
    fn accumulate(&mut self, value: Option<&Value>) {
        self.0 = value.cloned().unwrap_or(Value::Null);
    }

    fn finish(self: Box<Self>) -> Value {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(table: &OperatorTable, name: &str, args: Vec<Value>) -> Value {
        let op = table.expression(name).unwrap();
        assert!(op.arity.accepts(args.len()));
        (op.apply)(&args)
    }

    fn fold(table: &OperatorTable, name: &str, values: &[Option<Value>]) -> Value {
        let mut acc = (table.accumulator(name).unwrap())();
        for value in values {
            acc.accumulate(value.as_ref());
        }
        acc.finish()
    }

    #[test]
    fn test_arithmetic() {
        let t = OperatorTable::standard();
        assert_eq!(apply(&t, "$add", vec![json!(1), json!(2.5)]), json!(3.5));
        assert_eq!(apply(&t, "$subtract", vec![json!(5), json!(2)]), json!(3));
        assert_eq!(apply(&t, "$multiply", vec![json!(2), json!(3)]), json!(6));
        assert_eq!(apply(&t, "$divide", vec![json!(1), json!(0)]), Value::Null);
        assert_eq!(apply(&t, "$add", vec![json!(1), json!("x")]), Value::Null);
    }

    #[test]
    fn test_string_and_array_ops() {
        let t = OperatorTable::standard();
        assert_eq!(apply(&t, "$concat", vec![json!("a"), json!("b")]), json!("ab"));
        assert_eq!(apply(&t, "$toUpper", vec![json!("ab")]), json!("AB"));
        assert_eq!(apply(&t, "$toLower", vec![json!("AB")]), json!("ab"));
        assert_eq!(apply(&t, "$size", vec![json!([1, 2, 3])]), json!(3));
    }

    #[test]
    fn test_accumulators() {
        let t = OperatorTable::standard();
        let values = [Some(json!(3)), None, Some(json!(1)), Some(json!(2))];
        assert_eq!(fold(&t, "$sum", &values), json!(6));
        assert_eq!(fold(&t, "$avg", &values), json!(2));
        assert_eq!(fold(&t, "$min", &values), json!(1));
        assert_eq!(fold(&t, "$max", &values), json!(3));
        assert_eq!(fold(&t, "$push", &values), json!([3, 1, 2]));
        assert_eq!(fold(&t, "$first", &values), json!(3));
        assert_eq!(fold(&t, "$last", &values), json!(2));
        assert_eq!(fold(&t, "$avg", &[]), Value::Null);
    }

    #[test]
    fn test_integer_sums_stay_exact() {
        let t = OperatorTable::standard();
        let big = [Some(json!(9_007_199_254_740_993i64)), Some(json!(2))];
        assert_eq!(fold(&t, "$sum", &big), json!(9_007_199_254_740_995i64));
        assert_eq!(
            fold(&t, "$avg", &[Some(json!(9_007_199_254_740_993i64)), Some(json!(9_007_199_254_740_995i64))]),
            json!(9_007_199_254_740_994i64)
        );

        // A fraction or an overflow switches to floating point.
        let mixed = [Some(json!(1)), Some(json!(0.5)), Some(json!(2))];
        assert_eq!(fold(&t, "$sum", &mixed), json!(3.5));
        assert_eq!(fold(&t, "$avg", &[Some(json!(1)), Some(json!(2))]), json!(1.5));

        let overflow = [Some(json!(i64::MAX)), Some(json!(i64::MAX))];
        assert_eq!(fold(&t, "$sum", &overflow).as_f64(), Some(2.0 * i64::MAX as f64));
    }

    #[test]
    fn test_register_custom_operator() {
        let mut t = OperatorTable::new();
        assert!(t.expression("$add").is_none());
        t.register_expression("$neg", Arity::Exact(1), |args| match args[0].as_f64() {
            Some(n) => number_value(-n),
            None => Value::Null,
        });
        assert_eq!(apply(&t, "$neg", vec![json!(4)]), json!(-4));
    }
}
