//! Query document compiler
//!
//! A query document compiles to one of:
//! - `Compiled::Contradiction`: no document can match
//! - `Compiled::Tautology`: every document matches
//! - `Compiled::Tree`: an arena-backed predicate tree
//!
//! The tree is stored as a flat arena of nodes addressed by `NodeId`.
//! Conjunctions own ordered child id lists, so the planner can excise a
//! clause satisfied by an index scan without touching the rest of the tree.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::{json, Map, Value};

use super::fields::{Field, Fields};
use super::value::{compare_values, comparable, values_equal};
use super::Path;
use crate::errors::{QueryError, QueryResult};

/// Index of a node in a predicate arena
pub type NodeId = usize;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Nin,
}

impl ComparisonOp {
    /// Parses an operator name such as `$lte`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "$eq" => Some(ComparisonOp::Eq),
            "$ne" => Some(ComparisonOp::Ne),
            "$lt" => Some(ComparisonOp::Lt),
            "$lte" => Some(ComparisonOp::Lte),
            "$gt" => Some(ComparisonOp::Gt),
            "$gte" => Some(ComparisonOp::Gte),
            "$in" => Some(ComparisonOp::In),
            "$nin" => Some(ComparisonOp::Nin),
            _ => None,
        }
    }

    /// Returns the operator name
    pub fn name(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "$eq",
            ComparisonOp::Ne => "$ne",
            ComparisonOp::Lt => "$lt",
            ComparisonOp::Lte => "$lte",
            ComparisonOp::Gt => "$gt",
            ComparisonOp::Gte => "$gte",
            ComparisonOp::In => "$in",
            ComparisonOp::Nin => "$nin",
        }
    }

    /// Returns true for operators that map onto a contiguous key range
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            ComparisonOp::Eq
                | ComparisonOp::Lt
                | ComparisonOp::Lte
                | ComparisonOp::Gt
                | ComparisonOp::Gte
        )
    }
}

/// A predicate leaf evaluated against a single field
#[derive(Debug, Clone)]
pub enum Leaf {
    /// Comparison against a literal operand
    Comparison {
        path: Path,
        op: ComparisonOp,
        operand: Value,
    },
    /// Presence test
    Exists { path: Path, present: bool },
    /// String pattern match
    Pattern { path: Path, regex: Regex },
}

impl Leaf {
    /// The path this leaf tests
    pub fn path(&self) -> &Path {
        match self {
            Leaf::Comparison { path, .. } => path,
            Leaf::Exists { path, .. } => path,
            Leaf::Pattern { path, .. } => path,
        }
    }

    /// Evaluates the leaf against a resolved field
    pub fn matches(&self, field: Field<'_>) -> bool {
        match self {
            Leaf::Comparison { op, operand, .. } => compare_field(*op, field, operand),
            Leaf::Exists { present, .. } => field.is_present() == *present,
            Leaf::Pattern { regex, .. } => match field {
                Field::Present(Value::String(s)) => regex.is_match(s),
                _ => false,
            },
        }
    }

    fn describe(&self) -> Value {
        let condition = match self {
            Leaf::Comparison { op, operand, .. } => json!({ op.name(): operand }),
            Leaf::Exists { present, .. } => json!({ "$exists": present }),
            Leaf::Pattern { regex, .. } => json!({ "$regex": regex.as_str() }),
        };
        let mut map = Map::new();
        map.insert(self.path().literal().to_string(), condition);
        Value::Object(map)
    }
}

fn compare_field(op: ComparisonOp, field: Field<'_>, operand: &Value) -> bool {
    let in_operand = |v: &Value| {
        operand
            .as_array()
            .map(|items| items.iter().any(|item| values_equal(v, item)))
            .unwrap_or(false)
    };

    match (op, field) {
        (ComparisonOp::Eq, Field::Present(v)) => values_equal(v, operand),
        (ComparisonOp::Ne, Field::Present(v)) => !values_equal(v, operand),
        (ComparisonOp::Ne, Field::Absent) => true,
        (ComparisonOp::In, Field::Present(v)) => in_operand(v),
        (ComparisonOp::Nin, Field::Present(v)) => !in_operand(v),
        (ComparisonOp::Nin, Field::Absent) => true,
        (_, Field::Absent) => false,
        (range, Field::Present(v)) => {
            if !comparable(v, operand) {
                return false;
            }
            let ord = compare_values(v, operand);
            match range {
                ComparisonOp::Lt => ord == Ordering::Less,
                ComparisonOp::Lte => ord != Ordering::Greater,
                ComparisonOp::Gt => ord == Ordering::Greater,
                ComparisonOp::Gte => ord != Ordering::Less,
                _ => false,
            }
        }
    }
}

/// A node in the predicate arena
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(Leaf),
    Conjunction(Vec<NodeId>),
    Disjunction(Vec<NodeId>),
}

/// An inspectable clause: a leaf reachable through conjunctions only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clause {
    /// The leaf node
    pub node: NodeId,
    /// The owning conjunction, or `None` if the leaf is the root
    pub parent: Option<NodeId>,
    /// Position inside the owning conjunction
    pub index: usize,
}

/// Result of compiling a query document
#[derive(Debug, Clone)]
pub enum Compiled {
    /// No document can match
    Contradiction,
    /// Every document matches
    Tautology,
    /// A non-degenerate predicate
    Tree(Predicate),
}

/// A compiled predicate tree
#[derive(Debug, Clone)]
pub struct Predicate {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Predicate {
    /// Compiles a query document. `null` is treated as the empty query.
    pub fn compile(query: &Value) -> QueryResult<Compiled> {
        let draft = match query {
            Value::Null => return Ok(Compiled::Tautology),
            Value::Object(map) => compile_document(map)?,
            other => {
                return Err(QueryError::predicate(format!(
                    "query must be a document, got {}",
                    other
                )))
            }
        };
        Ok(finish(draft.simplify()))
    }

    /// Combines predicates by conjunction, re-running contradiction detection
    pub fn conjoin(predicates: Vec<Predicate>) -> Compiled {
        let children = predicates.iter().map(|p| p.draft(p.root)).collect();
        finish(Draft::And(children).simplify())
    }

    /// The root node id
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns a node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns the leaf at `id`, if that node is a leaf
    pub fn leaf(&self, id: NodeId) -> Option<&Leaf> {
        match self.nodes.get(id) {
            Some(Node::Leaf(leaf)) => Some(leaf),
            _ => None,
        }
    }

    /// Returns true if the root is a disjunction
    pub fn is_disjunction(&self) -> bool {
        matches!(self.nodes.get(self.root), Some(Node::Disjunction(_)))
    }

    /// Returns true once every clause has been excised
    pub fn is_trivial(&self) -> bool {
        matches!(self.nodes.get(self.root), Some(Node::Conjunction(c)) if c.is_empty())
    }

    /// Lists leaves reachable from the root through conjunctions only
    pub fn clauses(&self) -> Vec<Clause> {
        let mut out = Vec::new();
        match self.nodes.get(self.root) {
            Some(Node::Leaf(_)) => out.push(Clause {
                node: self.root,
                parent: None,
                index: 0,
            }),
            Some(Node::Conjunction(_)) => self.collect_clauses(self.root, &mut out),
            _ => {}
        }
        out
    }

    fn collect_clauses(&self, conjunction: NodeId, out: &mut Vec<Clause>) {
        let Some(Node::Conjunction(children)) = self.nodes.get(conjunction) else {
            return;
        };
        for (index, &child) in children.iter().enumerate() {
            match self.nodes.get(child) {
                Some(Node::Leaf(_)) => out.push(Clause {
                    node: child,
                    parent: Some(conjunction),
                    index,
                }),
                Some(Node::Conjunction(_)) => self.collect_clauses(child, out),
                _ => {}
            }
        }
    }

    /// Excises a clause from its owning conjunction.
    ///
    /// Returns false if the clause no longer sits at its recorded position.
    pub fn remove_clause(&mut self, clause: &Clause) -> bool {
        match clause.parent {
            None if clause.node == self.root => {
                self.nodes.push(Node::Conjunction(Vec::new()));
                self.root = self.nodes.len() - 1;
                true
            }
            None => false,
            Some(parent) => match self.nodes.get_mut(parent) {
                Some(Node::Conjunction(children))
                    if children.get(clause.index) == Some(&clause.node) =>
                {
                    children.remove(clause.index);
                    true
                }
                _ => false,
            },
        }
    }

    /// Splits a root disjunction into one independent predicate per branch
    pub fn branches(&self) -> Vec<Predicate> {
        match self.nodes.get(self.root) {
            Some(Node::Disjunction(children)) => {
                children.iter().map(|&child| self.subtree(child)).collect()
            }
            _ => vec![self.clone()],
        }
    }

    fn subtree(&self, id: NodeId) -> Predicate {
        let mut nodes = Vec::new();
        let root = build(&mut nodes, self.draft(id));
        Predicate { nodes, root }
    }

    /// Evaluates the predicate against one document
    pub fn run(&self, fields: &Fields<'_>) -> bool {
        self.eval(self.root, fields)
    }

    fn eval(&self, id: NodeId, fields: &Fields<'_>) -> bool {
        match self.nodes.get(id) {
            Some(Node::Leaf(leaf)) => leaf.matches(fields.get(leaf.path())),
            Some(Node::Conjunction(children)) => children.iter().all(|&c| self.eval(c, fields)),
            Some(Node::Disjunction(children)) => children.iter().any(|&c| self.eval(c, fields)),
            None => false,
        }
    }

    /// Describes the predicate as a query document
    pub fn describe(&self) -> Value {
        self.describe_node(self.root)
    }

    fn describe_node(&self, id: NodeId) -> Value {
        match self.nodes.get(id) {
            Some(Node::Leaf(leaf)) => leaf.describe(),
            Some(Node::Conjunction(children)) => {
                let items: Vec<Value> = children.iter().map(|&c| self.describe_node(c)).collect();
                json!({ "$and": items })
            }
            Some(Node::Disjunction(children)) => {
                let items: Vec<Value> = children.iter().map(|&c| self.describe_node(c)).collect();
                json!({ "$or": items })
            }
            None => Value::Null,
        }
    }

    fn draft(&self, id: NodeId) -> Draft {
        match self.nodes.get(id) {
            Some(Node::Leaf(leaf)) => Draft::Leaf(leaf.clone()),
            Some(Node::Conjunction(children)) => {
                Draft::And(children.iter().map(|&c| self.draft(c)).collect())
            }
            Some(Node::Disjunction(children)) => {
                Draft::Or(children.iter().map(|&c| self.draft(c)).collect())
            }
            None => Draft::True,
        }
    }
}

// Owned intermediate tree, simplified before it is flattened into an arena.
#[derive(Debug, Clone)]
enum Draft {
    True,
    False,
    Leaf(Leaf),
    And(Vec<Draft>),
    Or(Vec<Draft>),
}

impl Draft {
    fn simplify(self) -> Draft {
        match self {
            Draft::And(children) => {
                let mut leaves = Vec::new();
                let mut others = Vec::new();
                let mut pending: Vec<Draft> = children;
                pending.reverse();
                while let Some(child) = pending.pop() {
                    match child.simplify() {
                        Draft::True => {}
                        Draft::False => return Draft::False,
                        Draft::And(nested) => pending.extend(nested.into_iter().rev()),
                        Draft::Leaf(leaf) => leaves.push(leaf),
                        other => others.push(other),
                    }
                }
                if contradicts(&leaves) {
                    return Draft::False;
                }
                let mut all: Vec<Draft> = leaves.into_iter().map(Draft::Leaf).collect();
                all.extend(others);
                match all.len() {
                    0 => Draft::True,
                    1 => all.pop().unwrap_or(Draft::True),
                    _ => Draft::And(all),
                }
            }
            Draft::Or(children) => {
                let mut kept = Vec::new();
                for child in children {
                    match child.simplify() {
                        Draft::True => return Draft::True,
                        Draft::False => {}
                        Draft::Or(nested) => kept.extend(nested),
                        other => kept.push(other),
                    }
                }
                match kept.len() {
                    0 => Draft::False,
                    1 => kept.pop().unwrap_or(Draft::False),
                    _ => Draft::Or(kept),
                }
            }
            other => other,
        }
    }
}

// An equality literal that fails a sibling clause on the same path means
// no document can satisfy the conjunction.
fn contradicts(leaves: &[Leaf]) -> bool {
    leaves.iter().enumerate().any(|(i, leaf)| {
        let Leaf::Comparison {
            path,
            op: ComparisonOp::Eq,
            operand,
        } = leaf
        else {
            return false;
        };
        leaves
            .iter()
            .enumerate()
            .filter(|(j, other)| *j != i && other.path() == path)
            .any(|(_, other)| !other.matches(Field::Present(operand)))
    })
}

fn finish(draft: Draft) -> Compiled {
    match draft {
        Draft::True => Compiled::Tautology,
        Draft::False => Compiled::Contradiction,
        tree => {
            let mut nodes = Vec::new();
            let root = build(&mut nodes, tree);
            Compiled::Tree(Predicate { nodes, root })
        }
    }
}

fn build(nodes: &mut Vec<Node>, draft: Draft) -> NodeId {
    let node = match draft {
        Draft::Leaf(leaf) => Node::Leaf(leaf),
        Draft::And(children) => {
            Node::Conjunction(children.into_iter().map(|c| build(nodes, c)).collect())
        }
        Draft::Or(children) => {
            Node::Disjunction(children.into_iter().map(|c| build(nodes, c)).collect())
        }
        // Degenerate drafts only survive inside trees built from conjoined
        // predicates; an empty conjunction is always true, an empty
        // disjunction always false.
        Draft::True => Node::Conjunction(Vec::new()),
        Draft::False => Node::Disjunction(Vec::new()),
    };
    nodes.push(node);
    nodes.len() - 1
}

fn compile_document(map: &Map<String, Value>) -> QueryResult<Draft> {
    let mut children = Vec::with_capacity(map.len());
    for (key, value) in map {
        match key.as_str() {
            "$or" => children.push(Draft::Or(compile_branches(key, value)?)),
            "$and" => children.push(Draft::And(compile_branches(key, value)?)),
            op if op.starts_with('$') => {
                return Err(QueryError::predicate(format!(
                    "unknown top-level operator '{}'",
                    op
                )))
            }
            _ => children.push(compile_field(parse_path(key)?, value)?),
        }
    }
    Ok(Draft::And(children))
}

fn compile_branches(op: &str, value: &Value) -> QueryResult<Vec<Draft>> {
    let items = match value {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(QueryError::predicate(format!(
                "'{}' requires a non-empty array of query documents",
                op
            )))
        }
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => compile_document(map),
            other => Err(QueryError::predicate(format!(
                "'{}' branch must be a document, got {}",
                op, other
            ))),
        })
        .collect()
}

fn parse_path(key: &str) -> QueryResult<Path> {
    let path = Path::new(key);
    if path.pieces().iter().any(String::is_empty) {
        return Err(QueryError::predicate(format!(
            "invalid field path '{}'",
            key
        )));
    }
    Ok(path)
}

fn compile_field(path: Path, value: &Value) -> QueryResult<Draft> {
    let operators = match value {
        Value::Object(map) if is_operator_document(map)? => map,
        literal => {
            return Ok(Draft::Leaf(Leaf::Comparison {
                path,
                op: ComparisonOp::Eq,
                operand: literal.clone(),
            }))
        }
    };

    let mut children = Vec::with_capacity(operators.len());
    for (name, operand) in operators {
        children.push(Draft::Leaf(compile_operator(&path, name, operand)?));
    }
    Ok(Draft::And(children))
}

fn is_operator_document(map: &Map<String, Value>) -> QueryResult<bool> {
    let operators = map.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        return Ok(false);
    }
    if operators != map.len() {
        return Err(QueryError::predicate(
            "cannot mix operators and literal fields in one condition",
        ));
    }
    Ok(true)
}

fn compile_operator(path: &Path, name: &str, operand: &Value) -> QueryResult<Leaf> {
    if let Some(op) = ComparisonOp::from_name(name) {
        if matches!(op, ComparisonOp::In | ComparisonOp::Nin) && !operand.is_array() {
            return Err(QueryError::predicate(format!(
                "'{}' on '{}' requires an array",
                name, path
            )));
        }
        return Ok(Leaf::Comparison {
            path: path.clone(),
            op,
            operand: operand.clone(),
        });
    }

    match name {
        "$exists" => match operand {
            Value::Bool(present) => Ok(Leaf::Exists {
                path: path.clone(),
                present: *present,
            }),
            other => Err(QueryError::predicate(format!(
                "'$exists' on '{}' requires a boolean, got {}",
                path, other
            ))),
        },
        "$regex" => {
            let pattern = operand.as_str().ok_or_else(|| {
                QueryError::predicate(format!("'$regex' on '{}' requires a string", path))
            })?;
            let regex = Regex::new(pattern).map_err(|e| {
                QueryError::predicate(format!("invalid '$regex' on '{}': {}", path, e))
            })?;
            Ok(Leaf::Pattern {
                path: path.clone(),
                regex,
            })
        }
        other => Err(QueryError::predicate(format!(
            "unknown query operator '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Document;

    fn tree(query: Value) -> Predicate {
        match Predicate::compile(&query) {
            Ok(Compiled::Tree(p)) => p,
            other => panic!("expected tree for {}, got {:?}", query, other),
        }
    }

    fn run(p: &Predicate, doc: Value) -> bool {
        let doc: Document = doc.as_object().cloned().unwrap_or_default();
        p.run(&Fields::new(&doc))
    }

    #[test]
    fn test_empty_query_is_tautology() {
        assert!(matches!(
            Predicate::compile(&json!({})),
            Ok(Compiled::Tautology)
        ));
        assert!(matches!(
            Predicate::compile(&Value::Null),
            Ok(Compiled::Tautology)
        ));
    }

    #[test]
    fn test_literal_equality_and_ranges() {
        let p = tree(json!({"x": 4, "y": {"$gte": 2, "$lt": 5}}));
        assert!(run(&p, json!({"x": 4, "y": 2})));
        assert!(!run(&p, json!({"x": 4, "y": 5})));
        assert!(!run(&p, json!({"x": 4, "y": "3"})));
        assert!(!run(&p, json!({"y": 3})));
        assert_eq!(p.clauses().len(), 3);
    }

    #[test]
    fn test_absent_semantics() {
        let p = tree(json!({"a": {"$exists": false}}));
        assert!(run(&p, json!({"b": 1})));
        assert!(!run(&p, json!({"a": null})));

        let p = tree(json!({"a": {"$ne": 1}}));
        assert!(run(&p, json!({})));

        let p = tree(json!({"a": null}));
        assert!(run(&p, json!({"a": null})));
        assert!(!run(&p, json!({})));
    }

    #[test]
    fn test_in_and_regex() {
        let p = tree(json!({"tag": {"$in": ["a", "b"]}, "name": {"$regex": "^ca"}}));
        assert!(run(&p, json!({"tag": "b", "name": "cat"})));
        assert!(!run(&p, json!({"tag": "c", "name": "cat"})));
        assert!(!run(&p, json!({"tag": "a", "name": "dog"})));
    }

    #[test]
    fn test_unknown_operator_is_error() {
        let err = Predicate::compile(&json!({"x": {"$near": 1}})).unwrap_err();
        assert_eq!(err.code(), "QUERY_PREDICATE_INVALID");

        let err = Predicate::compile(&json!({"$where": "1"})).unwrap_err();
        assert!(err.is_compile_error());

        assert!(Predicate::compile(&json!({"x": {"$gt": 1, "y": 2}})).is_err());
        assert!(Predicate::compile(&json!({"$or": []})).is_err());
    }

    #[test]
    fn test_contradiction_detection() {
        assert!(matches!(
            Predicate::compile(&json!({"$and": [{"x": 1}, {"x": 2}]})),
            Ok(Compiled::Contradiction)
        ));
        assert!(matches!(
            Predicate::compile(&json!({"x": {"$eq": 3, "$gt": 5}})),
            Ok(Compiled::Contradiction)
        ));
        assert!(matches!(
            Predicate::compile(&json!({"x": {"$eq": 3, "$lt": 5}})),
            Ok(Compiled::Tree(_))
        ));
    }

    #[test]
    fn test_conjoin_detects_contradiction() {
        let a = tree(json!({"x": 4}));
        let b = tree(json!({"x": 5}));
        assert!(matches!(
            Predicate::conjoin(vec![a.clone(), b]),
            Compiled::Contradiction
        ));

        let c = tree(json!({"k": 2}));
        match Predicate::conjoin(vec![a, c]) {
            Compiled::Tree(p) => assert_eq!(p.clauses().len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_disjunction_pruning() {
        // The contradictory branch is dropped and the survivor unwrapped.
        let p = tree(json!({"$or": [{"$and": [{"x": 1}, {"x": 2}]}, {"y": 1}]}));
        assert!(!p.is_disjunction());
        assert_eq!(p.clauses().len(), 1);

        assert!(matches!(
            Predicate::compile(&json!({"$or": [{"y": 1}, {}]})),
            Ok(Compiled::Tautology)
        ));

        let p = tree(json!({"$or": [{"x": 1}, {"y": {"$gt": 2}}]}));
        assert!(p.is_disjunction());
        assert!(p.clauses().is_empty());
        assert_eq!(p.branches().len(), 2);
        assert!(run(&p, json!({"y": 3})));
        assert!(!run(&p, json!({"x": 2})));
    }

    #[test]
    fn test_remove_clause() {
        let mut p = tree(json!({"x": {"$gt": 1}, "k": 2}));
        let clauses = p.clauses();
        assert_eq!(clauses.len(), 2);
        assert!(p.remove_clause(&clauses[0]));
        assert!(!p.is_trivial());
        let rest = p.clauses();
        assert!(p.remove_clause(&rest[0]));
        assert!(p.is_trivial());

        let mut single = tree(json!({"x": 1}));
        let clause = single.clauses()[0];
        assert_eq!(clause.parent, None);
        assert!(single.remove_clause(&clause));
        assert!(single.is_trivial());
    }

    #[test]
    fn test_describe() {
        let p = tree(json!({"x": {"$lt": 3}}));
        assert_eq!(p.describe(), json!({"x": {"$lt": 3}}));
    }
}
