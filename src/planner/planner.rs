//! Execution planner
//!
//! Runs once per cursor, synchronously and without I/O:
//! 1. Compile every stage. A contradictory filter anywhere yields the
//!    empty plan.
//! 2. Strip the leading run of filter and sort stages, conjoining the
//!    predicates and merging the sort specs.
//! 3. A top-level disjunction plans each branch independently and moves
//!    the merged sort after the branch merge.
//! 4. Otherwise pick the first eligible indexed clause, narrowed by the
//!    hint or else by the sort, as the driving clause of an index scan, and
//!    reinsert whatever it does not satisfy as residual stages.
//!
//! Index choice is first-eligible, not cost-based.

use std::collections::{HashSet, VecDeque};

use serde_json::Value;

use super::plan::{AccessMethod, ExecutionPlan, PlanSource};
use super::stage::{Compilation, CompiledStage, Stage};
use crate::errors::QueryResult;
use crate::lang::{Clause, ComparisonOp, Compiled, Leaf, OperatorTable, Path, Predicate, ID_FIELD};
use crate::stages::SortSpec;
use crate::storage::{Direction, KeyRange};

/// Index metadata provided to the planner
#[derive(Debug, Clone, Default)]
pub struct IndexMetadata {
    /// Indexed path literals (excluding _id which is always indexed)
    indexed_paths: HashSet<String>,
}

impl IndexMetadata {
    /// Creates empty index metadata (only _id is indexed)
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates index metadata with the given indexed paths
    pub fn with_indexes(paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            indexed_paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Checks if a path is indexed
    pub fn is_indexed(&self, path: &str) -> bool {
        path == ID_FIELD || self.indexed_paths.contains(path)
    }

    /// Declared paths in sorted order, `_id` excluded
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.indexed_paths.iter().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

// A clause able to drive an index scan.
#[derive(Debug)]
struct Candidate {
    path: Path,
    range: KeyRange,
    // The clause the scan satisfies on its own, if any. Exists clauses and
    // hint placeholders only choose the index.
    satisfies: Option<Clause>,
}

impl Candidate {
    fn placeholder(path: Path) -> Self {
        Self {
            path,
            range: KeyRange::all(),
            satisfies: None,
        }
    }
}

fn key_range(op: ComparisonOp, operand: &Value) -> Option<KeyRange> {
    let operand = operand.clone();
    match op {
        ComparisonOp::Eq => Some(KeyRange::only(operand)),
        ComparisonOp::Lt => Some(KeyRange::below(operand, false)),
        ComparisonOp::Lte => Some(KeyRange::below(operand, true)),
        ComparisonOp::Gt => Some(KeyRange::above(operand, false)),
        ComparisonOp::Gte => Some(KeyRange::above(operand, true)),
        _ => None,
    }
}

/// Query planner that produces deterministic plans
pub struct QueryPlanner<'a> {
    indexes: &'a IndexMetadata,
    operators: &'a OperatorTable,
}

impl<'a> QueryPlanner<'a> {
    /// Creates a new planner
    pub fn new(indexes: &'a IndexMetadata, operators: &'a OperatorTable) -> Self {
        Self { indexes, operators }
    }

    /// Plans a pipeline.
    ///
    /// Any compile error is returned before a plan exists, so a request that
    /// cannot compile never reaches storage.
    pub fn plan(&self, stages: &[Stage], hint: Option<&Path>) -> QueryResult<ExecutionPlan> {
        let mut compiled = VecDeque::with_capacity(stages.len());
        let mut contradiction = false;
        for stage in stages {
            match stage.compile(self.operators)? {
                Compilation::Stage(stage) => compiled.push_back(stage),
                Compilation::Pass => {}
                Compilation::Contradiction => contradiction = true,
            }
        }
        if contradiction {
            return Ok(ExecutionPlan::empty());
        }

        let mut predicates = Vec::new();
        let mut sort: Option<SortSpec> = None;
        while matches!(
            compiled.front(),
            Some(CompiledStage::Filter(_) | CompiledStage::Sort(_))
        ) {
            match compiled.pop_front() {
                Some(CompiledStage::Filter(predicate)) => predicates.push(predicate),
                Some(CompiledStage::Sort(spec)) => match sort.as_mut() {
                    Some(merged) => merged.merge(spec),
                    None => sort = Some(spec),
                },
                _ => {}
            }
        }

        let predicate = match predicates.len() {
            0 => None,
            _ => match Predicate::conjoin(predicates) {
                Compiled::Contradiction => return Ok(ExecutionPlan::empty()),
                Compiled::Tautology => None,
                Compiled::Tree(predicate) => Some(predicate),
            },
        };

        match predicate {
            Some(predicate) if predicate.is_disjunction() => {
                let branches = predicate
                    .branches()
                    .into_iter()
                    .map(|branch| self.plan_access(Some(branch), None, hint, VecDeque::new()))
                    .collect();
                if let Some(sort) = sort {
                    compiled.push_front(CompiledStage::Sort(sort));
                }
                Ok(ExecutionPlan {
                    source: PlanSource::Union(branches),
                    pipeline: compiled.into(),
                })
            }
            predicate => Ok(self.plan_access(predicate, sort, hint, compiled)),
        }
    }

    fn plan_access(
        &self,
        predicate: Option<Predicate>,
        sort: Option<SortSpec>,
        hint: Option<&Path>,
        mut pipeline: VecDeque<CompiledStage>,
    ) -> ExecutionPlan {
        let mut candidates = predicate
            .as_ref()
            .map(|p| self.candidates(p))
            .unwrap_or_default();

        if let Some(hint) = hint {
            candidates.retain(|c| &c.path == hint);
            if candidates.is_empty() {
                candidates.push(Candidate::placeholder(hint.clone()));
            }
        }

        let mut direction = Direction::Ascending;
        if let Some(sort) = sort {
            // A hinted index drives the scan even when it cannot serve the sort.
            if hint.is_none() {
                candidates.retain(|c| sort.direction_of(&c.path).is_some());
            }
            match candidates.first() {
                Some(driver) => {
                    direction = sort
                        .direction_of(&driver.path)
                        .unwrap_or(Direction::Ascending);
                    if !sort.is_served_by(&driver.path) {
                        pipeline.push_front(CompiledStage::Sort(sort));
                    }
                }
                None => pipeline.push_front(CompiledStage::Sort(sort)),
            }
        }

        let Some(driver) = candidates.into_iter().next() else {
            if let Some(predicate) = predicate {
                pipeline.push_front(CompiledStage::Filter(predicate));
            }
            return ExecutionPlan {
                source: PlanSource::Access(AccessMethod::FullScan),
                pipeline: pipeline.into(),
            };
        };

        let residual = match (predicate, driver.satisfies) {
            (Some(mut predicate), Some(clause)) => {
                predicate.remove_clause(&clause);
                (!predicate.is_trivial()).then_some(predicate)
            }
            (predicate, _) => predicate,
        };
        if let Some(residual) = residual {
            pipeline.push_front(CompiledStage::Filter(residual));
        }

        ExecutionPlan {
            source: PlanSource::Access(AccessMethod::IndexScan {
                path: driver.path,
                range: driver.range,
                direction,
            }),
            pipeline: pipeline.into(),
        }
    }

    // Range-narrowing clauses on indexed paths, or failing those, presence
    // tests on indexed paths.
    fn candidates(&self, predicate: &Predicate) -> Vec<Candidate> {
        let clauses = predicate.clauses();

        let ranged: Vec<Candidate> = clauses
            .iter()
            .filter_map(|clause| match predicate.leaf(clause.node)? {
                Leaf::Comparison { path, op, operand } if self.indexes.is_indexed(path.literal()) => {
                    Some(Candidate {
                        path: path.clone(),
                        range: key_range(*op, operand)?,
                        satisfies: Some(*clause),
                    })
                }
                _ => None,
            })
            .collect();
        if !ranged.is_empty() {
            return ranged;
        }

        clauses
            .iter()
            .filter_map(|clause| match predicate.leaf(clause.node)? {
                Leaf::Exists {
                    path,
                    present: true,
                } if self.indexes.is_indexed(path.literal()) => {
                    Some(Candidate::placeholder(path.clone()))
                }
                _ => None,
            })
            .collect()
    }
}
