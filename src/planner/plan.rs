//! Execution plans and explain output
//!
//! A plan is a source plus the residual pipeline that wraps it. Sources:
//! - `Empty`: a contradiction was found; storage is never touched
//! - `Access`: a full scan or a single index range scan
//! - `Union`: one independent sub-plan per disjunction branch, merged with
//!   identity deduplication

use serde_json::{json, Value};

use super::stage::CompiledStage;
use crate::lang::Path;
use crate::storage::{Direction, KeyRange, ScanRequest};

/// Low-level retrieval strategy
#[derive(Debug, Clone, PartialEq)]
pub enum AccessMethod {
    /// Every document in primary-key order
    FullScan,
    /// A key range over one indexed path
    IndexScan {
        path: Path,
        range: KeyRange,
        direction: Direction,
    },
}

impl AccessMethod {
    /// Returns the stable name used in explain output and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMethod::FullScan => "FULL_SCAN",
            AccessMethod::IndexScan { .. } => "INDEX_SCAN",
        }
    }

    /// Translates the access method into a storage scan request.
    ///
    /// `_id` scans use the primary order rather than a named index.
    pub fn scan_request(&self) -> ScanRequest {
        match self {
            AccessMethod::FullScan => ScanRequest::primary(),
            AccessMethod::IndexScan {
                path,
                range,
                direction,
            } => ScanRequest {
                index: (!path.is_id()).then(|| path.literal().to_string()),
                range: range.clone(),
                direction: *direction,
            },
        }
    }

    fn explain(&self) -> Value {
        match self {
            AccessMethod::FullScan => json!({ "source": self.as_str() }),
            AccessMethod::IndexScan {
                path,
                range,
                direction,
            } => json!({
                "source": self.as_str(),
                "index": path.literal(),
                "range": range.describe(),
                "direction": direction.directive(),
            }),
        }
    }
}

/// Where a plan's documents come from
#[derive(Debug, Clone)]
pub enum PlanSource {
    Empty,
    Access(AccessMethod),
    Union(Vec<ExecutionPlan>),
}

/// A planned query: a source and the stages applied around it, innermost first
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub source: PlanSource,
    pub pipeline: Vec<CompiledStage>,
}

impl ExecutionPlan {
    /// A plan that yields nothing
    pub fn empty() -> Self {
        Self {
            source: PlanSource::Empty,
            pipeline: Vec::new(),
        }
    }

    /// Returns true if the plan can never yield a document
    pub fn is_empty(&self) -> bool {
        matches!(self.source, PlanSource::Empty)
    }

    /// The access method, for single-source plans
    pub fn access(&self) -> Option<&AccessMethod> {
        match &self.source {
            PlanSource::Access(method) => Some(method),
            _ => None,
        }
    }

    /// The sub-plans, for disjunction plans
    pub fn branches(&self) -> &[ExecutionPlan] {
        match &self.source {
            PlanSource::Union(branches) => branches,
            _ => &[],
        }
    }

    /// Describes the plan as JSON
    pub fn explain(&self) -> Value {
        let mut out = match &self.source {
            PlanSource::Empty => json!({ "source": "EMPTY" }),
            PlanSource::Access(method) => method.explain(),
            PlanSource::Union(branches) => json!({
                "source": "UNION",
                "branches": branches.iter().map(ExecutionPlan::explain).collect::<Vec<_>>(),
            }),
        };
        let stages: Vec<Value> = self.pipeline.iter().map(CompiledStage::describe).collect();
        if let Some(map) = out.as_object_mut() {
            map.insert("pipeline".to_string(), Value::Array(stages));
        }
        out
    }
}
