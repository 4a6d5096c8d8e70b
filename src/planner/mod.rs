//! Query planner subsystem for aeroquery
//!
//! Turns an append-only stage list into an [`ExecutionPlan`]: an access
//! method (full scan or one index range scan) or a union of per-branch
//! plans, plus the residual stages that still have to run in memory.
//!
//! # Design Principles
//!
//! - Deterministic: same stages, indexes and hint give the same plan
//! - Compile first: every argument is compiled before storage is touched
//! - Transparent: index use never changes which documents are returned

mod plan;
mod planner;
mod stage;

pub use plan::{AccessMethod, ExecutionPlan, PlanSource};
pub use planner::{IndexMetadata, QueryPlanner};
pub use stage::{CompiledStage, Stage};
