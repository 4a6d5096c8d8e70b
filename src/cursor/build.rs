//! Plan to producer chain
//!
//! The access method is the innermost producer; residual stages wrap it in
//! declared order, so the last stage is the one the cursor advances.

use std::sync::Arc;

use super::access::StorageProducer;
use super::producer::{EmptyProducer, Producer};
use super::union::UnionProducer;
use crate::planner::{ExecutionPlan, PlanSource};
use crate::stages;
use crate::storage::{AccessMode, Storage};

/// Builds the producer chain for a plan
pub fn build(
    plan: ExecutionPlan,
    storage: &Arc<dyn Storage>,
    collection: &str,
    mode: AccessMode,
) -> Box<dyn Producer> {
    let source: Box<dyn Producer> = match plan.source {
        PlanSource::Empty => Box::new(EmptyProducer),
        PlanSource::Access(method) => Box::new(StorageProducer::new(
            Arc::clone(storage),
            collection,
            mode,
            method.scan_request(),
        )),
        PlanSource::Union(branches) => Box::new(UnionProducer::new(
            branches
                .into_iter()
                .map(|branch| build(branch, storage, collection, mode))
                .collect(),
        )),
    };

    plan.pipeline
        .into_iter()
        .fold(source, |inner, stage| stages::wrap(stage, inner))
}
