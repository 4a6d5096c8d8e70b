//! Pipeline stage implementations
//!
//! Each stage is a [`Producer`] decorator owning exactly one inner
//! producer. Filter, skip and limit pass documents through unchanged and
//! forward mutate-at-cursor calls; the others reshape or reorder their
//! input and refuse them.

mod filter;
mod group;
mod limit;
mod project;
mod skip;
mod sort;
mod unwind;

pub use filter::FilterProducer;
pub use group::{GroupProducer, Grouping};
pub use limit::LimitProducer;
pub use project::{ProjectProducer, Projection};
pub use skip::SkipProducer;
pub use sort::{SortProducer, SortSpec};
pub use unwind::{parse_unwind_path, UnwindProducer};

use crate::cursor::Producer;
use crate::planner::CompiledStage;

/// Wraps `inner` in the producer for one compiled stage
pub fn wrap(stage: CompiledStage, inner: Box<dyn Producer>) -> Box<dyn Producer> {
    match stage {
        CompiledStage::Filter(predicate) => Box::new(FilterProducer::new(inner, predicate)),
        CompiledStage::Project(projection) => Box::new(ProjectProducer::new(inner, projection)),
        CompiledStage::Group(grouping) => Box::new(GroupProducer::new(inner, grouping)),
        CompiledStage::Unwind(path) => Box::new(UnwindProducer::new(inner, path)),
        CompiledStage::Sort(spec) => Box::new(SortProducer::new(inner, spec)),
        CompiledStage::Skip(count) => Box::new(SkipProducer::new(inner, count)),
        CompiledStage::Limit(count) => Box::new(LimitProducer::new(inner, count)),
    }
}
