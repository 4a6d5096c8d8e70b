//! Observability events for aeroquery
//!
//! Events are explicit and typed. Each maps to one stable string that
//! appears as the `event` key of a log line.

use std::fmt;

use super::Severity;

/// Observable events in aeroquery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Database configuration loaded and validated
    ConfigLoaded,

    // Planning
    /// Cursor opened and its plan compiled
    CursorOpened,
    /// Predicate can never match; storage is not touched
    PlanContradiction,
    /// Plan scans the whole collection
    PlanFullScan,
    /// Plan drives an index range scan
    PlanIndexScan,
    /// Plan merges disjunction branches
    PlanUnion,

    // Iteration
    /// Cursor reached the end of its stream
    CursorExhausted,
    /// Storage reported a failure during iteration
    StorageFailure,

    // Writes
    /// Documents inserted
    DocumentsInserted,
    /// Documents removed
    DocumentsRemoved,
    /// Documents updated
    DocumentsUpdated,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::CursorOpened => "CURSOR_OPENED",
            Event::PlanContradiction => "PLAN_CONTRADICTION",
            Event::PlanFullScan => "PLAN_FULL_SCAN",
            Event::PlanIndexScan => "PLAN_INDEX_SCAN",
            Event::PlanUnion => "PLAN_UNION",

            Event::CursorExhausted => "CURSOR_EXHAUSTED",
            Event::StorageFailure => "STORAGE_FAILURE",

            Event::DocumentsInserted => "DOCUMENTS_INSERTED",
            Event::DocumentsRemoved => "DOCUMENTS_REMOVED",
            Event::DocumentsUpdated => "DOCUMENTS_UPDATED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::StorageFailure => Severity::Error,
            Event::PlanFullScan | Event::PlanIndexScan | Event::PlanUnion | Event::CursorExhausted => {
                Severity::Trace
            }
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
