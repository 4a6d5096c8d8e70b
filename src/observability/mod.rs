//! Observability subsystem for aeroquery
//!
//! This module provides:
//! - Structured logging (JSON lines on stderr)
//! - Typed planning, iteration and write events
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use aeroquery::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::PlanIndexScan, &[("path", "age")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
