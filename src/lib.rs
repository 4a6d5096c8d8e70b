//! aeroquery - An embedded document-query engine
//!
//! Compiles MongoDB-style queries and aggregation pipelines into execution
//! plans over an indexed storage substrate and evaluates them lazily
//! through a cursor.

pub mod cli;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod errors;
pub mod lang;
pub mod observability;
pub mod planner;
pub mod stages;
pub mod storage;

pub use collection::{Collection, Db};
pub use config::DbConfig;
pub use cursor::Cursor;
pub use errors::{QueryError, QueryResult};
