//! Cursor pipeline runtime
//!
//! - `Producer`: the single-flight iteration protocol every stage implements
//! - `StorageProducer`: the innermost producer over one storage scan
//! - `UnionProducer`: branch-sequential merge for disjunctions
//! - `Cursor`: the append-only builder that plans once and then drives the
//!   built chain

mod access;
mod build;
mod cursor;
mod producer;
mod union;

pub use access::StorageProducer;
pub use build::build;
pub use cursor::Cursor;
pub use producer::{EmptyProducer, Producer, ProducerFuture};
pub use union::UnionProducer;

#[cfg(test)]
pub(crate) use producer::testing;
