//! Storage substrate contract for aeroquery
//!
//! The query engine never touches documents directly. It asks a
//! [`Storage`] for a [`StoreCursor`] over one collection, scoped to an
//! optional index, a key range and a direction, and then:
//! - advances it to the next entry or exhaustion
//! - deletes or replaces the entry currently under it (read-write only)
//!
//! Every operation suspends and reports failure through [`StorageError`].
//!
//! # Guarantees expected from a substrate
//!
//! - Entries arrive in key order for the requested direction
//! - Entries sharing an index key arrive in primary-key order
//! - `_id` is assigned on insert when absent and never changes
//! - A cursor does not yield entries deleted after it was opened
//!
//! [`MemoryStorage`] is the reference substrate used by the CLI and tests.

mod errors;
mod index;
mod memory;
mod scan;

pub use errors::{StorageError, StorageErrorCode, StorageResult};
pub use index::{IndexKey, IndexTree};
pub use memory::MemoryStorage;
pub use scan::{AccessMode, Direction, KeyBound, KeyRange, ScanRequest};

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::lang::Document;

/// Future returned by substrate operations
pub type StorageFuture<'a, T> = BoxFuture<'a, StorageResult<T>>;

/// A positioned cursor over one collection
pub trait StoreCursor: Send {
    /// Moves to the next entry and returns its document, or `None` at the end
    fn advance(&mut self) -> StorageFuture<'_, Option<Document>>;

    /// Deletes the entry under the cursor
    fn delete(&mut self) -> StorageFuture<'_, ()>;

    /// Replaces the entry under the cursor. The identity must not change.
    fn replace(&mut self, document: Document) -> StorageFuture<'_, ()>;
}

/// An indexed document store
pub trait Storage: Send + Sync {
    /// Declares a collection and its indexed paths. Idempotent.
    fn declare(&self, collection: &str, indexes: &[String]) -> StorageResult<()>;

    /// Opens a cursor for a scan
    fn open_cursor<'a>(
        &'a self,
        collection: &'a str,
        mode: AccessMode,
        request: ScanRequest,
    ) -> StorageFuture<'a, Box<dyn StoreCursor>>;

    /// Inserts documents atomically, returning their identities in input order
    fn insert<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> StorageFuture<'a, Vec<Value>>;
}
