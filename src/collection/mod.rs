//! Database and collection handles
//!
//! A [`Db`] is opened from a [`DbConfig`] over a storage substrate and hands
//! out [`Collection`] handles. Collections are cheap to clone and expose:
//! - `find` / `find_one` / `aggregate` / `count`: read-only cursors
//! - `insert`: validated batch insert
//! - `remove` / `update`: read-write cursors that mutate each matched entry
//!   and await that mutation before advancing again

mod update;
mod validator;

pub use update::UpdateSpec;
pub use validator::validate_document;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::DbConfig;
use crate::cursor::Cursor;
use crate::errors::{QueryError, QueryResult};
use crate::lang::{Document, OperatorTable};
use crate::observability::{log_event_with_fields, Event};
use crate::planner::{IndexMetadata, Stage};
use crate::storage::{AccessMode, Storage};

struct CollectionInner {
    name: String,
    indexes: IndexMetadata,
    storage: Arc<dyn Storage>,
    operators: Arc<OperatorTable>,
}

/// Handle to one declared collection
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

impl Collection {
    fn new(
        name: String,
        indexes: IndexMetadata,
        storage: Arc<dyn Storage>,
        operators: Arc<OperatorTable>,
    ) -> Self {
        Self {
            inner: Arc::new(CollectionInner {
                name,
                indexes,
                storage,
                operators,
            }),
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns true if `path` is indexed (`_id` always is)
    pub fn is_indexed(&self, path: &str) -> bool {
        self.inner.indexes.is_indexed(path)
    }

    pub(crate) fn indexes(&self) -> &IndexMetadata {
        &self.inner.indexes
    }

    pub(crate) fn operators(&self) -> &OperatorTable {
        &self.inner.operators
    }

    pub(crate) fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    /// A fresh read-only cursor with an empty pipeline
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.clone(), AccessMode::ReadOnly)
    }

    /// A fresh read-write cursor with an empty pipeline
    pub fn write_cursor(&self) -> Cursor {
        Cursor::new(self.clone(), AccessMode::ReadWrite)
    }

    /// Cursor over documents matching `query`, optionally projected
    pub fn find(&self, query: Value, projection: Option<Value>) -> QueryResult<Cursor> {
        let mut cursor = self.cursor();
        cursor.filter(query)?;
        if let Some(projection) = projection {
            cursor.project(projection)?;
        }
        Ok(cursor)
    }

    /// First document matching `query`, optionally projected
    pub async fn find_one(
        &self,
        query: Value,
        projection: Option<Value>,
    ) -> QueryResult<Option<Document>> {
        let mut cursor = self.find(query, projection)?;
        cursor.limit(1)?;
        cursor.advance().await
    }

    /// Number of documents matching `query`
    pub async fn count(&self, query: Value) -> QueryResult<u64> {
        let mut cursor = self.find(query, None)?;
        let mut count = 0;
        while cursor.advance().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Cursor over an aggregation pipeline such as
    /// `[{"$match": {...}}, {"$group": {...}}]`
    pub fn aggregate(&self, stages: &[Value]) -> QueryResult<Cursor> {
        let mut cursor = self.cursor();
        for stage in stages {
            cursor.stage(Stage::parse(stage)?)?;
        }
        Ok(cursor)
    }

    /// Inserts documents, returning their identities in input order.
    ///
    /// Every document is validated before any is written.
    pub async fn insert(&self, documents: Vec<Document>) -> QueryResult<Vec<Value>> {
        for document in &documents {
            validate_document(document)?;
        }
        let ids = self
            .inner
            .storage
            .insert(&self.inner.name, documents)
            .await?;

        let count = ids.len().to_string();
        log_event_with_fields(
            Event::DocumentsInserted,
            &[("collection", self.name()), ("count", &count)],
        );
        Ok(ids)
    }

    /// Deletes every document matching `query`, returning the count
    pub async fn remove(&self, query: Value) -> QueryResult<u64> {
        let mut cursor = self.write_cursor();
        cursor.filter(query)?;

        let mut removed = 0;
        while cursor.advance().await?.is_some() {
            cursor.delete_current().await?;
            removed += 1;
        }

        let count = removed.to_string();
        log_event_with_fields(
            Event::DocumentsRemoved,
            &[("collection", self.name()), ("count", &count)],
        );
        Ok(removed)
    }

    /// Applies an update spec to every document matching `query`,
    /// returning the count
    pub async fn update(&self, query: Value, spec: &Value) -> QueryResult<u64> {
        let spec = UpdateSpec::compile(spec, self.operators())?;
        let mut cursor = self.write_cursor();
        cursor.filter(query)?;

        let mut updated = 0;
        while let Some(document) = cursor.advance().await? {
            let replacement = spec.apply(document)?;
            cursor.replace_current(replacement).await?;
            updated += 1;
        }

        let count = updated.to_string();
        log_event_with_fields(
            Event::DocumentsUpdated,
            &[("collection", self.name()), ("count", &count)],
        );
        Ok(updated)
    }
}

/// An opened database: its declared collections over one substrate
pub struct Db {
    name: String,
    collections: BTreeMap<String, Collection>,
}

impl Db {
    /// Opens a database with the standard operator table
    pub fn open(config: &DbConfig, storage: Arc<dyn Storage>) -> QueryResult<Self> {
        Self::open_with_operators(config, storage, OperatorTable::standard())
    }

    /// Opens a database with a caller-supplied operator table.
    ///
    /// Declares every configured collection and index on the substrate.
    pub fn open_with_operators(
        config: &DbConfig,
        storage: Arc<dyn Storage>,
        operators: OperatorTable,
    ) -> QueryResult<Self> {
        config.validate()?;
        let operators = Arc::new(operators);

        let mut collections = BTreeMap::new();
        for (name, indexes) in config.resolved() {
            storage.declare(&name, &indexes)?;
            let collection = Collection::new(
                name.clone(),
                IndexMetadata::with_indexes(indexes),
                Arc::clone(&storage),
                Arc::clone(&operators),
            );
            collections.insert(name, collection);
        }

        Ok(Self {
            name: config.name.clone(),
            collections,
        })
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a declared collection
    pub fn collection(&self, name: &str) -> QueryResult<Collection> {
        self.collections
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::UnknownCollection(name.to_string()))
    }

    /// Declared collection names in sorted order
    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }
}


impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}
