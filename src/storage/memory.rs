//! In-memory reference substrate
//!
//! Each collection holds a primary `BTreeMap` keyed by `_id` and one
//! [`IndexTree`] per declared path. A cursor snapshots the matching keys
//! when it is opened and re-checks every entry against the live store as
//! it advances, so entries deleted or moved to another key after opening
//! are skipped.
//!
//! Identities are assigned as increasing integers starting at 1. An
//! explicitly supplied integer `_id` pushes the counter past it.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::errors::{StorageError, StorageResult};
use super::index::{range_bounds, IndexKey, IndexTree};
use super::scan::{AccessMode, Direction, ScanRequest};
use super::{Storage, StorageFuture, StoreCursor};
use crate::lang::value::values_equal;
use crate::lang::{Document, Path, ID_FIELD};

struct IndexState {
    path: Path,
    tree: IndexTree,
}

struct CollectionStore {
    primary: BTreeMap<IndexKey, Document>,
    indexes: BTreeMap<String, IndexState>,
    next_id: i64,
}

// One snapshotted scan position. `key` is the indexed value for index
// scans and `None` for primary scans.
struct Entry {
    key: Option<IndexKey>,
    primary: IndexKey,
}

impl CollectionStore {
    fn new() -> Self {
        Self {
            primary: BTreeMap::new(),
            indexes: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn add_index(&mut self, literal: &str) {
        if literal == ID_FIELD || self.indexes.contains_key(literal) {
            return;
        }
        let path = Path::new(literal);
        let mut tree = IndexTree::new();
        for (primary, document) in &self.primary {
            if let Some(value) = path.resolve(document) {
                tree.insert(IndexKey::from_json(value), primary.clone());
            }
        }
        self.indexes
            .insert(literal.to_string(), IndexState { path, tree });
    }

    fn index_document(&mut self, primary: &IndexKey, document: &Document) {
        for state in self.indexes.values_mut() {
            if let Some(value) = state.path.resolve(document) {
                state.tree.insert(IndexKey::from_json(value), primary.clone());
            }
        }
    }

    fn unindex_document(&mut self, primary: &IndexKey, document: &Document) {
        for state in self.indexes.values_mut() {
            if let Some(value) = state.path.resolve(document) {
                state.tree.remove(&IndexKey::from_json(value), primary);
            }
        }
    }

    fn insert_batch(&mut self, documents: Vec<Document>) -> StorageResult<Vec<Value>> {
        let mut seen = BTreeSet::new();
        let mut next = self.next_id;

        for document in &documents {
            let Some(id) = document.get(ID_FIELD) else {
                continue;
            };
            let key = IndexKey::from_json(id);
            if self.primary.contains_key(&key) || !seen.insert(key) {
                return Err(StorageError::constraint(format!(
                    "duplicate _id {}",
                    id
                )));
            }
            if let Some(n) = id.as_i64() {
                next = next.max(n.saturating_add(1));
            }
        }

        let mut prepared = Vec::with_capacity(documents.len());
        for mut document in documents {
            let id = match document.get(ID_FIELD) {
                Some(id) => id.clone(),
                None => {
                    while self.primary.contains_key(&IndexKey(Value::from(next)))
                        || seen.contains(&IndexKey(Value::from(next)))
                    {
                        next = next.checked_add(1).ok_or_else(|| {
                            StorageError::constraint("identity space exhausted")
                        })?;
                    }
                    let id = Value::from(next);
                    next = next.saturating_add(1);
                    seen.insert(IndexKey(id.clone()));
                    document.insert(ID_FIELD.to_string(), id.clone());
                    id
                }
            };
            prepared.push((id, document));
        }

        let mut ids = Vec::with_capacity(prepared.len());
        for (id, document) in prepared {
            let primary = IndexKey::from_json(&id);
            self.index_document(&primary, &document);
            self.primary.insert(primary, document);
            ids.push(id);
        }
        self.next_id = next;
        Ok(ids)
    }

    fn snapshot(&self, collection: &str, request: &ScanRequest) -> StorageResult<VecDeque<Entry>> {
        let mut entries: Vec<Entry> = match request.index.as_deref() {
            None | Some(ID_FIELD) => {
                if request.range.is_empty() {
                    Vec::new()
                } else {
                    self.primary
                        .range(range_bounds(&request.range))
                        .filter(|(key, _)| request.range.contains(key.value()))
                        .map(|(key, _)| Entry {
                            key: None,
                            primary: key.clone(),
                        })
                        .collect()
                }
            }
            Some(name) => {
                let state = self
                    .indexes
                    .get(name)
                    .ok_or_else(|| StorageError::unknown_index(collection, name))?;
                state
                    .tree
                    .scan(&request.range)
                    .into_iter()
                    .map(|(key, primary)| Entry {
                        key: Some(key),
                        primary,
                    })
                    .collect()
            }
        };

        if request.direction == Direction::Descending {
            entries.reverse();
        }
        Ok(entries.into())
    }
}

struct MemoryCursor {
    store: Arc<RwLock<CollectionStore>>,
    mode: AccessMode,
    index: Option<Path>,
    entries: VecDeque<Entry>,
    current: Option<IndexKey>,
}

impl MemoryCursor {
    fn next_entry(&mut self) -> StorageResult<Option<Document>> {
        let store = self.store.read().map_err(|_| StorageError::poisoned())?;
        while let Some(entry) = self.entries.pop_front() {
            let Some(document) = store.primary.get(&entry.primary) else {
                continue;
            };
            if let (Some(key), Some(path)) = (&entry.key, &self.index) {
                match path.resolve(document) {
                    Some(value) if values_equal(value, key.value()) => {}
                    _ => continue,
                }
            }
            self.current = Some(entry.primary);
            return Ok(Some(document.clone()));
        }
        self.current = None;
        Ok(None)
    }

    fn positioned(&self) -> StorageResult<IndexKey> {
        if self.mode != AccessMode::ReadWrite {
            return Err(StorageError::constraint("cursor is read-only"));
        }
        self.current.clone().ok_or_else(StorageError::not_positioned)
    }

    fn delete_current(&mut self) -> StorageResult<()> {
        let primary = self.positioned()?;
        let mut store = self.store.write().map_err(|_| StorageError::poisoned())?;
        if let Some(document) = store.primary.remove(&primary) {
            store.unindex_document(&primary, &document);
        }
        self.current = None;
        Ok(())
    }

    fn replace_current(&mut self, document: Document) -> StorageResult<()> {
        let primary = self.positioned()?;
        match document.get(ID_FIELD) {
            Some(id) if IndexKey::from_json(id) == primary => {}
            _ => {
                return Err(StorageError::constraint(
                    "replacement document must keep its _id",
                ))
            }
        }

        let mut store = self.store.write().map_err(|_| StorageError::poisoned())?;
        let old = store
            .primary
            .remove(&primary)
            .ok_or_else(StorageError::not_positioned)?;
        store.unindex_document(&primary, &old);
        store.index_document(&primary, &document);
        store.primary.insert(primary, document);
        Ok(())
    }
}

impl StoreCursor for MemoryCursor {
    fn advance(&mut self) -> StorageFuture<'_, Option<Document>> {
        Box::pin(async move { self.next_entry() })
    }

    fn delete(&mut self) -> StorageFuture<'_, ()> {
        Box::pin(async move { self.delete_current() })
    }

    fn replace(&mut self, document: Document) -> StorageFuture<'_, ()> {
        Box::pin(async move { self.replace_current(document) })
    }
}

/// In-memory storage substrate
#[derive(Default)]
pub struct MemoryStorage {
    collections: RwLock<HashMap<String, Arc<RwLock<CollectionStore>>>>,
}

impl MemoryStorage {
    /// Creates an empty substrate
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> StorageResult<Arc<RwLock<CollectionStore>>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| StorageError::poisoned())?;
        collections
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::unknown_collection(name))
    }

    /// Number of documents stored in a collection
    pub fn document_count(&self, collection: &str) -> StorageResult<usize> {
        let store = self.collection(collection)?;
        let store = store.read().map_err(|_| StorageError::poisoned())?;
        Ok(store.primary.len())
    }
}

impl Storage for MemoryStorage {
    fn declare(&self, collection: &str, indexes: &[String]) -> StorageResult<()> {
        let store = {
            let mut collections = self
                .collections
                .write()
                .map_err(|_| StorageError::poisoned())?;
            collections
                .entry(collection.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(CollectionStore::new())))
                .clone()
        };

        let mut store = store.write().map_err(|_| StorageError::poisoned())?;
        for index in indexes {
            store.add_index(index);
        }
        Ok(())
    }

    fn open_cursor<'a>(
        &'a self,
        collection: &'a str,
        mode: AccessMode,
        request: ScanRequest,
    ) -> StorageFuture<'a, Box<dyn StoreCursor>> {
        Box::pin(async move {
            let store = self.collection(collection)?;
            let entries = {
                let guard = store.read().map_err(|_| StorageError::poisoned())?;
                guard.snapshot(collection, &request)?
            };
            let index = request
                .index
                .filter(|name| name != ID_FIELD)
                .map(Path::new);

            let cursor: Box<dyn StoreCursor> = Box::new(MemoryCursor {
                store,
                mode,
                index,
                entries,
                current: None,
            });
            Ok(cursor)
        })
    }

    fn insert<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> StorageFuture<'a, Vec<Value>> {
        Box::pin(async move {
            let store = self.collection(collection)?;
            let mut store = store.write().map_err(|_| StorageError::poisoned())?;
            store.insert_batch(documents)
        })
    }
}
