//! Planner transparency tests
//!
//! Access method selection must never change a result set:
//! - indexed and unindexed collections answer alike
//! - a hint changes the plan, not the answer
//! - disjunction branches never emit a document twice
//!
//! Compile errors and contradictions must never reach storage.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use aeroquery::lang::Document;
use aeroquery::storage::{
    AccessMode, MemoryStorage, ScanRequest, Storage, StorageError, StorageFuture,
    StorageResult, StoreCursor,
};
use aeroquery::{Collection, Db, DbConfig};
use serde_json::{json, Value};

fn docs(values: Vec<Value>) -> Vec<Document> {
    values
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}

fn ids(documents: &[Document]) -> Vec<Value> {
    documents.iter().map(|d| d["_id"].clone()).collect()
}

/// Memory substrate that counts cursor opens and can be told to fail them
struct CountingStorage {
    inner: MemoryStorage,
    opens: AtomicUsize,
    fail: AtomicBool,
}

impl CountingStorage {
    fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            opens: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Storage for CountingStorage {
    fn declare(&self, collection: &str, indexes: &[String]) -> StorageResult<()> {
        self.inner.declare(collection, indexes)
    }

    fn open_cursor<'a>(
        &'a self,
        collection: &'a str,
        mode: AccessMode,
        request: ScanRequest,
    ) -> StorageFuture<'a, Box<dyn StoreCursor>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            let failure: StorageResult<Box<dyn StoreCursor>> =
                Err(StorageError::io("disk unavailable"));
            return Box::pin(async move { failure });
        }
        self.inner.open_cursor(collection, mode, request)
    }

    fn insert<'a>(
        &'a self,
        collection: &'a str,
        documents: Vec<Document>,
    ) -> StorageFuture<'a, Vec<Value>> {
        self.inner.insert(collection, documents)
    }
}

fn dataset() -> Vec<Value> {
    vec![
        json!({"a": 3, "b": "x", "c": 1}),
        json!({"a": 1, "b": "y"}),
        json!({"a": 3, "b": "y", "c": 2}),
        json!({"a": 7, "c": 1}),
        json!({"a": "3", "b": "x"}),
        json!({"a": 0, "b": "x", "c": 3}),
        json!({"a": 5, "b": "z"}),
        json!({"a": 3, "c": 3}),
    ]
}

async fn pair() -> (Collection, Collection) {
    let config = DbConfig::from_json_str(
        r#"{"collections": {"indexed": ["a", "b", "c"], "plain": true}}"#,
    )
    .unwrap();
    let db = Db::open(&config, Arc::new(MemoryStorage::new())).unwrap();
    let indexed = db.collection("indexed").unwrap();
    let plain = db.collection("plain").unwrap();
    indexed.insert(docs(dataset())).await.unwrap();
    plain.insert(docs(dataset())).await.unwrap();
    (indexed, plain)
}

// =============================================================================
// INDEX TRANSPARENCY
// =============================================================================

/// Sorted queries must agree element for element
#[tokio::test]
async fn test_sorted_results_ignore_indexes() {
    let (indexed, plain) = pair().await;

    let queries = [
        (json!({"a": {"$gte": 3}}), json!({"a": 1})),
        (json!({"a": {"$gte": 3}}), json!({"a": -1})),
        (json!({"a": 3}), json!({"c": -1})),
        (json!({"b": "x", "a": {"$lt": 5}}), json!({"a": 1})),
        (json!({"c": {"$exists": true}}), json!({"c": 1, "a": -1})),
        (json!({"$or": [{"a": 3}, {"b": "x"}]}), json!({"a": 1})),
        (json!({}), json!({"b": -1})),
    ];

    for (query, sort) in queries {
        let mut results = Vec::new();
        for collection in [&indexed, &plain] {
            let mut cursor = collection.find(query.clone(), None).unwrap();
            cursor.sort(sort.clone()).unwrap();
            results.push(ids(&cursor.drain_all().await.unwrap()));
        }
        assert_eq!(results[0], results[1], "query {} sort {}", query, sort);
        assert!(!results[0].is_empty(), "query {} matched nothing", query);
    }
}

/// Unsorted queries must agree as sets
#[tokio::test]
async fn test_unsorted_results_ignore_indexes() {
    let (indexed, plain) = pair().await;

    let queries = [
        json!({"a": {"$gt": 1, "$lte": 5}}),
        json!({"a": {"$in": [3, 7]}, "c": {"$ne": 2}}),
        json!({"b": {"$exists": true}}),
        json!({"$or": [{"a": {"$lt": 3}}, {"c": 3}, {"b": "z"}]}),
        json!({"a": {"$gt": "2"}}),
    ];

    for query in queries {
        let mut results = Vec::new();
        for collection in [&indexed, &plain] {
            let mut found = ids(&collection
                .find(query.clone(), None)
                .unwrap()
                .drain_all()
                .await
                .unwrap());
            found.sort_by_key(|id| id.as_i64());
            results.push(found);
        }
        assert_eq!(results[0], results[1], "query {}", query);
    }
}

/// A hint over a path every document carries changes only the plan
#[tokio::test]
async fn test_hint_does_not_change_results() {
    let (indexed, _) = pair().await;

    let mut unhinted = indexed.find(json!({"c": {"$gte": 2}}), None).unwrap();
    unhinted.sort(json!({"c": 1})).unwrap();

    let mut hinted = indexed.find(json!({"c": {"$gte": 2}}), None).unwrap();
    hinted.sort(json!({"c": 1})).unwrap().hint("a").unwrap();

    let plan = hinted.explain().unwrap();
    assert_eq!(plan["plan"]["index"], json!("a"));
    assert_eq!(unhinted.explain().unwrap()["plan"]["index"], json!("c"));

    assert_eq!(
        ids(&hinted.drain_all().await.unwrap()),
        ids(&unhinted.drain_all().await.unwrap())
    );
}

// =============================================================================
// DISJUNCTIONS
// =============================================================================

#[tokio::test]
async fn test_disjunction_emits_each_document_once() {
    let config = DbConfig::from_json_str(r#"{"collections": {"c": ["a"]}}"#).unwrap();
    let db = Db::open(&config, Arc::new(MemoryStorage::new())).unwrap();
    let c = db.collection("c").unwrap();
    c.insert(docs(vec![
        json!({"a": 1, "b": "x"}),
        json!({"a": 5, "b": "x"}),
        json!({"a": 2, "b": "y"}),
        json!({"a": 7, "b": "z"}),
        json!({"a": 0}),
    ]))
    .await
    .unwrap();

    let query = json!({"$or": [{"a": {"$lt": 3}}, {"b": "x"}]});
    let mut cursor = c.find(query.clone(), None).unwrap();
    assert_eq!(cursor.explain().unwrap()["plan"]["source"], json!("UNION"));

    let mut found = ids(&cursor.drain_all().await.unwrap());
    found.sort_by_key(|id| id.as_i64());
    assert_eq!(found, vec![json!(1), json!(2), json!(3), json!(5)]);

    let mut sorted = c.find(query, None).unwrap();
    sorted.sort(json!({"a": 1})).unwrap();
    assert_eq!(
        ids(&sorted.drain_all().await.unwrap()),
        vec![json!(5), json!(1), json!(3), json!(2)]
    );
}

// =============================================================================
// STORAGE ISOLATION
// =============================================================================

async fn counting() -> (Arc<CountingStorage>, Collection) {
    let storage = Arc::new(CountingStorage::new());
    let config = DbConfig::from_json_str(r#"{"collections": {"c": ["a"]}}"#).unwrap();
    let db = Db::open(&config, storage.clone()).unwrap();
    let c = db.collection("c").unwrap();
    c.insert(docs(vec![json!({"a": 1}), json!({"a": 2})]))
        .await
        .unwrap();
    (storage, c)
}

#[tokio::test]
async fn test_compile_errors_never_open_storage() {
    let (storage, c) = counting().await;

    let mut cursor = c.find(json!({"a": {"$near": 1}}), None).unwrap();
    assert!(cursor.advance().await.unwrap_err().is_compile_error());

    let mut cursor = c.aggregate(&[json!({"$project": {"x": {"$nope": 1}}})]).unwrap();
    assert_eq!(
        cursor.advance().await.unwrap_err().code(),
        "QUERY_EXPRESSION_INVALID"
    );

    assert!(c.aggregate(&[json!({"$out": "elsewhere"})]).is_err());
    assert_eq!(storage.opens(), 0);
}

#[tokio::test]
async fn test_contradiction_never_opens_storage() {
    let (storage, c) = counting().await;

    let mut cursor = c
        .aggregate(&[
            json!({"$skip": 1}),
            json!({"$match": {"a": 1, "$and": [{"a": 2}]}}),
        ])
        .unwrap();
    assert_eq!(cursor.explain().unwrap()["plan"]["source"], json!("EMPTY"));
    assert!(cursor.drain_all().await.unwrap().is_empty());
    assert_eq!(storage.opens(), 0);

    assert_eq!(c.count(json!({"a": 1})).await.unwrap(), 1);
    assert_eq!(storage.opens(), 1);
}

#[tokio::test]
async fn test_storage_failure_is_sticky() {
    let (storage, c) = counting().await;
    storage.fail.store(true, Ordering::SeqCst);

    let mut cursor = c.find(json!({"a": {"$gt": 0}}), None).unwrap();
    let err = cursor.drain_all().await.unwrap_err();
    assert_eq!(err.code(), "QUERY_STORAGE_FAILED");

    storage.fail.store(false, Ordering::SeqCst);
    let again = cursor.advance().await.unwrap_err();
    assert_eq!(again.code(), "QUERY_STORAGE_FAILED");
    assert_eq!(storage.opens(), 1);
}
