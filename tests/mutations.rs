//! Mutation and lifecycle tests
//!
//! Covers cursor-driven removal and update, cursor state rules, and
//! opening a database from a configuration file.

use std::io::Write;
use std::sync::Arc;

use aeroquery::lang::Document;
use aeroquery::storage::MemoryStorage;
use aeroquery::{Collection, Db, DbConfig};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

fn docs(values: Vec<Value>) -> Vec<Document> {
    values
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}

async fn people() -> Collection {
    let config = DbConfig::from_json_str(r#"{"collections": {"people": ["age"]}}"#).unwrap();
    let db = Db::open(&config, Arc::new(MemoryStorage::new())).unwrap();
    let c = db.collection("people").unwrap();
    c.insert(docs(vec![
        json!({"name": "ann", "age": 31, "team": "red"}),
        json!({"name": "bob", "age": 25, "team": "blue"}),
        json!({"name": "cy", "age": 40, "team": "red"}),
        json!({"name": "di", "age": 19}),
    ]))
    .await
    .unwrap();
    c
}

// =============================================================================
// REMOVE / UPDATE
// =============================================================================

#[tokio::test]
async fn test_remove_through_index_scan() {
    let c = people().await;

    assert_eq!(c.remove(json!({"age": {"$gte": 30}})).await.unwrap(), 2);
    assert_eq!(c.count(json!({})).await.unwrap(), 2);
    assert_eq!(c.count(json!({"age": {"$gte": 30}})).await.unwrap(), 0);
}

#[tokio::test]
async fn test_remove_through_disjunction() {
    let c = people().await;

    let removed = c
        .remove(json!({"$or": [{"age": {"$lt": 30}}, {"team": "blue"}]}))
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let left = c.find(json!({}), None).unwrap().drain_all().await.unwrap();
    let names: Vec<&Value> = left.iter().map(|d| &d["name"]).collect();
    assert_eq!(names, vec![&json!("ann"), &json!("cy")]);
}

#[tokio::test]
async fn test_update_moving_index_key_visits_once() {
    let c = people().await;

    let updated = c
        .update(
            json!({"age": {"$gte": 20}}),
            &json!({"age": {"$add": ["$age", 100]}, "seen": true}),
        )
        .await
        .unwrap();
    assert_eq!(updated, 3);

    assert_eq!(c.count(json!({"age": {"$gte": 100}})).await.unwrap(), 3);
    assert_eq!(c.count(json!({"seen": true})).await.unwrap(), 3);

    let di = c.find_one(json!({"name": "di"}), None).await.unwrap().unwrap();
    assert_eq!(di["age"], json!(19));
    assert!(di.get("seen").is_none());
}

#[tokio::test]
async fn test_update_rejects_identity_change() {
    let c = people().await;

    let err = c
        .update(json!({"name": "ann"}), &json!({"_id": 99}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "QUERY_VALIDATION_FAILED");
    assert!(c.find_one(json!({"_id": 99}), None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_insert_validates_before_writing() {
    let c = people().await;

    let err = c
        .insert(docs(vec![
            json!({"name": "ok"}),
            json!({"name": "bad", "nested": {"$set": 1}}),
        ]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "QUERY_VALIDATION_FAILED");
    assert_eq!(c.count(json!({})).await.unwrap(), 4);
}

// =============================================================================
// CURSOR STATE
// =============================================================================

#[tokio::test]
async fn test_builder_after_open_is_rejected() {
    let c = people().await;

    let mut cursor = c.find(json!({"team": "red"}), None).unwrap();
    assert!(cursor.advance().await.unwrap().is_some());
    assert!(cursor.is_opened());

    let err = cursor.limit(1).unwrap_err();
    assert_eq!(err.code(), "QUERY_CURSOR_STATE");

    // The open cursor keeps its pipeline.
    assert!(cursor.advance().await.unwrap().is_some());
    assert!(cursor.advance().await.unwrap().is_none());
    assert!(cursor.advance().await.unwrap().is_none());
}

#[tokio::test]
async fn test_read_cursor_cannot_mutate() {
    let c = people().await;

    let mut cursor = c.cursor();
    assert!(cursor.advance().await.unwrap().is_some());
    let err = cursor.delete_current().await.unwrap_err();
    assert_eq!(err.code(), "QUERY_CURSOR_STATE");
    assert_eq!(c.count(json!({})).await.unwrap(), 4);
}

#[tokio::test]
async fn test_hint_on_unindexed_path() {
    let c = people().await;

    let mut cursor = c.cursor();
    assert_eq!(cursor.hint("team").unwrap_err().code(), "QUERY_CURSOR_STATE");
    assert!(cursor.hint("age").is_ok());
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[tokio::test]
async fn test_open_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"{
            "name": "shop",
            "collections": {
                "orders": ["total", "customer.id"],
                "notes": true,
                "archive": false
            }
        }"#,
    )
    .unwrap();

    let config = DbConfig::load(file.path()).unwrap();
    let db = Db::open(&config, Arc::new(MemoryStorage::new())).unwrap();
    assert_eq!(db.name(), "shop");
    assert_eq!(db.collection_names(), vec!["notes", "orders"]);
    assert_eq!(
        db.collection("archive").unwrap_err().code(),
        "QUERY_UNKNOWN_COLLECTION"
    );

    let orders = db.collection("orders").unwrap();
    assert!(orders.is_indexed("customer.id"));
    assert!(!orders.is_indexed("status"));
}
