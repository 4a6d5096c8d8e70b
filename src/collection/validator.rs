//! Field-name validation for stored documents
//!
//! Field names may not start with `$`, at any depth: nested documents and
//! documents inside arrays are checked too.

use serde_json::{Map, Value};

use crate::errors::{QueryError, QueryResult};

/// Validates every field name in a document
pub fn validate_document(document: &Map<String, Value>) -> QueryResult<()> {
    validate_map(document, "")
}

fn validate_map(map: &Map<String, Value>, prefix: &str) -> QueryResult<()> {
    for (key, value) in map {
        let location = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        if key.starts_with('$') {
            return Err(QueryError::validation(format!(
                "field name '{}' must not start with '$'",
                location
            )));
        }
        validate_value(value, &location)?;
    }
    Ok(())
}

fn validate_value(value: &Value, location: &str) -> QueryResult<()> {
    match value {
        Value::Object(map) => validate_map(map, location),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| validate_value(item, &format!("{}[{}]", location, i))),
        _ => Ok(()),
    }
}
