//! Database configuration
//!
//! A config names the database and declares its collections and their
//! indexed paths. Accepted collection forms:
//! - `["users", "orders"]`: collections without secondary indexes
//! - `{ "users": ["email", "address.city"] }`: index path lists
//! - `{ "users": { "email": true, "age": false } }`: index toggles
//! - `{ "users": true }`: a collection without secondary indexes
//!
//! `false` entries declare nothing. `_id` is always indexed and never
//! needs to be listed.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};
use crate::lang::{Path, ID_FIELD};
use crate::observability::{log_event_with_fields, Event};

/// One collection declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionDecl {
    Enabled(bool),
    Indexes(Vec<String>),
    Toggles(BTreeMap<String, bool>),
}

/// The declared collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Collections {
    Names(Vec<String>),
    Declared(BTreeMap<String, CollectionDecl>),
}

impl Default for Collections {
    fn default() -> Self {
        Collections::Names(Vec::new())
    }
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Database name (optional, default "default")
    #[serde(default = "default_name")]
    pub name: String,

    /// Collection declarations (optional, default none)
    #[serde(default)]
    pub collections: Collections,
}

fn default_name() -> String {
    "default".to_string()
}

impl DbConfig {
    /// Load configuration from file
    pub fn load(path: &FsPath) -> QueryResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| QueryError::config(format!("Failed to read config: {}", e)))?;
        let config = Self::from_json_str(&content)?;

        let collections = config.resolved().len().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("collections", &collections),
                ("name", &config.name),
                ("path", &path.display().to_string()),
            ],
        );
        Ok(config)
    }

    /// Parses and validates configuration JSON
    pub fn from_json_str(content: &str) -> QueryResult<Self> {
        let config: DbConfig = serde_json::from_str(content)
            .map_err(|e| QueryError::config(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> QueryResult<()> {
        if self.name.trim().is_empty() {
            return Err(QueryError::config("name must not be empty"));
        }

        if let Collections::Names(names) = &self.collections {
            let mut seen = std::collections::BTreeSet::new();
            for name in names {
                if !seen.insert(name.as_str()) {
                    return Err(QueryError::config(format!(
                        "collection '{}' is declared twice",
                        name
                    )));
                }
            }
        }

        for (collection, indexes) in self.resolved() {
            if collection.trim().is_empty() {
                return Err(QueryError::config("collection names must not be empty"));
            }
            for index in &indexes {
                Path::parse(index).map_err(|_| {
                    QueryError::config(format!(
                        "invalid index path '{}' on collection '{}'",
                        index, collection
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Declared collections with their secondary index paths, sorted by name
    pub fn resolved(&self) -> Vec<(String, Vec<String>)> {
        let mut out: Vec<(String, Vec<String>)> = match &self.collections {
            Collections::Names(names) => names.iter().map(|n| (n.clone(), Vec::new())).collect(),
            Collections::Declared(declared) => declared
                .iter()
                .filter_map(|(name, decl)| {
                    let indexes = match decl {
                        CollectionDecl::Enabled(false) => return None,
                        CollectionDecl::Enabled(true) => Vec::new(),
                        CollectionDecl::Indexes(paths) => paths.clone(),
                        CollectionDecl::Toggles(toggles) => toggles
                            .iter()
                            .filter(|(_, on)| **on)
                            .map(|(path, _)| path.clone())
                            .collect(),
                    };
                    Some((name.clone(), indexes))
                })
                .collect(),
        };

        for (_, indexes) in out.iter_mut() {
            indexes.retain(|path| path != ID_FIELD);
            indexes.sort();
            indexes.dedup();
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_collection_forms() {
        let config = DbConfig::from_json_str(r#"{"collections": ["b", "a"]}"#).unwrap();
        assert_eq!(config.name, "default");
        assert_eq!(
            config.resolved(),
            vec![("a".to_string(), vec![]), ("b".to_string(), vec![])]
        );

        let config = DbConfig::from_json_str(
            r#"{"name": "shop", "collections": {
                "users": ["email", "address.city", "_id"],
                "orders": {"total": true, "note": false},
                "logs": true,
                "gone": false
            }}"#,
        )
        .unwrap();
        assert_eq!(
            config.resolved(),
            vec![
                ("logs".to_string(), vec![]),
                ("orders".to_string(), vec!["total".to_string()]),
                (
                    "users".to_string(),
                    vec!["address.city".to_string(), "email".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn test_validation_failures() {
        for bad in [
            r#"{"name": "", "collections": []}"#,
            r#"{"collections": ["a", "a"]}"#,
            r#"{"collections": {"a": ["$bad"]}}"#,
            r#"{"collections": {"a": ["x..y"]}}"#,
            r#"{"collections": {"": true}}"#,
            r#"{"collections": 7}"#,
            r#"not json"#,
        ] {
            let err = DbConfig::from_json_str(bad).unwrap_err();
            assert_eq!(err.code(), "QUERY_CONFIG_INVALID", "{}", bad);
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "disk", "collections": {{"c": ["x"]}}}}"#).unwrap();
        let config = DbConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "disk");
        assert_eq!(config.resolved(), vec![("c".to_string(), vec!["x".to_string()])]);

        assert!(DbConfig::load(FsPath::new("/nonexistent/aeroquery.json")).is_err());
    }
}
