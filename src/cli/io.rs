//! JSON I/O handling for CLI
//!
//! - Input: pipeline JSON from the command line, data JSON from a file
//! - Output: one JSON value per line on stdout
//! - UTF-8 only

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde_json::Value;

use super::errors::{CliError, CliResult};
use crate::lang::Document;

/// Parses a pipeline argument: a JSON array of stage documents
pub fn parse_pipeline(text: &str) -> CliResult<Vec<Value>> {
    match serde_json::from_str(text) {
        Ok(Value::Array(stages)) => Ok(stages),
        Ok(other) => Err(CliError::input_error(format!(
            "pipeline must be a JSON array, got {}",
            other
        ))),
        Err(e) => Err(CliError::input_error(format!("Invalid pipeline JSON: {}", e))),
    }
}

/// Reads a data file: `{ "<collection>": [ {document}, ... ], ... }`
pub fn read_data(path: &Path) -> CliResult<BTreeMap<String, Vec<Document>>> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("Failed to read data file: {}", e)))?;
    parse_data(&content)
}

fn parse_data(content: &str) -> CliResult<BTreeMap<String, Vec<Document>>> {
    let raw: BTreeMap<String, Vec<Value>> = serde_json::from_str(content)
        .map_err(|e| CliError::input_error(format!("Invalid data JSON: {}", e)))?;

    let mut out = BTreeMap::new();
    for (collection, values) in raw {
        let documents = values
            .into_iter()
            .map(|value| match value {
                Value::Object(map) => Ok(map),
                other => Err(CliError::input_error(format!(
                    "documents in '{}' must be objects, got {}",
                    collection, other
                ))),
            })
            .collect::<CliResult<Vec<Document>>>()?;
        out.insert(collection, documents);
    }
    Ok(out)
}

/// Write one JSON value as a line to stdout
pub fn write_line(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pipeline() {
        assert_eq!(parse_pipeline(r#"[{"$limit": 2}]"#).unwrap().len(), 1);
        assert_eq!(
            parse_pipeline(r#"{"$limit": 2}"#).unwrap_err().code_str(),
            "AEROQUERY_CLI_INPUT_ERROR"
        );
        assert!(parse_pipeline("[").is_err());
    }

    #[test]
    fn test_parse_data() {
        let data = parse_data(r#"{"a": [{"x": 1}, {"x": 2}], "b": []}"#).unwrap();
        assert_eq!(data["a"].len(), 2);
        assert!(data["b"].is_empty());
        assert!(parse_data(r#"{"a": [1]}"#).is_err());
    }
}
