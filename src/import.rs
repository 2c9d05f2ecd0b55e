/// JSON Row Import Module
///
/// Builds a [`RowSet`] from a JSON array of objects so callers (and the
/// command line) can feed file or API data to the batch writer.
///
/// Mapping rules:
/// - Columns are the union of object keys, in first-seen order
/// - A key missing from an object becomes NULL in that row
/// - null/bool/integer/float/string map to NULL/INTEGER (0 or 1)/INTEGER/REAL/TEXT
/// - Integers outside the signed 64-bit range are rejected rather than
///   rounded to REAL
/// - Nested arrays and objects are stored as their JSON text
use crate::core::db::{ColumnDef, Row, RowSet};
use crate::core::{BatchliteError, Result};
use rusqlite::types::Value;
use serde_json::{Map, Value as JsonValue};

/// Parses `text` into a row set, flagging the columns named in
/// `auto_columns` as auto-generated.
pub fn rowset_from_json(text: &str, auto_columns: &[&str]) -> Result<RowSet> {
    let parsed: JsonValue = serde_json::from_str(text)?;
    let records = match parsed {
        JsonValue::Array(items) => items,
        other => {
            return Err(BatchliteError::InvalidInput(format!(
                "Expected a JSON array of objects, found {}",
                kind(&other)
            )))
        }
    };

    let mut objects: Vec<Map<String, JsonValue>> = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        match record {
            JsonValue::Object(map) => objects.push(map),
            other => {
                return Err(BatchliteError::InvalidInput(format!(
                    "Element {} is {}, expected an object",
                    i,
                    kind(&other)
                )))
            }
        }
    }

    let mut names: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let columns = names
        .iter()
        .map(|name| {
            if auto_columns.contains(&name.as_str()) {
                ColumnDef::auto(name.clone())
            } else {
                ColumnDef::new(name.clone())
            }
        })
        .collect();
    let mut rows = RowSet::new(columns)?;

    for (i, mut object) in objects.into_iter().enumerate() {
        let row = names
            .iter()
            .map(|name| match object.remove(name) {
                Some(value) => to_sql_value(value).map_err(|msg| {
                    BatchliteError::InvalidInput(format!("Element {}, key '{}': {}", i, name, msg))
                }),
                None => Ok(Value::Null),
            })
            .collect::<Result<Row>>()?;
        rows.push_row(row)?;
    }

    Ok(rows)
}

fn to_sql_value(value: JsonValue) -> std::result::Result<Value, String> {
    let value = match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Integer(i64::from(b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None if n.is_u64() => return Err(format!("integer {} does not fit in a SQLite INTEGER", n)),
            None => n.as_f64().map(Value::Real).unwrap_or(Value::Null),
        },
        JsonValue::String(s) => Value::Text(s),
        nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => Value::Text(nested.to_string()),
    };
    Ok(value)
}

fn kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
