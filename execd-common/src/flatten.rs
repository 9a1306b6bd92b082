//! Flattening of JSON documents into point fields.
//!
//! Nested objects join their keys with `_`. Lists are expected to hold
//! `{ "id": ..., "value": ... }` entries, each of which becomes one string
//! field named after the list key and the entry id.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::point::{FieldValue, Point};

/// Flatten a JSON value into `(field, value)` pairs.
///
/// `null` values are skipped.
pub fn flatten(prefix: &str, json: &Value) -> Result<Vec<(String, FieldValue)>> {
    let mut out = Vec::new();
    flatten_into(prefix.to_string(), json, &mut out)?;
    Ok(out)
}

fn flatten_into(prefix: String, json: &Value, out: &mut Vec<(String, FieldValue)>) -> Result<()> {
    let scalar = match json {
        Value::Null => return Ok(()),
        Value::Bool(b) => Some(FieldValue::Boolean(*b)),
        Value::Number(n) => Some(number_value(n)),
        Value::String(s) => Some(FieldValue::String(s.clone())),
        Value::Object(_) | Value::Array(_) => None,
    };
    if let Some(value) = scalar {
        if prefix.is_empty() {
            return Err(Error::validation("a scalar JSON document has no field name"));
        }
        out.push((prefix, value));
        return Ok(());
    }

    let prefix = if prefix.is_empty() {
        prefix
    } else {
        prefix + "_"
    };

    match json {
        Value::Object(map) => {
            for (key, value) in map {
                flatten_into(format!("{}{}", prefix, key), value, out)?;
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                let (Some(id), Some(value)) = (entry.get("id"), entry.get("value")) else {
                    return Err(Error::validation(
                        "expecting lists to contain just objects with `id` and `value` items",
                    ));
                };
                out.push((
                    format!("{}{}", prefix, plain_text(id)),
                    FieldValue::String(plain_text(value)),
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

fn number_value(n: &serde_json::Number) -> FieldValue {
    if let Some(i) = n.as_i64() {
        FieldValue::Integer(i)
    } else if let Some(u) = n.as_u64() {
        FieldValue::UInteger(u)
    } else {
        FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Point {
    /// Add every field of a flattened JSON document.
    pub fn json_fields(self, json: &Value) -> Result<Self> {
        Ok(flatten("", json)?
            .into_iter()
            .fold(self, |point, (key, value)| point.field(key, value)))
    }
}
