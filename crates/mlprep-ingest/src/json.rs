//! Flattening of JSON-encoded columns.

use polars::prelude::*;
use serde_json::Value;

use mlprep_model::{PrepError, Result};

/// Flatten a column of JSON-object strings into one sub-column per key.
///
/// Sub-columns are named `column/key`, in first-seen key order across the
/// rows. Per-key dtypes are inferred from the values: all-boolean becomes
/// `Boolean`, all-numeric becomes `Float64`, anything else becomes `String`
/// (nested objects and arrays are re-serialized compactly). Null or empty
/// cells contribute a null to every sub-column.
///
/// With `drop` set, the original JSON column is removed from the result.
pub fn flatten_json_column(df: &DataFrame, column: &str, drop: bool) -> Result<DataFrame> {
    let casted = df.column(column)?.cast(&DataType::String)?;
    let ca = casted.str()?;

    let mut keys: Vec<String> = Vec::new();
    let mut rows: Vec<Option<serde_json::Map<String, Value>>> = Vec::with_capacity(df.height());
    for opt in ca.into_iter() {
        let parsed = match opt {
            None => None,
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => match serde_json::from_str::<Value>(raw)? {
                Value::Object(map) => Some(map),
                other => {
                    return Err(PrepError::Schema(format!(
                        "column '{column}' holds a non-object JSON value: {other}"
                    )));
                }
            },
        };
        if let Some(map) = &parsed {
            for key in map.keys() {
                if !keys.iter().any(|k| k == key) {
                    keys.push(key.clone());
                }
            }
        }
        rows.push(parsed);
    }

    let mut out = df.clone();
    for key in &keys {
        let name = format!("{column}/{key}");
        let values: Vec<Option<&Value>> = rows
            .iter()
            .map(|row| row.as_ref().and_then(|map| map.get(key)).filter(|v| !v.is_null()))
            .collect();
        out.with_column(build_column(name, &values))?;
    }
    if drop {
        out = out.drop(column)?;
    }
    Ok(out)
}

/// Build a typed column from per-row JSON values.
fn build_column(name: String, values: &[Option<&Value>]) -> Column {
    let non_null: Vec<&Value> = values.iter().flatten().copied().collect();

    if !non_null.is_empty() && non_null.iter().all(|v| v.is_boolean()) {
        let data: Vec<Option<bool>> = values.iter().map(|o| o.and_then(Value::as_bool)).collect();
        return Column::new(name.into(), data);
    }
    if !non_null.is_empty() && non_null.iter().all(|v| v.is_number()) {
        let data: Vec<Option<f64>> = values.iter().map(|o| o.and_then(Value::as_f64)).collect();
        return Column::new(name.into(), data);
    }
    let data: Vec<Option<String>> = values
        .iter()
        .map(|o| {
            o.map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
        .collect();
    Column::new(name.into(), data)
}
