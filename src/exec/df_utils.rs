use polars::prelude::*;
use serde_json::Value;

use crate::error::AppResult;

/// Values of a numeric column as `f64`, NULLs preserved.
pub(crate) fn f64_values(df: &DataFrame, name: &str) -> AppResult<Vec<Option<f64>>> {
    let c = df.column(name)?.cast(&DataType::Float64)?;
    let ca = c.f64()?;
    Ok(ca.into_iter().collect())
}

pub(crate) fn i64_values(df: &DataFrame, name: &str) -> AppResult<Vec<Option<i64>>> {
    let c = df.column(name)?.cast(&DataType::Int64)?;
    let ca = c.i64()?;
    Ok(ca.into_iter().collect())
}

pub(crate) fn any_to_json(av: &AnyValue) -> Value {
    match av {
        AnyValue::Int16(v) => serde_json::json!(v),
        AnyValue::Int32(v) => serde_json::json!(v),
        AnyValue::Int64(v) => serde_json::json!(v),
        AnyValue::UInt32(v) => serde_json::json!(v),
        AnyValue::Float32(v) => if v.is_finite() { serde_json::json!(v) } else { Value::Null },
        AnyValue::Float64(v) => if v.is_finite() { serde_json::json!(v) } else { Value::Null },
        AnyValue::Boolean(v) => serde_json::json!(v),
        AnyValue::String(v) => serde_json::json!(v),
        AnyValue::StringOwned(v) => serde_json::json!(v.as_str()),
        AnyValue::List(s) => {
            let mut items = Vec::with_capacity(s.len());
            for i in 0..s.len() {
                items.push(s.get(i).map(|v| any_to_json(&v)).unwrap_or(Value::Null));
            }
            Value::Array(items)
        }
        AnyValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

pub fn dataframe_to_json(df: &DataFrame) -> Value {
    // Convert to vector of maps
    let cols = df.get_column_names();
    let mut out = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut map = serde_json::Map::with_capacity(cols.len());
        for c in &cols {
            let v = match df.column(c) {
                Ok(col) => col.get(row_idx).map(|av| any_to_json(&av)).unwrap_or(Value::Null),
                Err(_) => Value::Null,
            };
            map.insert(c.to_string(), v);
        }
        out.push(Value::Object(map));
    }
    Value::Array(out)
}
