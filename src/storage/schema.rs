use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::tprintln;
use super::Store;

/// Persisted `schema.json` layout: ordered columns with declared types.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TableSchema {
    #[serde(rename = "tableType", default = "TableSchema::default_table_type")]
    pub table_type: String,
    #[serde(default)]
    pub columns: Vec<ColumnEntry>,
}

impl TableSchema {
    fn default_table_type() -> String { "regular".to_string() }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
}

pub(crate) fn load_table_schema(store: &Store, table: &str) -> anyhow::Result<TableSchema> {
    let p = store.schema_path(table);
    tprintln!("[SCHEMA] load_table_schema: table='{}' path='{}' exists={}", table, p.display(), p.exists());
    if !p.exists() {
        anyhow::bail!("relation '{}' does not exist", table);
    }
    let text = std::fs::read_to_string(&p)?;
    let schema: TableSchema = serde_json::from_str(&text)?;
    Ok(schema)
}

pub(crate) fn save_table_schema(store: &Store, table: &str, df: &DataFrame) -> anyhow::Result<()> {
    let p = store.schema_path(table);
    let columns = df
        .get_columns()
        .iter()
        .map(|c| ColumnEntry { name: c.name().to_string(), declared_type: dtype_to_declared(c.dtype()) })
        .collect();
    let schema = TableSchema { table_type: TableSchema::default_table_type(), columns };
    std::fs::write(&p, serde_json::to_string_pretty(&schema)?)?;
    Ok(())
}

/// SQL-style declared type for a Polars dtype.
pub fn dtype_to_declared(dt: &DataType) -> String {
    match dt {
        DataType::Int16 => "smallint".into(),
        DataType::Int32 => "integer".into(),
        DataType::Int64 => "bigint".into(),
        DataType::Float32 => "real".into(),
        DataType::Float64 => "double precision".into(),
        DataType::Decimal(_, _) => "numeric".into(),
        DataType::String => "text".into(),
        DataType::Boolean => "boolean".into(),
        DataType::Date => "date".into(),
        DataType::Datetime(_, _) => "timestamp".into(),
        DataType::List(inner) => match **inner {
            DataType::Float64 => "double precision[]".into(),
            DataType::String => "text[]".into(),
            _ => format!("{}[]", dtype_to_declared(inner)),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_names() {
        assert_eq!(dtype_to_declared(&DataType::Int16), "smallint");
        assert_eq!(dtype_to_declared(&DataType::Int32), "integer");
        assert_eq!(dtype_to_declared(&DataType::Float32), "real");
        assert_eq!(dtype_to_declared(&DataType::Float64), "double precision");
        assert_eq!(dtype_to_declared(&DataType::String), "text");
        assert_eq!(dtype_to_declared(&DataType::List(Box::new(DataType::Float64))), "double precision[]");
        assert_eq!(dtype_to_declared(&DataType::List(Box::new(DataType::String))), "text[]");
    }

    #[test]
    fn schema_json_tolerates_missing_table_type() {
        let s: TableSchema = serde_json::from_str(r#"{"columns":[{"name":"a","type":"bigint"}]}"#).unwrap();
        assert_eq!(s.table_type, "regular");
        assert_eq!(s.columns, vec![ColumnEntry { name: "a".into(), declared_type: "bigint".into() }]);
    }
}
