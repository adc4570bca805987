//! Column classification: numeric vs non-numeric, in source order.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
    pub numeric: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClassifiedColumns {
    pub columns: Vec<ColumnDescriptor>,
    pub numeric: Vec<String>,
    pub non_numeric: Vec<String>,
}

impl ClassifiedColumns {
    pub fn contains(&self, name: &str) -> bool { self.columns.iter().any(|c| c.name == name) }

    pub fn is_numeric(&self, name: &str) -> bool { self.columns.iter().any(|c| c.name == name && c.numeric) }
}

pub fn is_numeric_type(declared: &str) -> bool {
    matches!(
        declared.trim().to_ascii_lowercase().as_str(),
        "smallint" | "int2"
            | "integer" | "int" | "int4"
            | "bigint" | "int8"
            | "real" | "float4"
            | "numeric" | "decimal"
            | "double precision" | "double" | "float8"
    )
}

pub fn classify_columns(schema: &[(String, String)]) -> ClassifiedColumns {
    let mut out = ClassifiedColumns::default();
    for (name, declared) in schema {
        let numeric = is_numeric_type(declared);
        if numeric { out.numeric.push(name.clone()); } else { out.non_numeric.push(name.clone()); }
        out.columns.push(ColumnDescriptor { name: name.clone(), declared_type: declared.clone(), numeric });
    }
    out
}
