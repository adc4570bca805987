//! Identifier qualification and path resolution utilities
//! ------------------------------------------------------
//! Single source of truth for resolving database/schema/table identifiers,
//! mapping them to local filesystem paths, and splitting user column lists.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

pub const DEFAULT_DB: &str = "corrmatrix";
pub const DEFAULT_SCHEMA: &str = "public";

static PLAIN_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("static regex"));

/// Normalize an identifier according to SQL rules:
/// - If enclosed in double-quotes, strip quotes and preserve case
/// - Otherwise, convert to lowercase for case-insensitive matching
pub fn normalize_identifier(ident: &str) -> String {
    let trimmed = ident.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len()-1].replace("\"\"", "\"")
    } else {
        trimmed.to_ascii_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct QueryDefaults {
    pub current_database: String,
    pub current_schema: String,
}

impl QueryDefaults {
    pub fn new(db: impl Into<String>, schema: impl Into<String>) -> Self {
        Self { current_database: db.into(), current_schema: schema.into() }
    }
    pub fn from_options(db: Option<&str>, schema: Option<&str>) -> Self {
        Self {
            current_database: db.unwrap_or(DEFAULT_DB).to_string(),
            current_schema: schema.unwrap_or(DEFAULT_SCHEMA).to_string(),
        }
    }
}

/// Qualify a table identifier with defaults into canonical form `<db>/<schema>/<table>`.
/// Accepts `table`, `schema.table`, `db.schema.table` and their `/`-separated forms.
pub fn qualify_regular_ident(ident: &str, d: &QueryDefaults) -> String {
    let s = ident.replace('\\', "/");
    let (db, schema) = (&d.current_database, &d.current_schema);
    let parts: Vec<&str> = if s.contains('/') {
        s.split('/').filter(|p| !p.is_empty()).collect()
    } else {
        s.split('.').collect()
    };
    let (dpart, spart, t): (String, String, String) = match parts.len() {
        0 => (normalize_identifier(db), normalize_identifier(schema), String::new()),
        1 => (normalize_identifier(db), normalize_identifier(schema), normalize_identifier(parts[0])),
        2 => (normalize_identifier(db), normalize_identifier(parts[0]), normalize_identifier(parts[1])),
        _ => (normalize_identifier(parts[0]), normalize_identifier(parts[1]), parts[2..].iter().map(|p| normalize_identifier(p)).collect::<Vec<_>>().join(".")),
    };
    format!("{}/{}/{}", dpart, spart, t)
}

/// Convert a canonical qualified identifier (with '/' separators) into a local filesystem path under `root`.
pub fn to_local_path(root: &Path, qualified_or_raw: &str) -> PathBuf {
    let s = qualified_or_raw.replace('\\', "/");
    let mut out = root.to_path_buf();
    for part in s.split('/') {
        let p = part.trim();
        if p.is_empty() || p == "." || p == ".." { continue; }
        out = out.join(p);
    }
    out
}

/// Validate a relation name supplied as a destination. Every dotted segment must be a plain
/// identifier or a double-quoted one.
pub fn validate_relation_name(name: &str) -> AppResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("invalid_identifier", "relation name must not be empty"));
    }
    let segments = split_delimited(trimmed, '.')?;
    if segments.len() > 3 {
        return Err(AppError::validation("invalid_identifier".to_string(), format!("relation name '{}' has too many segments", name)));
    }
    for seg in &segments {
        let quoted = seg.starts_with('"') && seg.ends_with('"') && seg.len() >= 2;
        if !quoted && !PLAIN_IDENT.is_match(seg) {
            return Err(AppError::validation("invalid_identifier".to_string(), format!("'{}' is not a valid identifier in '{}'", seg, name)));
        }
    }
    Ok(())
}

/// Split a comma-separated column list, honouring double quotes. Quoted names keep their
/// case and may contain commas (`""` escapes a quote); unquoted names are lower-cased.
pub fn split_column_list(spec: &str) -> AppResult<Vec<String>> {
    let raw = split_delimited(spec, ',')?;
    let mut out = Vec::with_capacity(raw.len());
    for item in raw {
        let name = normalize_identifier(&item);
        if name.is_empty() {
            return Err(AppError::validation("malformed_column_list".to_string(), format!("empty column name in '{}'", spec)));
        }
        out.push(name);
    }
    Ok(out)
}

fn split_delimited(spec: &str, delim: char) -> AppResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = spec.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                cur.push('"');
                cur.push('"');
                chars.next();
                continue;
            }
            in_quotes = !in_quotes;
            cur.push(c);
        } else if c == delim && !in_quotes {
            out.push(cur.trim().to_string());
            cur.clear();
        } else {
            cur.push(c);
        }
    }
    if in_quotes {
        return Err(AppError::validation("malformed_column_list".to_string(), format!("unterminated quote in '{}'", spec)));
    }
    out.push(cur.trim().to_string());
    Ok(out)
}
