//! Target column resolution
//! Turns the requested target/grouping lists into the fixed column order every later stage uses.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::ident::split_column_list;
use super::classify::ClassifiedColumns;

/// Field names of the output relation that source columns may not shadow.
pub const OUTPUT_RESERVED: [&str; 2] = ["column_position", "variable"];

/// Field names of the summary relation that grouping columns may not shadow.
pub const SUMMARY_RESERVED: [&str; 6] = ["method", "source", "output_table", "column_names", "mean_vector", "total_rows_processed"];

/// Prefix of internal working columns and temporary relations.
pub const INTERNAL_PREFIX: &str = "__corr_";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedColumns {
    pub targets: Vec<String>,
    pub grouping: Vec<String>,
    pub ignored_non_numeric: Vec<String>,
    pub ignored_missing: Vec<String>,
}

/// `None`, a blank list and `*` all select every numeric column.
fn is_all_columns(spec: Option<&str>) -> bool {
    match spec.map(str::trim) {
        None | Some("") | Some("*") => true,
        Some(_) => false,
    }
}

fn check_internal(name: &str) -> AppResult<()> {
    if name.starts_with(INTERNAL_PREFIX) {
        return Err(AppError::schema("reserved_column".to_string(), format!("column name '{}' uses the reserved prefix '{}'", name, INTERNAL_PREFIX)));
    }
    Ok(())
}

fn check_output_reserved(name: &str) -> AppResult<()> {
    if OUTPUT_RESERVED.contains(&name) {
        return Err(AppError::schema("reserved_column".to_string(), format!("column name '{}' collides with a reserved output field", name)));
    }
    check_internal(name)
}

pub fn resolve_grouping(classified: &ClassifiedColumns, grouping_spec: Option<&str>) -> AppResult<Vec<String>> {
    let spec = match grouping_spec {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(Vec::new()),
    };
    let mut out: Vec<String> = Vec::new();
    for name in split_column_list(spec)? {
        if SUMMARY_RESERVED.contains(&name.as_str()) {
            return Err(AppError::schema("reserved_column".to_string(), format!("grouping column '{}' collides with a reserved summary field", name)));
        }
        check_output_reserved(&name)?;
        if !classified.contains(&name) {
            return Err(AppError::schema("grouping_column_missing".to_string(), format!("grouping column '{}' does not exist in the source relation", name)));
        }
        if !out.contains(&name) { out.push(name); }
    }
    Ok(out)
}

pub fn resolve_columns(classified: &ClassifiedColumns, target_spec: Option<&str>, grouping_spec: Option<&str>) -> AppResult<ResolvedColumns> {
    let grouping = resolve_grouping(classified, grouping_spec)?;
    let mut resolved = ResolvedColumns { grouping, ..Default::default() };

    if is_all_columns(target_spec) {
        for name in &classified.numeric {
            if resolved.grouping.contains(name) { continue; }
            check_output_reserved(name)?;
            resolved.targets.push(name.clone());
        }
    } else {
        let names = split_column_list(target_spec.unwrap_or_default())?;
        let mut seen: HashSet<String> = HashSet::new();
        for name in names {
            check_output_reserved(&name)?;
            if resolved.grouping.contains(&name) {
                return Err(AppError::validation("target_is_grouping".to_string(), format!("column '{}' cannot be both a target and a grouping column", name)));
            }
            if !seen.insert(name.clone()) { continue; }
            if classified.is_numeric(&name) {
                resolved.targets.push(name);
            } else if classified.contains(&name) {
                resolved.ignored_non_numeric.push(name);
            } else {
                resolved.ignored_missing.push(name);
            }
        }
    }

    debug!(
        target: "corrmatrix::exec",
        "resolve_columns: targets={:?} grouping={:?} non_numeric={:?} missing={:?}",
        resolved.targets, resolved.grouping, resolved.ignored_non_numeric, resolved.ignored_missing
    );

    if resolved.targets.len() < 2 {
        let mut msg = format!("at least two numeric target columns are required, found {}", resolved.targets.len());
        if !resolved.ignored_non_numeric.is_empty() {
            msg.push_str(&format!("; non-numeric columns ignored: {}", resolved.ignored_non_numeric.join(", ")));
        }
        if !resolved.ignored_missing.is_empty() {
            msg.push_str(&format!("; columns not found: {}", resolved.ignored_missing.join(", ")));
        }
        return Err(AppError::validation("too_few_columns".to_string(), msg));
    }
    Ok(resolved)
}
