//! exec_correlate
//! --------------
//! Entry point of the association engine. Resolves the target and grouping columns of a
//! source relation, runs the staged pipeline (center, aggregate, deconstruct, assemble)
//! through temporary relations, and persists the output and summary relations.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Instant;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineSettings;
use crate::error::{AppError, AppResult};
use crate::ident::validate_relation_name;
use crate::storage::SharedStore;
use super::corr_stages::aggregate::aggregate_matrices;
use super::corr_stages::assemble::{assemble_output, assemble_summary, SummaryMeta, VARIABLE};
use super::corr_stages::center::{assign_groups, coalesce_rows, compute_group_means, ROW};
use super::corr_stages::classify::classify_columns;
use super::corr_stages::deconstruct::{deconstruct_all, POSITION};
use super::corr_stages::resolve::{resolve_columns, ResolvedColumns};
use super::df_utils::{any_to_json, f64_values, i64_values};
use super::primitives::{CorrelationAggregate, CovarianceAggregate, MatrixAggregate, SymMatrix};
use super::temp_scope::TempScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Correlation,
    Covariance,
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Correlation => write!(f, "Correlation"),
            Method::Covariance => write!(f, "Covariance"),
        }
    }
}

impl FromStr for Method {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "correlation" | "corr" | "pearson" => Ok(Method::Correlation),
            "covariance" | "cov" | "covar" => Ok(Method::Covariance),
            other => Err(AppError::validation("invalid_method".to_string(), format!("unknown association method '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationRequest {
    pub source: String,
    pub output: String,
    /// Comma-separated target list; `None` or `*` selects every numeric column.
    #[serde(default)]
    pub target_columns: Option<String>,
    #[serde(default)]
    pub grouping_columns: Option<String>,
    pub method: Method,
}

impl AssociationRequest {
    pub fn new(source: impl Into<String>, output: impl Into<String>, method: Method) -> Self {
        Self { source: source.into(), output: output.into(), target_columns: None, grouping_columns: None, method }
    }

    pub fn with_targets(mut self, targets: impl Into<String>) -> Self {
        self.target_columns = Some(targets.into());
        self
    }

    pub fn with_grouping(mut self, grouping: impl Into<String>) -> Self {
        self.grouping_columns = Some(grouping.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssociationResult {
    pub output_table: String,
    pub summary_table: String,
    pub column_count: usize,
    pub group_count: usize,
    pub elapsed_seconds: f64,
    pub ignored_non_numeric: Vec<String>,
    pub ignored_missing: Vec<String>,
}

/// Full symmetric matrix of one group, rebuilt from a stored output relation.
#[derive(Debug, Clone)]
pub struct GroupMatrix {
    pub key: Vec<serde_json::Value>,
    pub variables: Vec<String>,
    pub matrix: SymMatrix,
}

/// Summary relation name for `output`. A quoted last segment keeps its quotes.
fn summary_name(output: &str, suffix: &str) -> String {
    let trimmed = output.trim();
    if trimmed.len() >= 2 && trimmed.ends_with('"') {
        format!("{}{}\"", &trimmed[..trimmed.len() - 1], suffix)
    } else {
        format!("{}{}", trimmed, suffix)
    }
}

pub fn compute_association(store: &SharedStore, req: &AssociationRequest) -> AppResult<AssociationResult> {
    compute_association_with(store, req, &EngineSettings::default())
}

pub fn compute_association_with(store: &SharedStore, req: &AssociationRequest, settings: &EngineSettings) -> AppResult<AssociationResult> {
    match req.method {
        Method::Correlation => compute_association_using(store, req, settings, &CorrelationAggregate),
        Method::Covariance => compute_association_using(store, req, settings, &CovarianceAggregate),
    }
}

/// Run the pipeline with an injected aggregate. `req.method` only labels the summary.
pub fn compute_association_using<A: MatrixAggregate>(
    store: &SharedStore,
    req: &AssociationRequest,
    settings: &EngineSettings,
    agg: &A,
) -> AppResult<AssociationResult> {
    let t0 = Instant::now();
    debug!(target: "corrmatrix::exec", "compute_association: begin source='{}' output='{}' method={} aggregate={}", req.source, req.output, req.method, agg.name());

    validate_relation_name(&req.source)?;
    validate_relation_name(&req.output)?;
    let summary = summary_name(&req.output, &settings.summary_suffix);

    if !store.table_exists(&req.source) {
        return Err(AppError::schema("source_missing".to_string(), format!("source relation '{}' does not exist", req.source)));
    }
    for name in [&req.output, &summary] {
        if store.table_exists(name) {
            return Err(AppError::collision("relation_exists".to_string(), format!("relation '{}' already exists", name)));
        }
    }

    let classified = classify_columns(&store.describe(&req.source)?);
    let resolved = resolve_columns(&classified, req.target_columns.as_deref(), req.grouping_columns.as_deref())?;
    if !resolved.ignored_non_numeric.is_empty() {
        warn!(target: "corrmatrix::exec", "ignoring non-numeric columns: {}", resolved.ignored_non_numeric.join(", "));
    }
    if !resolved.ignored_missing.is_empty() {
        warn!(target: "corrmatrix::exec", "ignoring columns not found in '{}': {}", req.source, resolved.ignored_missing.join(", "));
    }

    let mut projection = resolved.grouping.clone();
    projection.extend(resolved.targets.iter().cloned());
    let source = store.read_columns(&req.source, &projection)?;
    if source.height() == 0 {
        return Err(AppError::schema("source_empty".to_string(), format!("source relation '{}' has no rows", req.source)));
    }

    let method = req.method.to_string();
    let meta = SummaryMeta {
        method: &method,
        source: &req.source,
        output_table: &req.output,
        targets: &resolved.targets,
        grouping: &resolved.grouping,
    };
    let mut scope = TempScope::new(store);
    let staged = run_stages(store, &mut scope, &source, &resolved, agg, meta, settings.partial_batch_rows);
    let released = scope.release();
    let (output_df, summary_df, group_count) = staged?;
    released?;

    // a failed create removes its own partial directory
    store.create_table_df(&req.output, output_df)?;
    if let Err(e) = store.create_table_df(&summary, summary_df) {
        if let Err(drop_err) = store.delete_table(&req.output) {
            warn!(target: "corrmatrix::exec", "failed to drop '{}' after summary write failure: {}", req.output, drop_err);
        }
        return Err(e.into());
    }

    let result = AssociationResult {
        output_table: req.output.clone(),
        summary_table: summary,
        column_count: resolved.targets.len(),
        group_count,
        elapsed_seconds: t0.elapsed().as_secs_f64(),
        ignored_non_numeric: resolved.ignored_non_numeric,
        ignored_missing: resolved.ignored_missing,
    };
    info!(
        target: "corrmatrix::exec",
        "{} of {} columns over {} group(s) written to '{}' in {:.3}s",
        req.method, result.column_count, result.group_count, result.output_table, result.elapsed_seconds
    );
    Ok(result)
}

/// Run every stage, materialising each intermediate through `scope` and reading it back
/// before the next stage. Returns `(output, summary, group count)`.
fn run_stages<A: MatrixAggregate>(
    store: &SharedStore,
    scope: &mut TempScope,
    source: &DataFrame,
    resolved: &ResolvedColumns,
    agg: &A,
    meta: SummaryMeta<'_>,
    batch_rows: usize,
) -> AppResult<(DataFrame, DataFrame, usize)> {
    let targets = &resolved.targets;
    let grouping = &resolved.grouping;

    let (keyed, groups) = assign_groups(source, grouping, targets)?;
    let groups_rel = scope.materialize("groups", groups)?;
    let keyed_rel = scope.materialize("keyed", keyed)?;
    let keyed = store.read_df(&keyed_rel)?;

    let means = compute_group_means(&keyed, targets)?;
    let means_rel = scope.materialize("means", means)?;
    let means = store.read_df(&means_rel)?;

    let coalesced = coalesce_rows(&keyed, &means, targets)?;
    let coalesced_rel = scope.materialize("coalesced", coalesced)?;
    let coalesced = store.read_df(&coalesced_rel)?;

    let groups = store.read_df(&groups_rel)?;
    let aggregated = aggregate_matrices(&coalesced, &means, groups.height(), targets, agg, batch_rows)?;
    let aggregated_rel = scope.materialize("aggregate", aggregated)?;
    // group enumeration only ever sees the materialised aggregate
    let aggregated = store.read_df(&aggregated_rel)?;

    let deconstructed = deconstruct_all(&aggregated, targets.len())?;
    let output = assemble_output(&deconstructed, &groups, targets, grouping)?;
    let summary = assemble_summary(&aggregated, &groups, meta)?;
    debug!(target: "corrmatrix::exec", "run_stages: temporaries={} output_rows={}", scope.created().len(), output.height());
    Ok((output, summary, groups.height()))
}

/// Row index of the first row of each row's group key; every row is in group 0 without keys.
fn group_starts(df: &DataFrame, grouping: &[String]) -> AppResult<Vec<Option<i64>>> {
    if grouping.is_empty() {
        return Ok(vec![Some(0); df.height()]);
    }
    let keys: Vec<Expr> = grouping.iter().map(|g| col(g.as_str())).collect();
    let marked = df
        .clone()
        .lazy()
        .with_row_index(ROW, None)
        .select([col(ROW).cast(DataType::Int64).min().over(keys).alias(ROW)])
        .collect()?;
    i64_values(&marked, ROW)
}

/// Rebuild each group's full symmetric matrix from a stored output relation.
///
/// Columns before `column_position` are the group key; columns after `variable` are the
/// targets. Entries stored as NULL come back as NaN.
pub fn read_matrices(store: &SharedStore, output: &str) -> AppResult<Vec<GroupMatrix>> {
    if !store.table_exists(output) {
        return Err(AppError::schema("relation_missing".to_string(), format!("relation '{}' does not exist", output)));
    }
    let df = store.read_df(output)?;
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let pos_idx = names
        .iter()
        .position(|c| c == POSITION)
        .filter(|i| names.get(i + 1).map(|s| s.as_str()) == Some(VARIABLE))
        .ok_or_else(|| AppError::schema("not_an_association".to_string(), format!("relation '{}' is not an association output", output)))?;
    let grouping = &names[..pos_idx];
    let variables: Vec<String> = names[pos_idx + 2..].to_vec();
    let n = variables.len();

    let key_cols: Vec<&Column> = grouping.iter().map(|g| df.column(g)).collect::<PolarsResult<Vec<_>>>()?;
    let positions = i64_values(&df, POSITION)?;
    let values: Vec<Vec<Option<f64>>> = variables.iter().map(|v| f64_values(&df, v)).collect::<AppResult<_>>()?;
    let starts = group_starts(&df, grouping)?;

    let mut out: Vec<GroupMatrix> = Vec::new();
    let mut current_start: Option<i64> = None;
    for row in 0..df.height() {
        let start = starts[row];
        if start == Some(row as i64) {
            let key = key_cols.iter().map(|c| c.get(row).map(|av| any_to_json(&av))).collect::<PolarsResult<Vec<_>>>()?;
            out.push(GroupMatrix { key, variables: variables.clone(), matrix: SymMatrix::from_row_major(n, vec![f64::NAN; n * n])? });
            current_start = start;
        } else if start != current_start {
            return Err(AppError::schema("not_an_association".to_string(), format!("group rows of '{}' are not contiguous", output)));
        }
        let i = match positions[row] {
            Some(p) if p >= 1 && (p as usize) <= n => p as usize - 1,
            other => {
                return Err(AppError::schema("bad_position".to_string(), format!("column_position {:?} out of range 1..{} in '{}'", other, n, output)));
            }
        };
        if let Some(current) = out.last_mut() {
            for (j, col_values) in values.iter().enumerate().take(i + 1) {
                current.matrix.set_sym(i, j, col_values[row].unwrap_or(f64::NAN));
            }
        }
    }
    Ok(out)
}
