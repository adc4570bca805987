//! Mean-centering stage
//! Assigns dense group ids, computes per-group column means and imputes NULLs with them.

use polars::prelude::*;
use tracing::debug;

use crate::error::AppResult;
use crate::tprintln;

/// Dense group id column, assigned in order of first appearance.
pub const GID: &str = "__corr_gid";

/// Source row ordinal, used to keep row order stable across joins.
pub const ROW: &str = "__corr_row";

/// Ordinal of the first source row of a row's group.
const FIRST_ROW: &str = "__corr_first_row";

pub fn mean_col(i: usize) -> String { format!("__corr_mean_{}", i) }

/// Split the projected source into:
/// - a keyed frame `[ROW, GID, targets as f64...]`, one row per source row,
/// - a groups frame `[GID, grouping...]`, one row per distinct group key.
///
/// NULL key values form their own group. Without grouping columns every row is group 0.
pub fn assign_groups(source: &DataFrame, grouping: &[String], targets: &[String]) -> AppResult<(DataFrame, DataFrame)> {
    let __t0 = std::time::Instant::now();
    let height = source.height();
    let mut base = source.clone();
    base.with_column(Series::new(ROW.into(), (0..height as i64).collect::<Vec<i64>>()))?;

    let mut select: Vec<Expr> = vec![col(ROW), col(GID)];
    select.extend(targets.iter().map(|t| col(t.as_str()).cast(DataType::Float64)));

    let (keyed, groups) = if grouping.is_empty() {
        let keyed = base.lazy().with_column(lit(0i64).alias(GID)).select(select).collect()?;
        (keyed, DataFrame::new(vec![Series::new(GID.into(), vec![0i64]).into()])?)
    } else {
        let keys: Vec<Expr> = grouping.iter().map(|g| col(g.as_str())).collect();
        // group_by keeps NULL keys together; ordering by each group's first row makes the ids dense
        // in order of first appearance
        let firsts = base
            .clone()
            .lazy()
            .group_by(keys.clone())
            .agg([col(ROW).min().alias(FIRST_ROW)])
            .sort_by_exprs([col(FIRST_ROW)], SortMultipleOptions::default())
            .with_row_index(GID, None)
            .with_column(col(GID).cast(DataType::Int64))
            .collect()?;
        let keyed = base
            .lazy()
            .with_column(col(ROW).min().over(keys).alias(FIRST_ROW))
            .join(firsts.clone().lazy().select([col(FIRST_ROW), col(GID)]), [col(FIRST_ROW)], [col(FIRST_ROW)], JoinArgs::new(JoinType::Left))
            .sort_by_exprs([col(ROW)], SortMultipleOptions::default())
            .select(select)
            .collect()?;
        let mut group_cols: Vec<Expr> = vec![col(GID)];
        group_cols.extend(grouping.iter().map(|g| col(g.as_str())));
        (keyed, firsts.lazy().select(group_cols).collect()?)
    };
    debug!(target: "corrmatrix::exec", "assign_groups: rows={} groups={}", height, groups.height());
    tprintln!("[CENTER] assign_groups: rows={} groups={} took={:?}", height, groups.height(), __t0.elapsed());
    Ok((keyed, groups))
}

/// Per-group arithmetic mean of each target over its non-NULL values: `[GID, mean_0..mean_{n-1}]`.
pub fn compute_group_means(keyed: &DataFrame, targets: &[String]) -> AppResult<DataFrame> {
    let __t0 = std::time::Instant::now();
    let aggs: Vec<Expr> = targets
        .iter()
        .enumerate()
        .map(|(i, t)| col(t.as_str()).mean().alias(mean_col(i)))
        .collect();
    let means = keyed
        .clone()
        .lazy()
        .group_by([col(GID)])
        .agg(aggs)
        .sort_by_exprs([col(GID)], SortMultipleOptions::default())
        .collect()?;
    tprintln!("[CENTER] compute_group_means: groups={} took={:?}", means.height(), __t0.elapsed());
    Ok(means)
}

/// Join every row to its group's means and replace NULL target values with the mean.
/// Output: `[ROW, GID, targets (imputed)..., mean_0..mean_{n-1}]` in source row order.
pub fn coalesce_rows(keyed: &DataFrame, means: &DataFrame, targets: &[String]) -> AppResult<DataFrame> {
    let __t0 = std::time::Instant::now();
    let fills: Vec<Expr> = targets
        .iter()
        .enumerate()
        .map(|(i, t)| col(t.as_str()).fill_null(col(mean_col(i).as_str())).alias(t.as_str()))
        .collect();
    let out = keyed
        .clone()
        .lazy()
        .join(means.clone().lazy(), [col(GID)], [col(GID)], JoinArgs::new(JoinType::Left))
        .with_columns(fills)
        .sort_by_exprs([col(ROW)], SortMultipleOptions::default())
        .collect()?;
    tprintln!("[CENTER] coalesce_rows: rows={} took={:?}", out.height(), __t0.elapsed());
    Ok(out)
}
