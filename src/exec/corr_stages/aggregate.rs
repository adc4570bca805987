//! Matrix aggregation stage
//! Reduces coalesced row vectors into one matrix, row count and mean vector per group.

use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::debug;

use crate::error::AppResult;
use crate::exec::df_utils::{f64_values, i64_values};
use crate::exec::primitives::{scale_matrix, MatrixAggregate, SymMatrix};
use crate::tprintln;
use super::center::{mean_col, GID};

pub const COUNT: &str = "__corr_count";
pub const MATRIX: &str = "__corr_matrix";
pub const MEANS: &str = "__corr_means";

/// One finished group: contributing rows, optional matrix, mean vector.
#[derive(Debug, Clone)]
pub struct GroupAggregate {
    pub gid: i64,
    pub count: u64,
    pub matrix: Option<SymMatrix>,
    pub means: Vec<Option<f64>>,
}

/// Fold the coalesced rows into per-group states, `batch_rows` rows at a time.
///
/// Each batch builds its own partial states, which are then merged into the running totals.
/// Rows whose vector still holds a NULL after coalescing do not contribute.
fn accumulate_batches<A: MatrixAggregate>(
    coalesced: &DataFrame,
    targets: &[String],
    agg: &A,
    batch_rows: usize,
) -> AppResult<BTreeMap<i64, A::State>> {
    let n = targets.len();
    let gids = i64_values(coalesced, GID)?;
    let values: Vec<Vec<Option<f64>>> = targets.iter().map(|t| f64_values(coalesced, t)).collect::<AppResult<_>>()?;
    let means: Vec<Vec<Option<f64>>> = (0..n).map(|i| f64_values(coalesced, &mean_col(i))).collect::<AppResult<_>>()?;

    let mut totals: BTreeMap<i64, A::State> = BTreeMap::new();
    let mut skipped = 0usize;
    let mut x = vec![0.0f64; n];
    let mut mu = vec![0.0f64; n];
    let height = coalesced.height();
    let step = batch_rows.max(1);
    let mut start = 0usize;
    while start < height {
        let end = (start + step).min(height);
        let mut partials: BTreeMap<i64, A::State> = BTreeMap::new();
        'rows: for row in start..end {
            let Some(gid) = gids[row] else { skipped += 1; continue };
            for j in 0..n {
                match (values[j][row], means[j][row]) {
                    (Some(v), Some(m)) => { x[j] = v; mu[j] = m; }
                    _ => { skipped += 1; continue 'rows; }
                }
            }
            let st = partials.entry(gid).or_insert_with(|| agg.init(n));
            agg.accumulate(st, &x, &mu);
        }
        for (gid, part) in partials {
            let cur = totals.remove(&gid).unwrap_or_else(|| agg.init(n));
            totals.insert(gid, agg.merge(cur, part));
        }
        start = end;
    }
    debug!(target: "corrmatrix::exec", "{}: rows={} skipped={} batch_rows={}", agg.name(), height, skipped, step);
    Ok(totals)
}

/// Finalize every group in `0..group_count`, including groups with no contributing rows.
pub fn finalize_groups<A: MatrixAggregate>(
    coalesced: &DataFrame,
    means: &DataFrame,
    group_count: usize,
    targets: &[String],
    agg: &A,
    batch_rows: usize,
) -> AppResult<Vec<GroupAggregate>> {
    let n = targets.len();
    let mut totals = accumulate_batches(coalesced, targets, agg, batch_rows)?;

    let mean_gids = i64_values(means, GID)?;
    let mean_cols: Vec<Vec<Option<f64>>> = (0..n).map(|i| f64_values(means, &mean_col(i))).collect::<AppResult<_>>()?;
    let mut mean_by_gid: BTreeMap<i64, Vec<Option<f64>>> = BTreeMap::new();
    for (row, gid) in mean_gids.iter().enumerate() {
        if let Some(g) = gid {
            mean_by_gid.insert(*g, mean_cols.iter().map(|c| c[row]).collect());
        }
    }

    let mut out = Vec::with_capacity(group_count);
    for gid in 0..group_count as i64 {
        let state = totals.remove(&gid).unwrap_or_else(|| agg.init(n));
        let fin = agg.finalize(state);
        let matrix = match fin.matrix {
            Some(m) if agg.scale_by_count() && fin.count > 0 => Some(scale_matrix(&m, 1.0 / fin.count as f64)),
            other => other,
        };
        out.push(GroupAggregate {
            gid,
            count: fin.count,
            matrix,
            means: mean_by_gid.remove(&gid).unwrap_or_else(|| vec![None; n]),
        });
    }
    Ok(out)
}

/// Relation form of the aggregates: `[GID, COUNT, MATRIX (row-major list, nullable), MEANS (list)]`.
pub fn aggregates_to_frame(groups: &[GroupAggregate]) -> AppResult<DataFrame> {
    let gids: Vec<i64> = groups.iter().map(|g| g.gid).collect();
    let counts: Vec<i64> = groups.iter().map(|g| g.count as i64).collect();
    let matrices: Vec<Option<Series>> = groups
        .iter()
        .map(|g| g.matrix.as_ref().map(|m| Series::new("".into(), m.as_row_major())))
        .collect();
    let means: Vec<Option<Series>> = groups
        .iter()
        .map(|g| Some(Series::new("".into(), g.means.clone())))
        .collect();
    let list_f64 = DataType::List(Box::new(DataType::Float64));
    let matrix_col = if matrices.iter().all(|m| m.is_none()) {
        Series::full_null(MATRIX.into(), groups.len(), &list_f64)
    } else {
        Series::new(MATRIX.into(), matrices).cast(&list_f64)?
    };
    let means_col = if means.is_empty() {
        Series::full_null(MEANS.into(), 0, &list_f64)
    } else {
        Series::new(MEANS.into(), means).cast(&list_f64)?
    };
    Ok(DataFrame::new(vec![
        Series::new(GID.into(), gids).into(),
        Series::new(COUNT.into(), counts).into(),
        matrix_col.into(),
        means_col.into(),
    ])?)
}

/// Aggregate the coalesced rows of every group with `agg`.
///
/// Covariance-style aggregates (`scale_by_count`) are scaled by `1/count` here; groups
/// without contributing rows keep a NULL matrix.
pub fn aggregate_matrices<A: MatrixAggregate>(
    coalesced: &DataFrame,
    means: &DataFrame,
    group_count: usize,
    targets: &[String],
    agg: &A,
    batch_rows: usize,
) -> AppResult<DataFrame> {
    let __t0 = std::time::Instant::now();
    let groups = finalize_groups(coalesced, means, group_count, targets, agg, batch_rows)?;
    let df = aggregates_to_frame(&groups)?;
    tprintln!("[AGGREGATE] {}: groups={} took={:?}", agg.name(), df.height(), __t0.elapsed());
    Ok(df)
}
