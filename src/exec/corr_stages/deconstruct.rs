//! Lower-triangle deconstruction
//! Enumerates the groups present in the materialised aggregate, then unpacks each group's
//! matrix with one typed call.

use std::collections::BTreeSet;

use polars::prelude::*;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::exec::df_utils::i64_values;
use crate::exec::primitives::{unpack_lower_triangle, SymMatrix};
use crate::tprintln;
use super::aggregate::MATRIX;
use super::center::GID;

pub const POSITION: &str = "column_position";

pub fn value_col(j: usize) -> String { format!("__corr_value_{}", j) }

/// Distinct group ids of the aggregate relation, ascending.
pub fn enumerate_groups(aggregated: &DataFrame) -> AppResult<Vec<i64>> {
    let set: BTreeSet<i64> = i64_values(aggregated, GID)?.into_iter().flatten().collect();
    Ok(set.into_iter().collect())
}

/// Stored matrix of one aggregate row, or `None` for a NULL matrix.
fn matrix_at(row: &DataFrame, n: usize) -> AppResult<Option<SymMatrix>> {
    match row.column(MATRIX)?.get(0)? {
        AnyValue::Null => Ok(None),
        AnyValue::List(s) => {
            let s = s.cast(&DataType::Float64)?;
            let data: Vec<f64> = s.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
            Ok(Some(SymMatrix::from_row_major(n, data)?))
        }
        other => Err(AppError::internal("matrix_type".to_string(), format!("unexpected matrix cell {:?}", other))),
    }
}

/// Unpack the matrix of group `gid` into `n` rows `[GID, column_position, value_0..value_{n-1}]`.
pub fn deconstruct_group(aggregated: &DataFrame, gid: i64, n: usize) -> AppResult<DataFrame> {
    let row = aggregated
        .clone()
        .lazy()
        .filter(col(GID).eq(lit(gid)))
        .collect()?;
    if row.height() != 1 {
        return Err(AppError::internal("group_rows".to_string(), format!("expected one aggregate row for group {}, found {}", gid, row.height())));
    }
    let matrix = matrix_at(&row, n)?;
    let rows = unpack_lower_triangle(matrix.as_ref(), n)?;

    let mut cols: Vec<Column> = Vec::with_capacity(n + 2);
    cols.push(Series::new(GID.into(), vec![gid; n]).into());
    cols.push(Series::new(POSITION.into(), (1..=n as i32).collect::<Vec<i32>>()).into());
    for j in 0..n {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r[j]).collect();
        cols.push(Series::new(value_col(j).into(), values).into());
    }
    Ok(DataFrame::new(cols)?)
}

/// Fan out over every group of the aggregate and union the unpacked rows.
pub fn deconstruct_all(aggregated: &DataFrame, n: usize) -> AppResult<DataFrame> {
    let __t0 = std::time::Instant::now();
    let gids = enumerate_groups(aggregated)?;
    debug!(target: "corrmatrix::exec", "deconstruct: groups={} n={}", gids.len(), n);
    let mut out: Option<DataFrame> = None;
    for gid in gids {
        let part = deconstruct_group(aggregated, gid, n)?;
        match out.as_mut() {
            Some(acc) => { acc.vstack_mut(&part)?; }
            None => out = Some(part),
        }
    }
    let out = match out {
        Some(df) => df,
        None => deconstruct_empty(n)?,
    };
    tprintln!("[DECONSTRUCT] rows={} took={:?}", out.height(), __t0.elapsed());
    Ok(out)
}

fn deconstruct_empty(n: usize) -> AppResult<DataFrame> {
    let mut cols: Vec<Column> = vec![
        Series::new(GID.into(), Vec::<i64>::new()).into(),
        Series::new(POSITION.into(), Vec::<i32>::new()).into(),
    ];
    for j in 0..n {
        cols.push(Series::new(value_col(j).into(), Vec::<Option<f64>>::new()).into());
    }
    Ok(DataFrame::new(cols)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::corr_stages::aggregate::{aggregates_to_frame, GroupAggregate};
    use crate::exec::df_utils::f64_values;

    fn frame() -> DataFrame {
        let m = SymMatrix::from_row_major(2, vec![1.0, -0.5, -0.5, 1.0]).unwrap();
        aggregates_to_frame(&[
            GroupAggregate { gid: 0, count: 3, matrix: Some(m), means: vec![Some(1.0), Some(2.0)] },
            GroupAggregate { gid: 1, count: 1, matrix: None, means: vec![Some(4.0), None] },
        ])
        .unwrap()
    }

    #[test]
    fn one_group_unpacks_lower_triangle() {
        let df = deconstruct_group(&frame(), 0, 2).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(f64_values(&df, &value_col(0)).unwrap(), vec![Some(1.0), Some(-0.5)]);
        assert_eq!(f64_values(&df, &value_col(1)).unwrap(), vec![None, Some(1.0)]);
        let pos: Vec<Option<i32>> = df.column(POSITION).unwrap().i32().unwrap().into_iter().collect();
        assert_eq!(pos, vec![Some(1), Some(2)]);
    }

    #[test]
    fn null_matrix_unpacks_to_null_rows() {
        let df = deconstruct_group(&frame(), 1, 2).unwrap();
        assert_eq!(df.column(&value_col(0)).unwrap().null_count(), 2);
        assert_eq!(df.column(&value_col(1)).unwrap().null_count(), 2);
    }

    #[test]
    fn fan_out_unions_every_group() {
        let agg = frame();
        assert_eq!(enumerate_groups(&agg).unwrap(), vec![0, 1]);
        let all = deconstruct_all(&agg, 2).unwrap();
        assert_eq!(all.height(), 4);
        assert_eq!(i64_values(&all, GID).unwrap(), vec![Some(0), Some(0), Some(1), Some(1)]);
        assert!(deconstruct_group(&agg, 7, 2).is_err());
    }
}
