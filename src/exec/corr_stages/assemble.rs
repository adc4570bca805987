//! Result assembly
//! Pairs ordinal positions with target names and builds the output and summary relations.

use polars::prelude::*;

use crate::error::AppResult;
use crate::tprintln;
use super::aggregate::{COUNT, MEANS};
use super::center::GID;
use super::deconstruct::{value_col, POSITION};

pub const VARIABLE: &str = "variable";

/// Identifying fields carried into every summary row.
#[derive(Debug, Clone, Copy)]
pub struct SummaryMeta<'a> {
    pub method: &'a str,
    pub source: &'a str,
    pub output_table: &'a str,
    pub targets: &'a [String],
    pub grouping: &'a [String],
}

fn position_names(targets: &[String]) -> AppResult<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(POSITION.into(), (1..=targets.len() as i32).collect::<Vec<i32>>()).into(),
        Series::new(VARIABLE.into(), targets.to_vec()).into(),
    ])?)
}

/// Output relation: `[grouping..., column_position, variable, <target>...]`, ordered by group
/// then position.
pub fn assemble_output(deconstructed: &DataFrame, groups: &DataFrame, targets: &[String], grouping: &[String]) -> AppResult<DataFrame> {
    let __t0 = std::time::Instant::now();
    let mut select: Vec<Expr> = grouping.iter().map(|g| col(g.as_str())).collect();
    select.push(col(POSITION));
    select.push(col(VARIABLE));
    for (j, t) in targets.iter().enumerate() {
        select.push(col(value_col(j)).alias(t.as_str()));
    }
    let out = deconstructed
        .clone()
        .lazy()
        .join(groups.clone().lazy(), [col(GID)], [col(GID)], JoinArgs::new(JoinType::Left))
        .join(position_names(targets)?.lazy(), [col(POSITION)], [col(POSITION)], JoinArgs::new(JoinType::Inner))
        .sort_by_exprs([col(GID), col(POSITION)], SortMultipleOptions::default())
        .select(select)
        .collect()?;
    tprintln!("[ASSEMBLE] output rows={} cols={} took={:?}", out.height(), out.width(), __t0.elapsed());
    Ok(out)
}

/// Summary relation, one row per group: `[method, source, output_table, column_names,
/// grouping..., mean_vector, total_rows_processed]`.
pub fn assemble_summary(aggregated: &DataFrame, groups: &DataFrame, meta: SummaryMeta<'_>) -> AppResult<DataFrame> {
    let joined = aggregated
        .clone()
        .lazy()
        .join(groups.clone().lazy(), [col(GID)], [col(GID)], JoinArgs::new(JoinType::Left))
        .sort_by_exprs([col(GID)], SortMultipleOptions::default())
        .collect()?;
    let h = joined.height();
    let names_col = if h == 0 {
        Series::full_null("column_names".into(), 0, &DataType::List(Box::new(DataType::String)))
    } else {
        let cells: Vec<Option<Series>> = (0..h).map(|_| Some(Series::new("".into(), meta.targets.to_vec()))).collect();
        Series::new("column_names".into(), cells)
    };
    let mut cols: Vec<Column> = vec![
        Series::new("method".into(), vec![meta.method; h]).into(),
        Series::new("source".into(), vec![meta.source; h]).into(),
        Series::new("output_table".into(), vec![meta.output_table; h]).into(),
        names_col.into(),
    ];
    for g in meta.grouping {
        cols.push(joined.column(g)?.clone());
    }
    cols.push(joined.column(MEANS)?.clone().with_name("mean_vector".into()));
    cols.push(joined.column(COUNT)?.cast(&DataType::Int64)?.with_name("total_rows_processed".into()));
    Ok(DataFrame::new(cols)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::corr_stages::aggregate::{aggregates_to_frame, GroupAggregate};
    use crate::exec::corr_stages::deconstruct::deconstruct_all;
    use crate::exec::df_utils::{dataframe_to_json, f64_values};
    use crate::exec::primitives::SymMatrix;

    fn fixture() -> (DataFrame, DataFrame) {
        let m0 = SymMatrix::from_row_major(2, vec![1.0, 0.25, 0.25, 1.0]).unwrap();
        let m1 = SymMatrix::from_row_major(2, vec![1.0, -1.0, -1.0, 1.0]).unwrap();
        let agg = aggregates_to_frame(&[
            GroupAggregate { gid: 0, count: 4, matrix: Some(m0), means: vec![Some(1.5), Some(2.5)] },
            GroupAggregate { gid: 1, count: 2, matrix: Some(m1), means: vec![Some(7.0), Some(8.0)] },
        ])
        .unwrap();
        let groups = df!(GID => &[0i64, 1], "site" => &["north", "south"]).unwrap();
        (agg, groups)
    }

    #[test]
    fn output_has_named_columns_in_order() {
        let (agg, groups) = fixture();
        let targets = vec!["a".to_string(), "b".to_string()];
        let grouping = vec!["site".to_string()];
        let out = assemble_output(&deconstruct_all(&agg, 2).unwrap(), &groups, &targets, &grouping).unwrap();
        let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["site", "column_position", "variable", "a", "b"]);
        assert_eq!(out.height(), 4);
        let json = dataframe_to_json(&out);
        assert_eq!(json[1]["site"], "north");
        assert_eq!(json[1]["variable"], "b");
        assert_eq!(json[1]["a"], 0.25);
        assert!(json[0]["b"].is_null());
        assert_eq!(json[3]["site"], "south");
        assert_eq!(f64_values(&out, "a").unwrap()[3], Some(-1.0));
    }

    #[test]
    fn summary_row_per_group() {
        let (agg, groups) = fixture();
        let targets = vec!["a".to_string(), "b".to_string()];
        let grouping = vec!["site".to_string()];
        let meta = SummaryMeta { method: "Correlation", source: "weather", output_table: "weather_corr", targets: &targets, grouping: &grouping };
        let s = assemble_summary(&agg, &groups, meta).unwrap();
        let names: Vec<String> = s.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["method", "source", "output_table", "column_names", "site", "mean_vector", "total_rows_processed"]);
        let json = dataframe_to_json(&s);
        assert_eq!(json[0]["method"], "Correlation");
        assert_eq!(json[0]["column_names"], serde_json::json!(["a", "b"]));
        assert_eq!(json[1]["mean_vector"], serde_json::json!([7.0, 8.0]));
        assert_eq!(json[1]["total_rows_processed"], 2);
    }
}
