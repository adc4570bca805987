use polars::prelude::*;
use serde_json::json;

use super::fixtures::*;
use crate::exec::df_utils::dataframe_to_json;
use crate::exec::{compute_association, read_matrices, AssociationRequest, Method};

#[test]
fn grouped_output_is_union_of_single_group_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let store = new_store(&tmp);
    seed_weather(&store, "weather");
    let req = AssociationRequest::new("weather", "by_outlook", Method::Correlation)
        .with_targets("temperature, humidity, wind_speed")
        .with_grouping("outlook");
    let res = compute_association(&store, &req).unwrap();
    assert_eq!(res.group_count, 3);

    let out = store.read_df("by_outlook").unwrap();
    assert_eq!(out.height(), 9);
    let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
    assert_eq!(names, vec!["outlook", "column_position", "variable", "temperature", "humidity", "wind_speed"]);

    let grouped = read_matrices(&store, "by_outlook").unwrap();
    let keys: Vec<serde_json::Value> = grouped.iter().map(|g| g.key[0].clone()).collect();
    // first appearance in the source
    assert_eq!(keys, vec![json!("sunny"), json!("overcast"), json!("rainy")]);

    for g in &grouped {
        let outlook = g.key[0].as_str().unwrap().to_string();
        let part = weather_df()
            .lazy()
            .filter(col("outlook").eq(lit(outlook.clone())))
            .collect()
            .unwrap();
        let src = format!("weather_{}", outlook);
        let dst = format!("single_{}", outlook);
        seed(&store, &src, part);
        let single_req = AssociationRequest::new(src.as_str(), dst.as_str(), Method::Correlation).with_targets("temperature, humidity, wind_speed");
        compute_association(&store, &single_req).unwrap();
        let single = read_matrices(&store, &dst).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].variables, g.variables);
        for i in 0..3 {
            for j in 0..3 {
                assert!(approx(single[0].matrix.get(i, j), g.matrix.get(i, j)), "{} ({}, {})", outlook, i, j);
            }
        }
    }
    let sunny = &grouped[0].matrix;
    assert!((sunny.get(1, 0) - 0.3506485841383124).abs() < 1e-9);
}

#[test]
fn summary_has_one_row_per_group() {
    let tmp = tempfile::tempdir().unwrap();
    let store = new_store(&tmp);
    seed_weather(&store, "weather");
    let req = AssociationRequest::new("weather", "cov_outlook", Method::Covariance)
        .with_targets("temperature,humidity")
        .with_grouping("outlook");
    compute_association(&store, &req).unwrap();

    let summary = store.read_df("cov_outlook_summary").unwrap();
    let names: Vec<String> = summary.get_column_names().iter().map(|s| s.to_string()).collect();
    assert_eq!(names, vec!["method", "source", "output_table", "column_names", "outlook", "mean_vector", "total_rows_processed"]);
    let rows = dataframe_to_json(&summary);
    assert_eq!(rows.as_array().unwrap().len(), 3);
    assert_eq!(rows[0]["method"], "Covariance");
    assert_eq!(rows[0]["source"], "weather");
    assert_eq!(rows[0]["output_table"], "cov_outlook");
    assert_eq!(rows[0]["column_names"], json!(["temperature", "humidity"]));
    assert_eq!(rows[0]["outlook"], "sunny");
    assert_eq!(rows[1]["outlook"], "overcast");
    assert_eq!(rows[2]["outlook"], "rainy");
    let counts: Vec<i64> = (0..3).map(|i| rows[i]["total_rows_processed"].as_i64().unwrap()).collect();
    assert_eq!(counts, vec![5, 4, 5]);
    let means: Vec<f64> = rows[2]["mean_vector"].as_array().unwrap().iter().map(|v| v.as_f64().unwrap()).collect();
    assert!(approx(means[0], 69.8));
    assert!(approx(means[1], 83.4));

    let mats = read_matrices(&store, "cov_outlook").unwrap();
    assert!(approx(mats[1].matrix.get(1, 0), 38.25));
}

#[test]
fn null_group_keys_form_their_own_group() {
    let tmp = tempfile::tempdir().unwrap();
    let store = new_store(&tmp);
    let df = df!(
        "site" => &[Some("a"), None, Some("a"), None, Some("a"), None],
        "x" => &[1.0f64, 2.0, 2.0, 4.0, 3.0, 7.0],
        "y" => &[3.0f64, 1.0, 2.0, 5.0, 1.0, 6.0],
    )
    .unwrap();
    seed(&store, "sites", df);
    let res = compute_association(&store, &AssociationRequest::new("sites", "sites_corr", Method::Correlation).with_grouping("site")).unwrap();
    assert_eq!(res.group_count, 2);
    let mats = read_matrices(&store, "sites_corr").unwrap();
    assert_eq!(mats.len(), 2);
    assert_eq!(mats[0].key, vec![json!("a")]);
    assert_eq!(mats[1].key, vec![serde_json::Value::Null]);
    assert!(approx(mats[0].matrix.get(1, 0), pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0])));
    assert!(approx(mats[1].matrix.get(1, 0), pearson(&[2.0, 4.0, 7.0], &[1.0, 5.0, 6.0])));
}

#[test]
fn degenerate_groups_store_nulls() {
    let tmp = tempfile::tempdir().unwrap();
    let store = new_store(&tmp);
    let df = df!(
        "g" => &["solo", "flat", "flat", "flat"],
        "x" => &[1.0f64, 1.0, 2.0, 3.0],
        "y" => &[5.0f64, 4.0, 4.0, 4.0],
    )
    .unwrap();
    seed(&store, "degenerate", df);
    compute_association(&store, &AssociationRequest::new("degenerate", "degenerate_corr", Method::Correlation).with_grouping("g")).unwrap();
    let out = store.read_df("degenerate_corr").unwrap();
    assert_eq!(out.height(), 4);
    let x = column_f64(&out, "x");
    let y = column_f64(&out, "y");
    // single-row group: no matrix at all
    assert_eq!((x[0], x[1], y[0], y[1]), (None, None, None, None));
    // y has zero variance within "flat"
    assert_eq!(x[2], Some(1.0));
    assert_eq!(x[3], None);
    assert_eq!(y[3], None);

    let summary = store.read_df("degenerate_corr_summary").unwrap();
    let counts = column_f64(&summary, "total_rows_processed");
    assert_eq!(counts, vec![Some(1.0), Some(3.0)]);
}
