use polars::prelude::*;

use super::fixtures::*;
use crate::exec::{compute_association, read_matrices, AssociationRequest, Method};

#[test]
fn quoted_and_qualified_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let store = new_store(&tmp);
    seed_weather(&store, "weather");
    let res = compute_association(&store, &AssociationRequest::new("weather", "\"WeatherCorr\"", Method::Correlation)).unwrap();
    assert_eq!(res.summary_table, "\"WeatherCorr_summary\"");
    assert!(store.table_exists("\"WeatherCorr\""));
    assert!(store.table_exists("\"WeatherCorr_summary\""));
    assert!(!store.table_exists("weathercorr"));

    let res = compute_association(&store, &AssociationRequest::new("public.weather", "analytics.weather_corr", Method::Correlation)).unwrap();
    assert_eq!(res.summary_table, "analytics.weather_corr_summary");
    assert!(store.table_exists("analytics.weather_corr_summary"));
    assert_eq!(read_matrices(&store, "analytics.weather_corr").unwrap()[0].variables, vec!["temperature", "humidity", "wind_speed"]);
}

#[test]
fn read_back_rejects_other_relations() {
    let tmp = tempfile::tempdir().unwrap();
    let store = new_store(&tmp);
    seed_weather(&store, "weather");
    assert!(read_matrices(&store, "weather").unwrap_err().is_schema());
    assert!(read_matrices(&store, "missing").unwrap_err().is_schema());
}

#[test]
fn read_back_splits_groups_by_key_blocks() {
    let tmp = tempfile::tempdir().unwrap();
    let store = new_store(&tmp);
    let rows = df!(
        "zone" => &[Some(1i32), Some(1), None, None],
        "column_position" => &[1i32, 2, 1, 2],
        "variable" => &["a", "b", "a", "b"],
        "a" => &[Some(1.0f64), Some(0.5), Some(1.0), Some(-0.5)],
        "b" => &[None, Some(1.0), None, Some(1.0)],
    )
    .unwrap();
    seed(&store, "zoned", rows);
    let mats = read_matrices(&store, "zoned").unwrap();
    assert_eq!(mats.len(), 2);
    assert_eq!(mats[0].key, vec![serde_json::json!(1)]);
    assert_eq!(mats[1].key, vec![serde_json::Value::Null]);
    assert_eq!(mats[0].matrix.get(0, 1), 0.5);
    assert_eq!(mats[1].matrix.get(0, 1), -0.5);

    // the same key in two separate blocks is not an association output
    let split = df!(
        "zone" => &[1i32, 2, 1],
        "column_position" => &[1i32, 1, 1],
        "variable" => &["a", "a", "a"],
        "a" => &[1.0f64, 1.0, 1.0],
    )
    .unwrap();
    seed(&store, "split", split);
    assert!(read_matrices(&store, "split").unwrap_err().is_schema());
}

#[test]
fn read_back_mirrors_lower_triangle() {
    let tmp = tempfile::tempdir().unwrap();
    let store = new_store(&tmp);
    seed_weather(&store, "weather");
    compute_association(&store, &AssociationRequest::new("weather", "w", Method::Covariance).with_grouping("windy")).unwrap();
    let out = store.read_df("w").unwrap();
    let mats = read_matrices(&store, "w").unwrap();
    assert_eq!(mats.len(), 2);
    assert_eq!(mats[0].key, vec![serde_json::json!(false)]);
    // row 3 of the first group holds the full last row of its matrix
    let ws = column_f64(&out, "temperature")[2].unwrap();
    assert_eq!(mats[0].matrix.get(2, 0), ws);
    assert_eq!(mats[0].matrix.get(0, 2), ws);
}

#[test]
fn session_defaults_qualify_relation_names() {
    use crate::system::{current_query_defaults, set_current_database, set_current_schema, set_query_defaults};
    let tmp = tempfile::tempdir().unwrap();
    let store = new_store(&tmp);
    let saved = current_query_defaults();
    set_current_database("lab");
    set_current_schema("sensors");
    seed_weather(&store, "weather");
    compute_association(&store, &AssociationRequest::new("weather", "w_lab", Method::Correlation)).unwrap();
    set_query_defaults(saved);
    assert!(!store.table_exists("w_lab"));
    assert!(store.table_exists("lab.sensors.w_lab"));
    assert!(store.table_exists("lab.sensors.w_lab_summary"));
    assert!(tmp.path().join("lab").join("sensors").join("weather").join("data.parquet").exists());
}
