//! Integration tests for panel persistence, run summaries and event exports.

use chrono::NaiveDate;
use macropanel_core::frame::float_column;
use macropanel_core::{PANEL_DATE_COLUMN, calendar};
use macropanel_output::{
    ExportFormat, Exporter, PanelFormat, RunSummary, annotate, default_events, read_panel,
    write_panel,
};
use polars::prelude::*;

fn panel() -> DataFrame {
    let days: Vec<NaiveDate> = (1..=12)
        .map(|m| calendar::month_end(NaiveDate::from_ymd_opt(2020, m, 1).unwrap()))
        .collect();
    let vix: Vec<Option<f64>> = (0..12).map(|i| (i != 3).then(|| 20.0 + i as f64)).collect();
    DataFrame::new(vec![
        calendar::date_column(PANEL_DATE_COLUMN, &days).unwrap(),
        float_column("vix", vix),
    ])
    .unwrap()
}

#[test]
fn test_full_output_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let panel = panel();

    let mut summary = RunSummary::from_panel(&panel).unwrap();
    for format in PanelFormat::all() {
        let path = dir.path().join(format!("monthly_data.{}", format.extension()));
        write_panel(&panel, &path, format).unwrap();
        assert!(read_panel(&path, format).unwrap().equals_missing(&panel));
        summary = summary.with_artifact(&path);
    }

    let json_path = dir.path().join("run_summary.json");
    summary.export_to_file(&json_path, ExportFormat::PrettyJson).unwrap();
    let back: RunSummary =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(back.artifacts.len(), 2);
    assert_eq!(back.missing.get("vix").unwrap().missing, 1);
    assert_eq!(back.period(), "2020-01 to 2020-12");
}

#[test]
fn test_events_against_panel_months() {
    let days = calendar::dates(&panel(), "panel", PANEL_DATE_COLUMN)
        .unwrap()
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
    let annotations = annotate(&days, &default_events());

    let inside: Vec<&str> = annotations
        .iter()
        .filter(|a| a.in_panel)
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(inside, vec!["COVID_crisis", "COVID_QE_unlimited"]);

    let csv = annotations.export_to_string(ExportFormat::Csv).unwrap();
    assert_eq!(csv.lines().count(), 11);
}
