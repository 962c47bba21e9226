//! End-to-end tests of the panel pipeline.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use macropanel::data::{CsvDirectorySource, MemorySource};
use macropanel::output::{PanelFormat, RunSummary, read_panel};
use macropanel::panel::frame::{column_names, float_values};
use macropanel::panel::{
    DateRange, Derivation, PanelConfig, PanelError, SeriesDescriptor, SeriesRole,
};
use macropanel::{EVENTS_FILE, Pipeline, PipelineError, SUMMARY_FILE, Settings};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use std::time::Instant;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn values(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
    float_values(df, "test", column).unwrap()
}

/// Two-series panel: S&P 500 as base, fed funds joined.
fn small_settings() -> Settings {
    let mut settings = Settings::default();
    settings.panel = PanelConfig {
        base_series: "sp500".to_string(),
        series: vec![
            SeriesDescriptor::yahoo("sp500", "^GSPC").with_role(SeriesRole::Base),
            SeriesDescriptor::fred("ff_rate", "DFF"),
        ],
        join_order: vec!["ff_rate".to_string()],
        date_range: DateRange::new(d(2021, 1, 1), d(2021, 12, 31)).unwrap(),
        derivations: vec![
            Derivation::log("sp500", "log_sp500"),
            Derivation::diff("log_sp500", "ret_sp500"),
            Derivation::diff("ff_rate", "delta_ff"),
            Derivation::diff("vix", "delta_vix"),
        ],
    };
    settings
}

#[test]
fn test_returns_and_differences() {
    let source = MemorySource::new()
        .with(
            "sp500",
            df!("date" => &["2021-01-29", "2021-02-26"], "sp500" => &[100.0, 110.0]).unwrap(),
        )
        .with(
            "ff_rate",
            df!("date" => &["2021-01-04", "2021-02-01"], "ff_rate" => &[0.09, 0.09]).unwrap(),
        );

    let built = Pipeline::new(small_settings()).build(&source).unwrap();

    assert_eq!(built.panel.height(), 2);
    assert_eq!(built.dates().unwrap(), vec![d(2021, 1, 31), d(2021, 2, 28)]);
    let ret = values(&built.panel, "ret_sp500");
    assert_eq!(ret[0], None);
    assert_relative_eq!(ret[1].unwrap(), 1.1f64.ln(), epsilon = 1e-12);
    assert_eq!(values(&built.panel, "delta_ff"), vec![None, Some(0.0)]);

    assert_eq!(built.applied, vec!["log_sp500", "ret_sp500", "delta_ff"]);
    assert_eq!(built.skipped_derivations.len(), 1);
    assert_eq!(built.skipped_derivations[0].output, "delta_vix");
    assert_eq!(built.missing.get("ret_sp500").unwrap().missing, 1);
}

#[test]
fn test_missing_base_series_is_fatal() {
    let source = MemorySource::new().with(
        "ff_rate",
        df!("date" => &["2021-01-04"], "ff_rate" => &[0.09]).unwrap(),
    );
    let result = Pipeline::new(small_settings()).build(&source);
    assert!(matches!(
        result,
        Err(PipelineError::Panel(PanelError::MissingBaseSeries(ref key))) if key == "sp500"
    ));
}

#[test]
fn test_absent_optional_series_narrows_panel() {
    let source = MemorySource::new().with(
        "sp500",
        df!("date" => &["2021-01-29", "2021-02-26"], "sp500" => &[100.0, 110.0]).unwrap(),
    );
    let built = Pipeline::new(small_settings()).build(&source).unwrap();

    assert_eq!(built.panel.height(), 2);
    assert!(!column_names(&built.panel).contains(&"ff_rate".to_string()));
    assert_eq!(built.merge.skipped.len(), 1);
    assert_eq!(built.merge.skipped[0].key, "ff_rate");
    assert_eq!(built.load.absent.len(), 1);
}

#[test]
fn test_trim_keeps_difference_against_prior_month() {
    let source = MemorySource::new().with(
        "sp500",
        df!(
            "date" => &["2020-12-31", "2021-01-29", "2021-02-26"],
            "sp500" => &[100.0, 110.0, 121.0],
        )
        .unwrap(),
    );
    let built = Pipeline::new(small_settings()).build(&source).unwrap();

    assert_eq!(built.dates().unwrap(), vec![d(2021, 1, 31), d(2021, 2, 28)]);
    let ret = values(&built.panel, "ret_sp500");
    assert_relative_eq!(ret[0].unwrap(), 1.1f64.ln(), epsilon = 1e-12);
    assert_relative_eq!(ret[1].unwrap(), 1.1f64.ln(), epsilon = 1e-12);
}

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

#[test]
fn test_csv_directory_run_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.paths.raw_dir = dir.path().join("raw");
    settings.paths.external_dir = dir.path().join("external");
    settings.paths.processed_dir = dir.path().join("processed");

    write(
        &settings.paths.raw_dir.join("yahoo_sp500.csv"),
        "date,sp500\n2020-01-02,3257.85\n2020-01-31,3225.52\n2020-02-28,2954.22\n2020-03-31,2584.59\n2020-04-30,2912.43\n",
    );
    write(
        &settings.paths.raw_dir.join("fred_ff_rate.csv"),
        "date,ff_rate\n2020-01-01,1.55\n2020-02-03,1.58\n2020-03-02,1.09\n2020-04-01,0.05\n",
    );
    write(
        &settings.paths.raw_dir.join("fred_gdp_nominal.csv"),
        "date,gdp\n2020-01-01,21481.4\n2020-04-01,19477.4\n",
    );
    write(
        &settings.paths.external_dir.join("shiller_cape.csv"),
        "Date,P,CAPE\n2020-01-01,3278.20,30.99\n2020-02-01,3277.31,30.90\n2020-03-01,2652.39,24.82\n",
    );

    let source = CsvDirectorySource::new(&settings.paths.raw_dir, &settings.paths.external_dir);
    let pipeline = Pipeline::new(settings.clone());
    let built = pipeline.build(&source).unwrap();

    assert_eq!(built.panel.height(), 4);
    let columns = column_names(&built.panel);
    for expected in [
        "sp500",
        "ff_rate",
        "gdp_nominal",
        "shiller_price",
        "cape",
        "ret_sp500",
        "delta_ff",
    ] {
        assert!(columns.contains(&expected.to_string()), "missing {expected}");
    }
    // Quarterly GDP is interpolated between January and April
    let gdp = values(&built.panel, "gdp_nominal");
    assert_relative_eq!(gdp[1].unwrap(), 21481.4 + (19477.4 - 21481.4) / 3.0, epsilon = 1e-9);
    assert_eq!(values(&built.panel, "cape")[3], None);

    let summary = pipeline.persist(&built, Instant::now()).unwrap();
    assert_eq!(summary.observations, 4);
    assert_eq!(summary.artifacts.len(), 4);

    let processed = &settings.paths.processed_dir;
    let csv = read_panel(&processed.join("monthly_data.csv"), PanelFormat::Csv).unwrap();
    let parquet =
        read_panel(&processed.join("monthly_data.parquet"), PanelFormat::Parquet).unwrap();
    assert_eq!(csv.height(), 4);
    assert!(parquet.equals_missing(&built.panel));

    let events = fs::read_to_string(processed.join(EVENTS_FILE)).unwrap();
    assert!(events.starts_with("name,date,month,category,color,headline,in_panel"));
    assert!(events.contains("COVID_QE_unlimited,2020-03-15,2020-03-31"));

    let json = fs::read_to_string(processed.join(SUMMARY_FILE)).unwrap();
    let back: RunSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(back.observations, 4);
    assert_eq!(back.period(), "2020-01 to 2020-04");
}

#[test]
fn test_text_and_binary_panels_hold_the_same_cells() {
    let dir = tempfile::tempdir().unwrap();
    let source = MemorySource::new()
        .with(
            "sp500",
            df!(
                "date" => &["2021-01-29", "2021-02-26", "2021-03-31"],
                "sp500" => &[100.0, 110.0, 105.0],
            )
            .unwrap(),
        )
        .with(
            "shiller",
            df!(
                "Date" => &["2021-01-01", "2021-02-01", "2021-03-01"],
                "E" => &[95.0, 96.0, 97.0],
                "P/E10" => &[33.1, 34.2, 33.8],
                "Year" => &[2021i64, 2021, 2021],
                "Note" => &["a", "b", "c"],
            )
            .unwrap(),
        );

    let built = Pipeline::new(Settings::default()).build(&source).unwrap();
    assert!(column_names(&built.panel).contains(&"Year".to_string()));
    assert!(!column_names(&built.panel).contains(&"Note".to_string()));

    let csv_path = dir.path().join("panel.csv");
    let parquet_path = dir.path().join("panel.parquet");
    macropanel::output::write_panel(&built.panel, &csv_path, PanelFormat::Csv).unwrap();
    macropanel::output::write_panel(&built.panel, &parquet_path, PanelFormat::Parquet).unwrap();

    let csv = read_panel(&csv_path, PanelFormat::Csv).unwrap();
    let parquet = read_panel(&parquet_path, PanelFormat::Parquet).unwrap();
    assert!(csv.equals_missing(&parquet));
    assert_eq!(values(&csv, "Year"), vec![Some(2021.0); 3]);
    assert_eq!(values(&csv, "cape"), vec![Some(33.1), Some(34.2), Some(33.8)]);
}
