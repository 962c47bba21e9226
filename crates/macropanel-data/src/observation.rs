//! Dated observations returned by the download clients.

use crate::error::Result;
use chrono::NaiveDate;
use macropanel_core::calendar;
use macropanel_core::frame::float_column;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// One dated value; `None` marks a missing observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observation date
    pub date: NaiveDate,
    /// Observed value
    pub value: Option<f64>,
}

impl Observation {
    /// Create an observation.
    pub const fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self { date, value }
    }
}

/// Build a `{date_column, value_column}` table.
pub fn observations_frame(
    date_column: &str,
    value_column: &str,
    observations: &[Observation],
) -> Result<DataFrame> {
    let dates: Vec<NaiveDate> = observations.iter().map(|o| o.date).collect();
    let values: Vec<Option<f64>> = observations.iter().map(|o| o.value).collect();
    Ok(DataFrame::new(vec![
        calendar::date_column(date_column, &dates)?,
        float_column(value_column, values),
    ])?)
}
