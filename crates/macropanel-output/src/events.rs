//! Dated monetary-policy events for chart annotation.
//!
//! Charts of the panel mark these dates with vertical lines coloured by the
//! kind of event. Only headline events carry a text label.

use crate::export::{ExportError, ExportFormat, Exporter, csv_string, json_string};
use chrono::NaiveDate;
use macropanel_core::calendar::month_end;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of policy event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Asset purchases and balance-sheet expansion
    BalanceSheetExpansion,
    /// Announced or actual tapering
    Tightening,
    /// Exogenous crisis
    Crisis,
    /// Policy-rate decision
    RatePolicy,
    /// Bank failure
    BankingStress,
    /// Anything else
    Other,
}

impl EventCategory {
    /// Classify an event by its name.
    ///
    /// Checked in order, so `COVID_QE_unlimited` counts as an expansion.
    pub fn classify(name: &str) -> Self {
        if name.contains("QE") || name.contains("Operation") {
            Self::BalanceSheetExpansion
        } else if name.contains("Taper") {
            Self::Tightening
        } else if name.contains("COVID") {
            Self::Crisis
        } else if name.contains("rate") || name.contains("Rate") {
            Self::RatePolicy
        } else if name.contains("SVB") {
            Self::BankingStress
        } else {
            Self::Other
        }
    }

    /// Hex colour used for this category.
    pub const fn color(&self) -> &'static str {
        match self {
            Self::BalanceSheetExpansion => "#2ca02c",
            Self::Tightening => "#d62728",
            Self::Crisis => "#ff7f0e",
            Self::RatePolicy => "#9467bd",
            Self::BankingStress => "#8c564b",
            Self::Other => "#7f7f7f",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BalanceSheetExpansion => "balance sheet expansion",
            Self::Tightening => "tightening",
            Self::Crisis => "crisis",
            Self::RatePolicy => "rate policy",
            Self::BankingStress => "banking stress",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A dated policy event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEvent {
    /// Event name, e.g. `QE1_announcement`
    pub name: String,
    /// Announcement date
    pub date: NaiveDate,
    /// Whether charts label this event
    #[serde(default)]
    pub headline: bool,
}

impl PolicyEvent {
    /// Create an event.
    pub fn new(name: &str, date: NaiveDate, headline: bool) -> Self {
        Self {
            name: name.to_string(),
            date,
            headline,
        }
    }

    /// Category derived from the name.
    pub fn category(&self) -> EventCategory {
        EventCategory::classify(&self.name)
    }
}

/// Fed policy events from the 2008 crisis to the 2023 bank failures.
pub fn default_events() -> Vec<PolicyEvent> {
    [
        ("QE1_announcement", 2008, 11, 25, true),
        ("QE2_announcement", 2010, 11, 3, false),
        ("Operation_Twist", 2011, 9, 21, false),
        ("QE3_announcement", 2012, 9, 13, true),
        ("Taper_tantrum", 2013, 5, 22, true),
        ("Taper_begins", 2013, 12, 18, false),
        ("COVID_crisis", 2020, 3, 11, false),
        ("COVID_QE_unlimited", 2020, 3, 15, true),
        ("First_rate_hike", 2022, 3, 16, true),
        ("SVB_collapse", 2023, 3, 10, false),
    ]
    .into_iter()
    .filter_map(|(name, y, m, d, headline)| {
        NaiveDate::from_ymd_opt(y, m, d).map(|date| PolicyEvent::new(name, date, headline))
    })
    .collect()
}

/// An event placed on the panel's monthly grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAnnotation {
    /// Event name
    pub name: String,
    /// Announcement date
    pub date: NaiveDate,
    /// Panel month the event falls in
    pub month: NaiveDate,
    /// Event kind
    pub category: EventCategory,
    /// Line colour
    pub color: String,
    /// Whether charts label this event
    pub headline: bool,
    /// Whether the panel has a row for `month`
    pub in_panel: bool,
}

/// Map events onto panel months, in date order.
pub fn annotate(panel_dates: &[NaiveDate], events: &[PolicyEvent]) -> Vec<EventAnnotation> {
    let months: BTreeSet<NaiveDate> = panel_dates.iter().copied().map(month_end).collect();
    let mut out: Vec<EventAnnotation> = events
        .iter()
        .map(|e| {
            let month = month_end(e.date);
            let category = e.category();
            EventAnnotation {
                name: e.name.clone(),
                date: e.date,
                month,
                category,
                color: category.color().to_string(),
                headline: e.headline,
                in_panel: months.contains(&month),
            }
        })
        .collect();
    out.sort_by_key(|a| a.date);
    out
}

impl Exporter for Vec<EventAnnotation> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_string(self),
            ExportFormat::Json | ExportFormat::PrettyJson => json_string(self, format),
        }
    }
}
