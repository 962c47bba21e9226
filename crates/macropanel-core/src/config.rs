//! Panel configuration.
//!
//! All series identifiers, merge order, date range and derivation rules
//! live in one [`PanelConfig`] handed to the components at construction.
//! `PanelConfig::default()` describes the standard monetary-policy panel.

use crate::error::{PanelError, Result};
use crate::series::{Aggregation, ColumnAlias, SeriesDescriptor, SeriesRole};
use crate::transform::Derivation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Name of the date column in every normalized table and in the panel.
pub const PANEL_DATE_COLUMN: &str = "date";

/// Inclusive date range of the final panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First date kept (inclusive)
    pub start: NaiveDate,
    /// Last date kept (inclusive)
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a validated range.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::InvalidDateRange`] unless `start < end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Parse a range from `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |raw: &str| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|e| PanelError::Config(format!("invalid date '{raw}': {e}")))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Check `start < end`.
    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(PanelError::InvalidDateRange {
                start: self.start.to_string(),
                end: self.end.to_string(),
            });
        }
        Ok(())
    }

    /// Whether `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or(NaiveDate::MAX),
        }
    }
}

/// Full description of the panel to build.
///
/// Fields left out of a configuration file take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Key of the series whose months define the panel rows
    pub base_series: String,
    /// Every series of the panel, base included
    pub series: Vec<SeriesDescriptor>,
    /// Left-join priority of the monthly series
    pub join_order: Vec<String>,
    /// Final inclusive date range
    pub date_range: DateRange,
    /// Derived-column rules, applied in order
    pub derivations: Vec<Derivation>,
}

impl PanelConfig {
    /// Descriptor for `key`.
    pub fn descriptor(&self, key: &str) -> Option<&SeriesDescriptor> {
        self.series.iter().find(|s| s.key == key)
    }

    /// Descriptor of the base series.
    pub fn base_descriptor(&self) -> Result<&SeriesDescriptor> {
        self.descriptor(&self.base_series).ok_or_else(|| {
            PanelError::Config(format!(
                "base series '{}' has no descriptor",
                self.base_series
            ))
        })
    }

    /// Every series except the base, in descriptor order.
    pub fn optional_series(&self) -> Vec<&SeriesDescriptor> {
        self.series
            .iter()
            .filter(|s| s.key != self.base_series)
            .collect()
    }

    /// Series with the given role, in descriptor order.
    pub fn series_with_role(&self, role: SeriesRole) -> impl Iterator<Item = &SeriesDescriptor> {
        self.series.iter().filter(move |s| s.role == role)
    }

    /// Aggregation policy of every series.
    pub fn aggregation_policy_by_key(&self) -> BTreeMap<&str, Aggregation> {
        self.series
            .iter()
            .map(|s| (s.key.as_str(), s.aggregation))
            .collect()
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Fails on an invalid date range, duplicate keys, a base key without a
    /// `base` descriptor, or a join order that does not list exactly the
    /// `monthly` series.
    pub fn validate(&self) -> Result<()> {
        self.date_range.validate()?;

        let mut seen = HashSet::new();
        for s in &self.series {
            if !seen.insert(s.key.as_str()) {
                return Err(PanelError::Config(format!("duplicate series key '{}'", s.key)));
            }
        }

        let base = self.base_descriptor()?;
        if base.role != SeriesRole::Base {
            return Err(PanelError::Config(format!(
                "base series '{}' must have role 'base', found '{}'",
                base.key, base.role
            )));
        }
        if let Some(other) = self
            .series_with_role(SeriesRole::Base)
            .find(|s| s.key != self.base_series)
        {
            return Err(PanelError::Config(format!(
                "series '{}' has role 'base' but the base series is '{}'",
                other.key, self.base_series
            )));
        }

        let mut ordered = HashSet::new();
        for key in &self.join_order {
            let desc = self
                .descriptor(key)
                .ok_or_else(|| PanelError::Config(format!("join order names unknown series '{key}'")))?;
            if desc.role != SeriesRole::Monthly {
                return Err(PanelError::Config(format!(
                    "join order lists '{key}' with role '{}'; only monthly series are joined in order",
                    desc.role
                )));
            }
            if !ordered.insert(key.as_str()) {
                return Err(PanelError::Config(format!("join order lists '{key}' twice")));
            }
        }
        if let Some(missing) = self
            .series_with_role(SeriesRole::Monthly)
            .find(|s| !ordered.contains(s.key.as_str()))
        {
            return Err(PanelError::Config(format!(
                "monthly series '{}' is missing from join order",
                missing.key
            )));
        }

        if let Some(rule) = self.derivations.iter().find(|d| d.output().trim().is_empty()) {
            return Err(PanelError::Config(format!("derivation {rule:?} has an empty output name")));
        }

        Ok(())
    }
}

/// Standard series table: equity index, volatility, Fed balance sheet,
/// policy and Treasury rates, BBB spread, nominal GDP and the Shiller
/// valuation table.
pub fn default_series() -> Vec<SeriesDescriptor> {
    vec![
        SeriesDescriptor::yahoo("sp500", "^GSPC").with_role(SeriesRole::Base),
        SeriesDescriptor::yahoo("vix", "^VIX"),
        SeriesDescriptor::fred("fed_balance", "WALCL"),
        SeriesDescriptor::fred("ff_rate", "DFF"),
        SeriesDescriptor::fred("treasury_2y", "DGS2"),
        SeriesDescriptor::fred("treasury_10y", "DGS10"),
        SeriesDescriptor::fred("spread_bbb", "BAMLC0A4CBBB"),
        SeriesDescriptor::fred("gdp", "GDP")
            .with_role(SeriesRole::Quarterly)
            .with_column("gdp_nominal")
            .with_file("fred_gdp_nominal.csv")
            .with_alias(ColumnAlias::new("gdp_nominal", &["gdp"])),
        SeriesDescriptor::spreadsheet(
            "shiller",
            "http://www.econ.yale.edu/~shiller/data/ie_data.xls",
            "shiller_cape.csv",
        )
        .with_alias(ColumnAlias::new("shiller_price", &["price", "p", "sp_price"]))
        .with_alias(ColumnAlias::new("shiller_dividend", &["dividend", "d"]))
        .with_alias(ColumnAlias::new("earnings", &["e", "shiller_earnings"]))
        .with_alias(ColumnAlias::new("cape", &["cape_ratio", "p/e10", "pe10"])),
    ]
}

/// Standard left-join priority.
pub fn default_join_order() -> Vec<String> {
    [
        "vix",
        "fed_balance",
        "ff_rate",
        "treasury_2y",
        "treasury_10y",
        "spread_bbb",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Standard derivation rules.
pub fn default_derivations() -> Vec<Derivation> {
    vec![
        Derivation::log("sp500", "log_sp500"),
        Derivation::log("fed_balance", "log_balance"),
        Derivation::log("earnings", "log_earnings"),
        Derivation::log("gdp_nominal", "log_gdp"),
        Derivation::diff("log_sp500", "ret_sp500"),
        Derivation::diff("log_balance", "growth_balance"),
        Derivation::diff("log_earnings", "growth_earnings"),
        Derivation::diff("log_gdp", "growth_gdp"),
        Derivation::diff("vix", "delta_vix"),
        Derivation::diff("ff_rate", "delta_ff"),
        Derivation::diff("spread_bbb", "delta_spread"),
        Derivation::spread("treasury_10y", "treasury_2y", "slope_curve"),
        Derivation::diff("slope_curve", "delta_slope"),
    ]
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            base_series: "sp500".to_string(),
            series: default_series(),
            join_order: default_join_order(),
            date_range: DateRange::default(),
            derivations: default_derivations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PanelConfig::default();
        config.validate().unwrap();
        assert_eq!(config.base_descriptor().unwrap().key, "sp500");
        assert_eq!(config.optional_series().len(), 8);
        assert_eq!(config.join_order.len(), 6);
    }

    #[test]
    fn test_stock_variables_use_last() {
        let config = PanelConfig::default();
        let policies = config.aggregation_policy_by_key();
        for key in ["sp500", "vix", "fed_balance", "ff_rate", "treasury_2y", "treasury_10y", "spread_bbb"] {
            assert_eq!(policies[key], Aggregation::Last, "{key} is a level variable");
        }
    }

    #[test]
    fn test_date_range_validation() {
        assert!(DateRange::new(d(2000, 1, 1), d(2025, 12, 31)).is_ok());
        assert!(matches!(
            DateRange::new(d(2025, 1, 1), d(2000, 1, 1)),
            Err(PanelError::InvalidDateRange { .. })
        ));
        assert!(DateRange::new(d(2020, 1, 1), d(2020, 1, 1)).is_err());
        assert!(matches!(DateRange::parse("2000-13-01", "2001-01-01"), Err(PanelError::Config(_))));
    }

    #[test]
    fn test_date_range_contains_is_inclusive() {
        let range = DateRange::parse("2021-01-31", "2021-03-31").unwrap();
        assert!(range.contains(d(2021, 1, 31)));
        assert!(range.contains(d(2021, 3, 31)));
        assert!(!range.contains(d(2021, 4, 30)));
    }

    #[test]
    fn test_validate_rejects_unknown_join_key() {
        let mut config = PanelConfig::default();
        config.join_order.push("oil".to_string());
        assert!(matches!(config.validate(), Err(PanelError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unordered_monthly_series() {
        let mut config = PanelConfig::default();
        config.join_order.retain(|k| k != "vix");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("vix"));
    }

    #[test]
    fn test_validate_rejects_base_in_join_order() {
        let mut config = PanelConfig::default();
        config.join_order.insert(0, "sp500".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_keys() {
        let mut config = PanelConfig::default();
        config.series.push(SeriesDescriptor::fred("vix", "VIXCLS"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_base_descriptor() {
        let config = PanelConfig {
            base_series: "nasdaq".to_string(),
            ..PanelConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = PanelConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: PanelConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            [date_range]
            start = "2010-01-01"
            end = "2020-12-31"
        "#;
        let config: PanelConfig = toml::from_str(text).unwrap();
        assert_eq!(config.date_range, DateRange::parse("2010-01-01", "2020-12-31").unwrap());
        assert_eq!(config.base_series, "sp500");
        assert_eq!(config.series.len(), 9);
    }

    #[test]
    fn test_unknown_aggregation_in_toml_is_rejected() {
        let text = r#"
            key = "vix"
            column = "vix"
            file = "yahoo_vix.csv"
            role = "monthly"
            aggregation = "median"
            source = { kind = "yahoo", ticker = "^VIX" }
        "#;
        assert!(toml::from_str::<SeriesDescriptor>(text).is_err());
    }
}
