//! Declarative series descriptors.
//!
//! Each series of the panel is described once: where its raw table comes
//! from, which role it plays in the merge, and how it is aggregated to
//! month-end. The resampler, merger and loaders are generic over these
//! descriptors.

use crate::error::PanelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Month-end aggregation policy.
///
/// Stock variables (index levels, yields, balances) take the value
/// prevailing at month-end. Flow variables (returns, issuance) are averaged
/// or summed over the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Chronologically last value of the month
    Last,
    /// Arithmetic mean of the month's values
    Mean,
    /// Arithmetic sum of the month's values
    Sum,
}

impl Aggregation {
    /// Name used in configuration files.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::Mean => "mean",
            Self::Sum => "sum",
        }
    }

    /// Whether this policy is the one for stock (level) variables.
    pub const fn is_stock(&self) -> bool {
        matches!(self, Self::Last)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last" => Ok(Self::Last),
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            _ => Err(PanelError::UnknownAggregation(s.to_string())),
        }
    }
}

/// Role of a series in the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesRole {
    /// Defines the panel's row set; resampled to month-end
    Base,
    /// Resampled to month-end and left-joined in join order
    Monthly,
    /// Lower-frequency series, joined and linearly interpolated
    Quarterly,
    /// Already-monthly external table with variable column names
    External,
}

impl SeriesRole {
    /// Whether tables of this role go through the resampler when loaded.
    pub const fn is_resampled(&self) -> bool {
        matches!(self, Self::Base | Self::Monthly)
    }
}

impl fmt::Display for SeriesRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Base => "base",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::External => "external",
        };
        f.write_str(name)
    }
}

/// Upstream source of a raw table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    /// Yahoo Finance daily history
    Yahoo {
        /// Ticker symbol, e.g. `^GSPC`
        ticker: String,
    },
    /// FRED statistical API
    Fred {
        /// FRED series identifier, e.g. `WALCL`
        series_id: String,
    },
    /// Third-party spreadsheet, supplied as a CSV export
    Spreadsheet {
        /// Where the spreadsheet is published
        url: String,
    },
}

impl SourceKind {
    /// Provider-side identifier (ticker, series id or URL).
    pub fn code(&self) -> &str {
        match self {
            Self::Yahoo { ticker } => ticker,
            Self::Fred { series_id } => series_id,
            Self::Spreadsheet { url } => url,
        }
    }

    /// Short provider name.
    pub const fn provider(&self) -> &'static str {
        match self {
            Self::Yahoo { .. } => "yahoo",
            Self::Fred { .. } => "fred",
            Self::Spreadsheet { .. } => "spreadsheet",
        }
    }
}

/// Canonical column name with the raw spellings it may appear under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAlias {
    /// Name the column gets in the panel
    pub canonical: String,
    /// Accepted raw names, matched case- and whitespace-insensitively
    pub aliases: Vec<String>,
}

impl ColumnAlias {
    /// Create an alias set. The canonical name is always accepted.
    pub fn new(canonical: &str, aliases: &[&str]) -> Self {
        let mut all: Vec<String> = vec![canonical.to_string()];
        all.extend(aliases.iter().map(|a| a.to_string()));
        Self {
            canonical: canonical.to_string(),
            aliases: all,
        }
    }
}

fn default_date_column() -> String {
    "date".to_string()
}

/// Description of one named series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesDescriptor {
    /// Registry key, e.g. `sp500`
    pub key: String,
    /// Value column in the raw table and in the panel
    pub column: String,
    /// Upstream source
    pub source: SourceKind,
    /// File name of the raw table
    pub file: String,
    /// Merge role
    pub role: SeriesRole,
    /// Month-end aggregation policy
    pub aggregation: Aggregation,
    /// Name of the date column in the raw table
    #[serde(default = "default_date_column")]
    pub date_column: String,
    /// Alias sets for value columns whose raw names are not guaranteed
    #[serde(default)]
    pub aliases: Vec<ColumnAlias>,
}

impl SeriesDescriptor {
    /// Daily market series from Yahoo Finance, aggregated with `last`.
    pub fn yahoo(key: &str, ticker: &str) -> Self {
        Self {
            key: key.to_string(),
            column: key.to_string(),
            source: SourceKind::Yahoo {
                ticker: ticker.to_string(),
            },
            file: format!("yahoo_{key}.csv"),
            role: SeriesRole::Monthly,
            aggregation: Aggregation::Last,
            date_column: default_date_column(),
            aliases: Vec::new(),
        }
    }

    /// Series from the FRED API, aggregated with `last`.
    pub fn fred(key: &str, series_id: &str) -> Self {
        Self {
            key: key.to_string(),
            column: key.to_string(),
            source: SourceKind::Fred {
                series_id: series_id.to_string(),
            },
            file: format!("fred_{key}.csv"),
            role: SeriesRole::Monthly,
            aggregation: Aggregation::Last,
            date_column: default_date_column(),
            aliases: Vec::new(),
        }
    }

    /// External spreadsheet table.
    pub fn spreadsheet(key: &str, url: &str, file: &str) -> Self {
        Self {
            key: key.to_string(),
            column: key.to_string(),
            source: SourceKind::Spreadsheet {
                url: url.to_string(),
            },
            file: file.to_string(),
            role: SeriesRole::External,
            aggregation: Aggregation::Last,
            date_column: default_date_column(),
            aliases: Vec::new(),
        }
    }

    /// Set the merge role.
    pub fn with_role(mut self, role: SeriesRole) -> Self {
        self.role = role;
        self
    }

    /// Set the aggregation policy.
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Set the value column name.
    pub fn with_column(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }

    /// Set the raw file name.
    pub fn with_file(mut self, file: &str) -> Self {
        self.file = file.to_string();
        self
    }

    /// Add an alias set.
    pub fn with_alias(mut self, alias: ColumnAlias) -> Self {
        self.aliases.push(alias);
        self
    }

    /// Alias sets to resolve for this series.
    ///
    /// A series without explicit aliases resolves its own value column.
    pub fn alias_sets(&self) -> Vec<ColumnAlias> {
        if self.aliases.is_empty() {
            vec![ColumnAlias::new(&self.column, &[])]
        } else {
            self.aliases.clone()
        }
    }
}
