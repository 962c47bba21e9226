//! Derived columns for the merged panel.
//!
//! Rules are data: each [`Derivation`] names its inputs and its output, and
//! the [`Transformer`] applies them in order. A rule whose input is absent
//! is skipped and reported, so a panel built from a partial download still
//! gets every column it can support.

use crate::audit::MissingReport;
use crate::error::Result;
use crate::frame::{float_column, float_values, has_column};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// One derived-column rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Derivation {
    /// Natural logarithm; non-positive inputs become missing
    Log {
        /// Level column
        input: String,
        /// Output column
        output: String,
    },
    /// First difference `x[t] - x[t-1]`; the first row is missing
    Diff {
        /// Differenced column
        input: String,
        /// Output column
        output: String,
    },
    /// Difference between two columns on the same row
    Spread {
        /// Minuend
        long: String,
        /// Subtrahend
        short: String,
        /// Output column
        output: String,
    },
}

impl Derivation {
    /// `output = ln(input)`.
    pub fn log(input: &str, output: &str) -> Self {
        Self::Log {
            input: input.to_string(),
            output: output.to_string(),
        }
    }

    /// `output = input[t] - input[t-1]`.
    pub fn diff(input: &str, output: &str) -> Self {
        Self::Diff {
            input: input.to_string(),
            output: output.to_string(),
        }
    }

    /// `output = long - short`.
    pub fn spread(long: &str, short: &str, output: &str) -> Self {
        Self::Spread {
            long: long.to_string(),
            short: short.to_string(),
            output: output.to_string(),
        }
    }

    /// Name of the column this rule produces.
    pub fn output(&self) -> &str {
        match self {
            Self::Log { output, .. } | Self::Diff { output, .. } | Self::Spread { output, .. } => {
                output
            }
        }
    }

    /// Columns this rule reads.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Self::Log { input, .. } | Self::Diff { input, .. } => vec![input.as_str()],
            Self::Spread { long, short, .. } => vec![long.as_str(), short.as_str()],
        }
    }
}

impl fmt::Display for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log { input, output } => write!(f, "{output} = ln({input})"),
            Self::Diff { input, output } => write!(f, "{output} = diff({input})"),
            Self::Spread {
                long,
                short,
                output,
            } => write!(f, "{output} = {long} - {short}"),
        }
    }
}

/// A rule that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDerivation {
    /// Output the rule would have produced
    pub output: String,
    /// Inputs absent from the panel
    pub missing_inputs: Vec<String>,
}

/// Result of a transform pass.
#[derive(Debug, Clone)]
pub struct Transformed {
    /// Panel with derived columns appended
    pub panel: DataFrame,
    /// Outputs written, in rule order
    pub applied: Vec<String>,
    /// Rules skipped for missing inputs
    pub skipped: Vec<SkippedDerivation>,
    /// Missing-value profile of `panel`
    pub missing: MissingReport,
}

/// Applies derivation rules to a merged panel.
#[derive(Debug, Clone)]
pub struct Transformer {
    rules: Vec<Derivation>,
}

impl Transformer {
    /// Create a transformer for the given rules.
    pub fn new(rules: Vec<Derivation>) -> Self {
        Self { rules }
    }

    /// Configured rules.
    pub fn rules(&self) -> &[Derivation] {
        &self.rules
    }

    /// Append derived columns and audit missing values.
    ///
    /// Rows must already be ascending by date. Existing columns are never
    /// modified, except that a column named like a rule's output is
    /// recomputed, so running the pass twice yields the same panel.
    ///
    /// # Errors
    ///
    /// Fails only on a polars error; absent inputs are reported, not raised.
    pub fn transform(&self, panel: &DataFrame) -> Result<Transformed> {
        let mut df = panel.clone();
        let mut applied = Vec::new();
        let mut skipped = Vec::new();

        for rule in &self.rules {
            let missing_inputs: Vec<String> = rule
                .inputs()
                .into_iter()
                .filter(|c| !has_column(&df, c))
                .map(String::from)
                .collect();
            if !missing_inputs.is_empty() {
                debug!(output = rule.output(), missing = ?missing_inputs, "skipping derivation");
                skipped.push(SkippedDerivation {
                    output: rule.output().to_string(),
                    missing_inputs,
                });
                continue;
            }

            df = apply(df, rule)?;
            applied.push(rule.output().to_string());
        }

        info!(
            applied = applied.len(),
            skipped = skipped.len(),
            "derived columns computed"
        );

        let missing = MissingReport::from_frame(&df);
        Ok(Transformed {
            panel: df,
            applied,
            skipped,
            missing,
        })
    }
}

/// Transform with the given rules in one call.
pub fn transform(panel: &DataFrame, rules: &[Derivation]) -> Result<Transformed> {
    Transformer::new(rules.to_vec()).transform(panel)
}

fn apply(mut df: DataFrame, rule: &Derivation) -> Result<DataFrame> {
    match rule {
        Derivation::Log { input, output } => {
            let values = float_values(&df, "panel", input)?;
            let cleaned = values.iter().filter(|v| matches!(v, Some(x) if *x <= 0.0)).count();
            if cleaned > 0 {
                debug!(column = %input, rows = cleaned, "non-positive values treated as missing before log");
            }
            df.with_column(float_column(output, safe_ln(&values)))?;
            Ok(df)
        }
        Derivation::Diff { input, output } => {
            let x = col(input.as_str()).cast(DataType::Float64);
            Ok(df
                .lazy()
                .with_column((x.clone() - x.shift(lit(1))).alias(output.as_str()))
                .collect()?)
        }
        Derivation::Spread {
            long,
            short,
            output,
        } => Ok(df
            .lazy()
            .with_column(
                (col(long.as_str()).cast(DataType::Float64)
                    - col(short.as_str()).cast(DataType::Float64))
                .alias(output.as_str()),
            )
            .collect()?),
    }
}

/// Natural log with non-positive values mapped to missing.
pub fn safe_ln(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| v.filter(|x| *x > 0.0).map(f64::ln))
        .collect()
}
