//! Observations from the FRED statistical API.

use crate::error::{DataError, Result};
use crate::observation::Observation;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Default FRED API endpoint.
pub const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Environment variable holding the FRED API key.
pub const FRED_API_KEY_ENV: &str = "FRED_API_KEY";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

/// FRED client.
#[derive(Clone)]
pub struct FredClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for FredClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FredClient")
            .field("base_url", &self.base_url)
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl FredClient {
    /// Create a client with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: FRED_BASE_URL.to_string(),
            rate_limit_delay: Duration::from_millis(500),
        }
    }

    /// Create a client with the key read from environment variable `var`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::MissingApiKey`] if the variable is unset or empty.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(DataError::MissingApiKey(var.to_string())),
        }
    }

    /// Use another endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set the pause after each request.
    pub fn with_rate_limit(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    /// Fetch observations of `series_id` between two dates.
    ///
    /// # Errors
    ///
    /// Fails on an inverted range, an HTTP error, a malformed payload or an
    /// empty series.
    pub async fn fetch(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let url = format!("{}/series/observations", self.base_url);
        let start = start.to_string();
        let end = end.to_string();
        debug!(series_id, %url, "requesting FRED observations");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("series_id", series_id),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("observation_start", start.as_str()),
                ("observation_end", end.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        sleep(self.rate_limit_delay).await;
        if !status.is_success() {
            return Err(DataError::FredApi(format!("{series_id}: HTTP {status}: {body}")));
        }

        let observations = parse_observations(&body)?;
        if observations.is_empty() {
            return Err(DataError::MissingData {
                symbol: series_id.to_string(),
                reason: "No observations returned from FRED".to_string(),
            });
        }
        Ok(observations)
    }
}

/// Parse an observations payload. The `"."` placeholder becomes `None`.
///
/// # Errors
///
/// Fails on malformed JSON, dates or numbers.
pub fn parse_observations(body: &str) -> Result<Vec<Observation>> {
    let response: ObservationsResponse = serde_json::from_str(body)?;
    response
        .observations
        .into_iter()
        .map(|raw| {
            let date = NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("date '{}': {e}", raw.date)))?;
            let value = match raw.value.trim() {
                "." | "" => None,
                v => Some(
                    v.parse::<f64>()
                        .map_err(|e| DataError::Parse(format!("value '{v}': {e}")))?,
                ),
            };
            Ok(Observation::new(date, value))
        })
        .collect()
}
