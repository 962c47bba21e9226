//! Daily market series from Yahoo Finance.

use crate::error::{DataError, Result};
use crate::observation::Observation;
use chrono::{DateTime, NaiveDate, NaiveTime};
use std::time::Duration;
use tokio::time::sleep;
use yahoo_finance_api as yahoo;

/// Yahoo Finance client with rate limiting.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a provider pausing one second after each request.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP connector cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(1000))
    }

    /// Create a provider with a custom pause between requests.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
        })
    }

    /// Fetch adjusted daily closes for `ticker` between two dates.
    ///
    /// Rows with a non-finite close are dropped.
    ///
    /// # Errors
    ///
    /// Fails on an inverted range, an empty ticker, an API error or an
    /// empty response.
    pub async fn fetch_adjusted_close(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>> {
        validate_request(ticker, start, end)?;

        let start_time = to_offset(start)?;
        let end_time = to_offset(end)?;

        let response = self
            .provider
            .get_quote_history(ticker, start_time, end_time)
            .await?;
        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        let observations: Vec<Observation> = quotes
            .iter()
            .filter(|q| q.adjclose.is_finite())
            .filter_map(|q| {
                DateTime::from_timestamp(q.timestamp, 0)
                    .map(|ts| Observation::new(ts.date_naive(), Some(q.adjclose)))
            })
            .collect();

        sleep(self.rate_limit_delay).await;

        if observations.is_empty() {
            return Err(DataError::MissingData {
                symbol: ticker.to_string(),
                reason: "No data returned from Yahoo Finance".to_string(),
            });
        }
        Ok(observations)
    }
}

fn validate_request(ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(DataError::InvalidDateRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    if ticker.trim().is_empty() {
        return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
    }
    Ok(())
}

fn to_offset(date: NaiveDate) -> Result<time::OffsetDateTime> {
    let seconds = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    time::OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|e| DataError::TimeConversion(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_invalid_date_range() {
        let result = validate_request("^GSPC", d(2021, 2, 1), d(2021, 1, 1));
        assert!(matches!(result, Err(DataError::InvalidDateRange { .. })));
    }

    #[test]
    fn test_invalid_symbol() {
        let result = validate_request(" ", d(2021, 1, 1), d(2021, 2, 1));
        assert!(matches!(result, Err(DataError::InvalidSymbol(_))));
    }

    #[test]
    fn test_to_offset_is_utc_midnight() {
        let t = to_offset(d(2000, 1, 1)).unwrap();
        assert_eq!(t.unix_timestamp(), 946_684_800);
    }
}
