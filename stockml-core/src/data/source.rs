//! Remote data source: retrying fetch, OHLCV normalization and the
//! best-effort current-price lookup.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::provider::{DataError, MarketDataProvider, RawBar};
use super::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::table::{Column, Table};

pub const DATE: &str = "Date";
pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const CLOSE: &str = "Close";
pub const VOLUME: &str = "Volume";

/// Column layout produced by every remote fetch.
pub const OHLCV_COLUMNS: [&str; 6] = [DATE, OPEN, HIGH, LOW, CLOSE, VOLUME];

/// A validated (symbol, start, end) request. End is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchRequest {
    /// Trims and upper-cases the symbol; rejects empty symbols and empty ranges.
    pub fn new(symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Self, DataError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(DataError::InvalidRequest("stock symbol is empty".into()));
        }
        if start >= end {
            return Err(DataError::InvalidRequest(format!(
                "start date {start} must be before end date {end}"
            )));
        }
        Ok(Self { symbol, start, end })
    }
}

/// Outcome of a successful remote load.
#[derive(Debug, Clone)]
pub struct RemoteLoad {
    pub symbol: String,
    pub table: Table,
    pub current_price: Option<f64>,
    /// Non-fatal problems, e.g. the price lookup failing.
    pub warnings: Vec<String>,
}

/// Provider plus retry policy plus sleeper: everything a remote load needs.
pub struct RemoteSource {
    provider: Box<dyn MarketDataProvider>,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl RemoteSource {
    pub fn new(provider: Box<dyn MarketDataProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch, normalize to OHLCV sorted by date, then look up the current
    /// price. Only the history fetch can fail the load.
    pub fn load(&self, request: &FetchRequest) -> Result<RemoteLoad, DataError> {
        let FetchRequest { symbol, start, end } = request;
        info!(
            provider = self.provider.name(),
            symbol = symbol.as_str(),
            %start,
            %end,
            "fetching daily bars"
        );

        let bars = self.policy.run(self.sleeper.as_ref(), symbol, |_| {
            self.provider.fetch_daily(symbol, *start, *end)
        })?;

        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.clone(),
                start: *start,
                end: *end,
            });
        }
        let table = bars_to_table(bars)?;

        let mut warnings = Vec::new();
        let current_price = match self.provider.current_price(symbol) {
            Ok(price) => price,
            Err(e) => {
                warn!(symbol = symbol.as_str(), error = %e, "current price unavailable");
                warnings.push(format!("Could not fetch current price for {symbol}: {e}"));
                None
            }
        };

        info!(symbol = symbol.as_str(), rows = table.n_rows(), "fetch complete");
        Ok(RemoteLoad {
            symbol: symbol.clone(),
            table,
            current_price,
            warnings,
        })
    }
}

/// Normalize bars into the OHLCV table shape, date ascending.
pub fn bars_to_table(mut bars: Vec<RawBar>) -> Result<Table, DataError> {
    bars.sort_by_key(|b| b.date);
    let table = Table::new(vec![
        Column::date(DATE, bars.iter().map(|b| Some(b.date)).collect()),
        Column::numeric(OPEN, bars.iter().map(|b| finite(b.open)).collect()),
        Column::numeric(HIGH, bars.iter().map(|b| finite(b.high)).collect()),
        Column::numeric(LOW, bars.iter().map(|b| finite(b.low)).collect()),
        Column::numeric(CLOSE, bars.iter().map(|b| finite(b.close)).collect()),
        Column::numeric(VOLUME, bars.iter().map(|b| finite(b.volume)).collect()),
    ])?;
    Ok(table)
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}
