//! Market-data provider trait and structured error types.
//!
//! The `MarketDataProvider` trait abstracts over remote sources so the
//! pipeline can swap implementations and mock them in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::TableError;

/// Raw daily OHLCV bar as returned by a provider.
///
/// Fields are optional: providers report gaps, and gaps are left for the
/// preprocessor to impute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// Structured error types for data operations.
///
/// These are designed to be displayable in both CLI and TUI contexts.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("Too Many Requests: rate limited by provider ({0})")]
    RateLimited(String),

    #[error("HTTP {status} from provider for {symbol}")]
    Http { status: u16, symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("no data found for {symbol} between {start} and {end}")]
    NoData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported file type '{0}' (expected .csv or .parquet)")]
    UnsupportedFormat(String),

    #[error("could not read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

impl DataError {
    /// Whether the provider refused the request because of rate limiting.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, DataError::RateLimited(_))
    }

    /// Whether the request was valid but produced no rows.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, DataError::NoData { .. })
    }
}

/// Trait for remote market-data providers.
///
/// Implementations handle one source's transport and response format. Retry
/// and caching sit above this trait; providers make exactly one attempt.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for `[start, end)`. An empty vector means the source
    /// had no rows for the range.
    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError>;

    /// Latest traded price, if the provider knows one.
    fn current_price(&self, symbol: &str) -> Result<Option<f64>, DataError>;
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        (**self).fetch_daily(symbol, start, end)
    }

    fn current_price(&self, symbol: &str) -> Result<Option<f64>, DataError> {
        (**self).current_price(symbol)
    }
}
