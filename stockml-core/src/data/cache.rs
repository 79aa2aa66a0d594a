//! In-memory fetch cache keyed by `(symbol, start, end)`.
//!
//! `CachedProvider` wraps any provider. A hit returns exactly the bars the
//! inner provider returned for the same key. Empty results and errors are
//! never cached. Current-price lookups always go to the inner provider.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing::debug;

use super::provider::{DataError, MarketDataProvider, RawBar};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchKey {
    pub fn new(symbol: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.to_string(),
            start,
            end,
        }
    }
}

/// Provider decorator that memoizes successful history fetches.
pub struct CachedProvider<P> {
    inner: P,
    entries: Mutex<HashMap<FetchKey, Vec<RawBar>>>,
}

impl<P: MarketDataProvider> CachedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl<P: MarketDataProvider> MarketDataProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let key = FetchKey::new(symbol, start, end);
        if let Some(hit) = self.entries.lock().ok().and_then(|e| e.get(&key).cloned()) {
            debug!(symbol, %start, %end, "fetch cache hit");
            return Ok(hit);
        }

        let bars = self.inner.fetch_daily(symbol, start, end)?;
        if !bars.is_empty() {
            if let Ok(mut entries) = self.entries.lock() {
                entries.insert(key, bars.clone());
            }
        }
        Ok(bars)
    }

    fn current_price(&self, symbol: &str) -> Result<Option<f64>, DataError> {
        self.inner.current_price(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock::MockProvider;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn second_identical_fetch_is_served_from_cache() {
        let cached = CachedProvider::new(MockProvider::with_bars(MockProvider::ramp(d(1), 5)));
        let first = cached.fetch_daily("AAPL", d(1), d(10)).unwrap();
        let second = cached.fetch_daily("AAPL", d(1), d(10)).unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner().history_calls(), 1);
        assert_eq!(cached.len(), 1);
    }

    #[test]
    fn different_range_is_a_miss() {
        let cached = CachedProvider::new(MockProvider::with_bars(MockProvider::ramp(d(1), 5)));
        cached.fetch_daily("AAPL", d(1), d(10)).unwrap();
        cached.fetch_daily("AAPL", d(1), d(11)).unwrap();
        assert_eq!(cached.inner().history_calls(), 2);
    }

    #[test]
    fn empty_results_are_not_cached() {
        let cached = CachedProvider::new(MockProvider::with_bars(Vec::new()));
        cached.fetch_daily("AAPL", d(1), d(10)).unwrap();
        cached.fetch_daily("AAPL", d(1), d(10)).unwrap();
        assert_eq!(cached.inner().history_calls(), 2);
        assert!(cached.is_empty());
    }
}
