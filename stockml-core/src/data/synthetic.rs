//! Synthetic provider for offline use.
//!
//! Produces a deterministic random walk from a starting price of 100.0,
//! seeded from the symbol name, skipping weekends. These bars are clearly
//! fake; they exist so the pipeline can be exercised without network access.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{DataError, MarketDataProvider, RawBar};

#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticProvider;

impl SyntheticProvider {
    fn rng_for(symbol: &str) -> StdRng {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        StdRng::from_seed(seed)
    }

    /// Bars for every weekday in `[start, end)`.
    pub fn bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<RawBar> {
        let mut rng = Self::rng_for(symbol);
        let mut bars = Vec::new();
        let mut price = 100.0_f64;
        let mut current = start;

        while current < end {
            if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                current += chrono::Duration::days(1);
                continue;
            }

            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64) as f64;

            bars.push(RawBar {
                date: current,
                open: Some(open),
                high: Some(high),
                low: Some(low),
                close: Some(close),
                volume: Some(volume),
            });

            price = close;
            current += chrono::Duration::days(1);
        }
        bars
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        Ok(Self::bars(symbol, start, end))
    }

    fn current_price(&self, symbol: &str) -> Result<Option<f64>, DataError> {
        // Last close of a fixed one-year walk, so the value is stable per symbol.
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .ok_or_else(|| DataError::InvalidRequest("bad anchor date".into()))?;
        let end = NaiveDate::from_ymd_opt(2025, 1, 1)
            .ok_or_else(|| DataError::InvalidRequest("bad anchor date".into()))?;
        Ok(Self::bars(symbol, start, end).last().and_then(|b| b.close))
    }
}
