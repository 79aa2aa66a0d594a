//! Scripted provider for tests and offline wiring.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::NaiveDate;

use super::provider::{DataError, MarketDataProvider, RawBar};

/// One scripted reply to a history request.
#[derive(Debug, Clone)]
pub enum MockReply {
    Bars(Vec<RawBar>),
    RateLimited,
    NetworkDown,
}

/// Provider that replays scripted replies, then falls back to fixed bars.
#[derive(Debug)]
pub struct MockProvider {
    script: Mutex<VecDeque<MockReply>>,
    fallback: Vec<RawBar>,
    price: Option<f64>,
    price_fails: bool,
    history_calls: AtomicUsize,
    price_calls: AtomicUsize,
}

impl MockProvider {
    pub fn with_bars(bars: Vec<RawBar>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: bars,
            price: None,
            price_fails: false,
            history_calls: AtomicUsize::new(0),
            price_calls: AtomicUsize::new(0),
        }
    }

    /// Queue replies served before the fallback bars.
    pub fn scripted(mut self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        self.script = Mutex::new(replies.into_iter().collect());
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_failing_price(mut self) -> Self {
        self.price_fails = true;
        self
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    /// `n` consecutive daily bars starting at `start`, close rising by 1.0.
    pub fn ramp(start: NaiveDate, n: usize) -> Vec<RawBar> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                RawBar {
                    date: start + chrono::Duration::days(i as i64),
                    open: Some(close - 0.5),
                    high: Some(close + 1.0),
                    low: Some(close - 1.0),
                    close: Some(close),
                    volume: Some(1_000_000.0 + 1_000.0 * i as f64),
                }
            })
            .collect()
    }
}

impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_daily(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(MockReply::Bars(bars)) => Ok(bars),
            Some(MockReply::RateLimited) => Err(DataError::RateLimited("scripted".into())),
            Some(MockReply::NetworkDown) => {
                Err(DataError::NetworkUnreachable("scripted".into()))
            }
            None => Ok(self.fallback.clone()),
        }
    }

    fn current_price(&self, _symbol: &str) -> Result<Option<f64>, DataError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        if self.price_fails {
            return Err(DataError::NetworkUnreachable("quote endpoint down".into()));
        }
        Ok(self.price)
    }
}
