//! TOML configuration shared by the TUI and the CLI.
//!
//! Every field has a default, so an empty file (or no file) is valid.

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use stockml_core::data::{
    CachedProvider, DataError, FetchRequest, MarketDataProvider, RemoteSource, RetryCondition,
    RetryPolicy, SyntheticProvider, YahooProvider,
};
use stockml_core::features::{moving_average_name, DEFAULT_MA_WINDOW, MA_WINDOW_RANGE};
use stockml_core::model::{ModelKind, DEFAULT_K, MAX_K};
use stockml_core::split::{DEFAULT_SEED, DEFAULT_TEST_PERCENT, MAX_TEST_PERCENT, MIN_TEST_PERCENT};

use crate::session::Palette;
use crate::steps::{FeatureRequest, SplitRequest, TrainRequest};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Yahoo,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub provider: ProviderKind,
    pub http_timeout_secs: u64,
    /// Memoize identical history requests for the life of the process.
    pub cache: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            symbol: "AAPL".into(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            provider: ProviderKind::Yahoo,
            http_timeout_secs: 30,
            cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub multiplier: f64,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub retry_on: RetryCondition,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let p = RetryPolicy::default();
        Self {
            max_attempts: p.max_attempts,
            multiplier: p.multiplier,
            min_delay_secs: p.min_delay.as_secs_f64(),
            max_delay_secs: p.max_delay.as_secs_f64(),
            retry_on: p.retry_on,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub add_moving_average: bool,
    pub ma_window: usize,
    pub scale: bool,
    pub target: String,
    /// Empty means every numeric column except the target.
    pub features: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            add_moving_average: true,
            ma_window: DEFAULT_MA_WINDOW,
            scale: true,
            target: "Close".into(),
            features: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_percent: u32,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_percent: DEFAULT_TEST_PERCENT,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub k: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::LinearRegression,
            k: DEFAULT_K,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub palette: Palette,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub retry: RetryConfig,
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub model: ModelConfig,
    pub ui: UiConfig,
}

impl PipelineConfig {
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text, &path.display().to_string())?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.data.symbol.trim().is_empty() {
            return invalid("data.symbol must not be empty".into());
        }
        if self.data.start >= self.data.end {
            return invalid(format!(
                "data.start ({}) must be before data.end ({})",
                self.data.start, self.data.end
            ));
        }
        if self.data.http_timeout_secs == 0 {
            return invalid("data.http_timeout_secs must be positive".into());
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".into());
        }
        if !(self.retry.min_delay_secs >= 0.0
            && self.retry.min_delay_secs <= self.retry.max_delay_secs
            && self.retry.max_delay_secs.is_finite())
        {
            return invalid("retry delays must satisfy 0 <= min_delay_secs <= max_delay_secs".into());
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 0.0) {
            return invalid("retry.multiplier must be a non-negative number".into());
        }
        if !MA_WINDOW_RANGE.contains(&self.features.ma_window) {
            return invalid(format!(
                "features.ma_window {} outside {}..={}",
                self.features.ma_window,
                MA_WINDOW_RANGE.start(),
                MA_WINDOW_RANGE.end()
            ));
        }
        if !(MIN_TEST_PERCENT..=MAX_TEST_PERCENT).contains(&self.split.test_percent) {
            return invalid(format!(
                "split.test_percent {} outside {MIN_TEST_PERCENT}..={MAX_TEST_PERCENT}",
                self.split.test_percent
            ));
        }
        if !(1..=MAX_K).contains(&self.model.k) {
            return invalid(format!("model.k {} outside 1..={MAX_K}", self.model.k));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            multiplier: self.retry.multiplier,
            min_delay: Duration::from_secs_f64(self.retry.min_delay_secs),
            max_delay: Duration::from_secs_f64(self.retry.max_delay_secs),
            retry_on: self.retry.retry_on,
        }
    }

    /// The configured provider behind retry (and optionally a cache).
    pub fn build_source(&self) -> Result<RemoteSource, DataError> {
        let provider: Box<dyn MarketDataProvider> = match (self.data.provider, self.data.cache) {
            (ProviderKind::Yahoo, cache) => {
                let yahoo = YahooProvider::new(Duration::from_secs(self.data.http_timeout_secs))?;
                if cache {
                    Box::new(CachedProvider::new(yahoo))
                } else {
                    Box::new(yahoo)
                }
            }
            (ProviderKind::Synthetic, true) => Box::new(CachedProvider::new(SyntheticProvider)),
            (ProviderKind::Synthetic, false) => Box::new(SyntheticProvider),
        };
        Ok(RemoteSource::new(provider, self.retry_policy()))
    }

    pub fn fetch_request(&self) -> Result<FetchRequest, DataError> {
        FetchRequest::new(&self.data.symbol, self.data.start, self.data.end)
    }

    /// Feature request for `available` numeric columns. An empty feature
    /// list in the config selects every column except the target, plus the
    /// moving average when it is enabled.
    pub fn feature_request(&self, available: &[String]) -> FeatureRequest {
        let ma_window = self.features.add_moving_average.then_some(self.features.ma_window);
        let features = if self.features.features.is_empty() {
            let mut features: Vec<String> = available
                .iter()
                .filter(|c| **c != self.features.target)
                .cloned()
                .collect();
            if let Some(window) = ma_window {
                let ma = moving_average_name(window);
                if ma != self.features.target && !features.contains(&ma) {
                    features.push(ma);
                }
            }
            features
        } else {
            self.features.features.clone()
        };
        FeatureRequest {
            ma_window,
            target: self.features.target.clone(),
            features,
            scale: self.features.scale,
        }
    }

    pub fn split_request(&self) -> SplitRequest {
        SplitRequest {
            test_percent: self.split.test_percent,
            seed: self.split.seed,
        }
    }

    pub fn train_request(&self) -> TrainRequest {
        TrainRequest {
            kind: self.model.kind,
            k: self.model.k,
        }
    }
}
