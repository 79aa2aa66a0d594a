//! Data ingestion: remote providers, retry, caching and file upload.

pub mod cache;
pub mod mock;
pub mod provider;
pub mod retry;
pub mod source;
pub mod synthetic;
pub mod upload;
pub mod yahoo;

pub use cache::{CachedProvider, FetchKey};
pub use provider::{DataError, MarketDataProvider, RawBar};
pub use retry::{RetryCondition, RetryPolicy, Sleeper, ThreadSleeper};
pub use source::{bars_to_table, FetchRequest, RemoteLoad, RemoteSource, OHLCV_COLUMNS};
pub use synthetic::SyntheticProvider;
pub use upload::{load_upload, read_csv, UploadFormat};
pub use yahoo::YahooProvider;
