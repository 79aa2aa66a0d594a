//! StockML Core — tables, data sources, preprocessing, features, splitting,
//! models and metrics.
//!
//! This crate holds everything the pipeline steps compute with:
//! - Column-major `Table` with typed, optionally missing cells
//! - Market-data providers (Yahoo, synthetic, mock), retry and fetch cache
//! - CSV and Parquet upload
//! - Mean imputation, moving average, scaling and correlation
//! - Seeded train/test split
//! - Linear, logistic and KNN models behind one `Estimator` trait
//! - Regression metrics

pub mod data;
pub mod features;
pub mod metrics;
pub mod model;
pub mod preprocess;
pub mod split;
pub mod table;

pub use table::{Column, ColumnData, ColumnKind, Table, TableError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Everything stored in pipeline state must cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Table>();
        require_sync::<Table>();
        require_send::<features::Standardizer>();
        require_sync::<features::Standardizer>();
        require_send::<features::CorrelationMatrix>();
        require_sync::<features::CorrelationMatrix>();
        require_send::<split::TrainTestSplit>();
        require_sync::<split::TrainTestSplit>();
        require_send::<model::TrainedModel>();
        require_sync::<model::TrainedModel>();
        require_send::<metrics::RegressionMetrics>();
        require_sync::<metrics::RegressionMetrics>();
        require_send::<data::RemoteSource>();
        require_sync::<data::RemoteSource>();
    }

    #[test]
    fn estimator_is_object_safe() {
        fn _boxed(m: model::LinearRegression) -> Box<dyn model::Estimator> {
            Box::new(m)
        }
    }
}
