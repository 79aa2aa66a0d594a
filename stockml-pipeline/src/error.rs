//! Error taxonomy for step handlers.
//!
//! Every failure a handler can produce lands in one of four categories. The
//! `From` impls below decide which category a lower-layer error belongs to.

use thiserror::Error;

use stockml_core::data::DataError;
use stockml_core::features::FeatureError;
use stockml_core::metrics::MetricsError;
use stockml_core::model::ModelError;
use stockml_core::split::SplitError;
use stockml_core::TableError;

use crate::step::Step;

/// A precondition the user can fix.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{step} needs {required} to be completed first")]
    MissingUpstream { step: Step, required: Step },

    #[error("{0} is not complete yet")]
    StepIncomplete(Step),

    #[error("please select at least one feature")]
    NoFeatures,

    #[error("{0}")]
    TargetTypeMismatch(String),

    #[error("{name} = {value} is outside {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: String,
        min: String,
        max: String,
    },

    #[error("column '{0}' not found")]
    UnknownColumn(String),

    #[error("{0}")]
    Invalid(String),
}

impl ValidationError {
    pub fn out_of_range(
        name: &'static str,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        ValidationError::OutOfRange {
            name,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    /// Transport or rate-limit failure after retries, or an unreadable upload.
    #[error("source error: {0}")]
    Source(DataError),

    /// The request was valid but produced no rows.
    #[error("no data: {0}")]
    DataUnavailable(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Scaling, correlation, fitting or prediction failed.
    #[error("computation error: {0}")]
    Computation(String),
}

impl StepError {
    pub fn category(&self) -> &'static str {
        match self {
            StepError::Source(_) => "SourceError",
            StepError::DataUnavailable(_) => "DataUnavailable",
            StepError::Validation(_) => "ValidationError",
            StepError::Computation(_) => "ComputationError",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StepError::Validation(_))
    }

    pub fn missing_upstream(step: Step, required: Step) -> Self {
        StepError::Validation(ValidationError::MissingUpstream { step, required })
    }
}

impl From<DataError> for StepError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::NoData { .. } => StepError::DataUnavailable(e.to_string()),
            DataError::InvalidRequest(msg) => StepError::Validation(ValidationError::Invalid(msg)),
            DataError::UnsupportedFormat(_) => {
                StepError::Validation(ValidationError::Invalid(e.to_string()))
            }
            other => StepError::Source(other),
        }
    }
}

impl From<FeatureError> for StepError {
    fn from(e: FeatureError) -> Self {
        match e {
            FeatureError::NoFeatures => ValidationError::NoFeatures.into(),
            FeatureError::MissingColumn(name) => ValidationError::UnknownColumn(name).into(),
            FeatureError::WindowOutOfRange { window, min, max } => {
                ValidationError::out_of_range("moving-average window", window, min, max).into()
            }
            other if other.is_validation() => ValidationError::Invalid(other.to_string()).into(),
            other => StepError::Computation(other.to_string()),
        }
    }
}

impl From<SplitError> for StepError {
    fn from(e: SplitError) -> Self {
        match e {
            SplitError::FractionOutOfRange(f) => {
                ValidationError::out_of_range("test fraction", f, 0.1, 0.4).into()
            }
            other => ValidationError::Invalid(other.to_string()).into(),
        }
    }
}

impl From<ModelError> for StepError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::TargetTypeMismatch { .. } => {
                ValidationError::TargetTypeMismatch(e.to_string()).into()
            }
            ModelError::InvalidK { k, max } => ValidationError::out_of_range("k", k, 1, max).into(),
            ModelError::DimensionMismatch { .. } => ValidationError::Invalid(e.to_string()).into(),
            other => StepError::Computation(other.to_string()),
        }
    }
}

impl From<MetricsError> for StepError {
    fn from(e: MetricsError) -> Self {
        StepError::Computation(e.to_string())
    }
}

impl From<TableError> for StepError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::ColumnNotFound(name) => ValidationError::UnknownColumn(name).into(),
            other => StepError::Computation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn empty_fetch_is_data_unavailable() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err: StepError = DataError::NoData {
            symbol: "AAPL".into(),
            start: d,
            end: d,
        }
        .into();
        assert_eq!(err.category(), "DataUnavailable");
    }

    #[test]
    fn rate_limit_is_source() {
        let err: StepError = DataError::RateLimited("x".into()).into();
        assert!(matches!(err, StepError::Source(_)));
    }

    #[test]
    fn no_features_is_validation() {
        let err: StepError = FeatureError::NoFeatures.into();
        assert!(matches!(
            err,
            StepError::Validation(ValidationError::NoFeatures)
        ));
    }

    #[test]
    fn singular_fit_is_computation() {
        let err: StepError = ModelError::SingularMatrix.into();
        assert_eq!(err.category(), "ComputationError");
    }
}
