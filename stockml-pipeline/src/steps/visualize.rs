//! Data behind the result views: feature importance, actual vs predicted
//! series, model comparison, next-day forecast and single-row prediction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stockml_core::data::source::{CLOSE, DATE};
use stockml_core::metrics::RegressionMetrics;
use stockml_core::model::{ModelVariant, TrainedModel};
use stockml_core::Table;

use super::StepOutcome;
use crate::error::{StepError, ValidationError};
use crate::state::PipelineState;
use crate::step::Step;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Actual closes plus one model's test-set predictions on the same dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub model: ModelVariant,
    pub actual: Vec<SeriesPoint>,
    /// Sorted by date.
    pub predicted: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextDayForecast {
    pub model: ModelVariant,
    pub symbol: String,
    pub current_price: f64,
    pub predicted: f64,
    pub change: f64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub name: String,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    /// Model the importance and series views are drawn from.
    pub primary: ModelVariant,
    pub feature_importance: Option<Vec<(String, f64)>>,
    pub time_series: Option<TimeSeries>,
    pub comparison: Vec<(ModelVariant, RegressionMetrics)>,
    pub forecast: Option<NextDayForecast>,
    /// Per-feature ranges in raw units.
    pub ranges: Vec<FeatureRange>,
    /// The same ranges in standardized units, when a scaler was fitted.
    pub ranges_scaled: Option<Vec<FeatureRange>>,
    /// Why an optional view is missing.
    pub notes: Vec<String>,
}

/// Units of the values passed to [`predict_single`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueScale {
    #[default]
    Raw,
    Scaled,
}

/// Build every result view from the evaluated state.
pub fn visualize(state: &mut PipelineState) -> Result<StepOutcome, StepError> {
    state.ensure_ready(Step::Visualize)?;
    let Some((&primary, model)) = state
        .metrics
        .keys()
        .next()
        .and_then(|v| state.models.get_key_value(v))
    else {
        return Err(StepError::missing_upstream(Step::Visualize, Step::Evaluate));
    };
    let Some(featured) = state.featured.as_ref() else {
        return Err(StepError::missing_upstream(Step::Visualize, Step::FeatureEngineer));
    };

    let mut notes = Vec::new();

    let feature_importance = model.feature_importance();
    if feature_importance.is_none() {
        notes.push(format!("{primary} has no coefficients; feature importance unavailable"));
    }

    let time_series = match time_series(state, primary) {
        Ok(series) => Some(series),
        Err(reason) => {
            notes.push(format!("time series unavailable: {reason}"));
            None
        }
    };

    let comparison: Vec<_> = state
        .metrics
        .iter()
        .map(|(v, m)| (*v, m.clone()))
        .collect();

    let forecast = match (state.symbol.as_deref(), state.current_price) {
        (Some(symbol), Some(price)) => match last_row(featured, &model.features) {
            Some(row) => {
                let predicted = model.predict_row(&row)?;
                let change = predicted - price;
                Some(NextDayForecast {
                    model: primary,
                    symbol: symbol.to_string(),
                    current_price: price,
                    predicted,
                    change,
                    change_percent: if price != 0.0 { change / price * 100.0 } else { 0.0 },
                })
            }
            None => {
                notes.push("forecast unavailable: last row has missing features".into());
                None
            }
        },
        _ => {
            notes.push("forecast needs a fetched symbol with a current price".into());
            None
        }
    };

    let scaled = feature_ranges(featured, &model.features)?;
    let (ranges, ranges_scaled) = match state.scaler.as_ref() {
        Some(scaler) => {
            let raw = scaled
                .iter()
                .map(|r| -> Result<FeatureRange, StepError> {
                    let i = scaler
                        .features()
                        .iter()
                        .position(|f| *f == r.name)
                        .ok_or_else(|| ValidationError::UnknownColumn(r.name.clone()))?;
                    let (m, s) = (scaler.means()[i], scaler.scales()[i]);
                    Ok(FeatureRange {
                        name: r.name.clone(),
                        min: r.min * s + m,
                        mean: r.mean * s + m,
                        max: r.max * s + m,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            (raw, Some(scaled))
        }
        None => (scaled, None),
    };

    let mut outcome = StepOutcome::new(Step::Visualize)
        .notice(format!("Views built from {primary}"))
        .with_notices(notes.iter().cloned());
    if let Some(f) = &forecast {
        outcome = outcome.notice(format!(
            "{} next day: {:.2} ({:+.2}, {:+.2}%)",
            f.symbol, f.predicted, f.change, f.change_percent
        ));
    }
    info!(primary = %primary, models = comparison.len(), "visualization ready");

    state.visualization = Some(Visualization {
        primary,
        feature_importance,
        time_series,
        comparison,
        forecast,
        ranges,
        ranges_scaled,
        notes,
    });
    state.flags.complete(Step::Visualize)?;
    Ok(outcome)
}

/// Predict one row with a trained model. Raw values pass through the fitted
/// scaler when there is one.
pub fn predict_single(
    state: &PipelineState,
    variant: ModelVariant,
    values: &[f64],
    scale: ValueScale,
) -> Result<f64, StepError> {
    let model: &TrainedModel = state
        .models
        .get(&variant)
        .ok_or(ValidationError::MissingUpstream {
            step: Step::Visualize,
            required: Step::Train,
        })?;
    if values.len() != model.features.len() {
        return Err(ValidationError::Invalid(format!(
            "expected {} feature values, got {}",
            model.features.len(),
            values.len()
        ))
        .into());
    }
    let row = match (scale, state.scaler.as_ref()) {
        (ValueScale::Raw, Some(scaler)) => scaler.transform_row(values)?,
        _ => values.to_vec(),
    };
    debug!(variant = %variant, ?scale, "single prediction");
    Ok(model.predict_row(&row)?)
}

fn time_series(state: &PipelineState, primary: ModelVariant) -> Result<TimeSeries, String> {
    let table = state.processed.as_ref().ok_or("no processed table")?;
    let dates = table
        .dates(DATE)
        .map_err(|_| format!("no {DATE} column"))?;
    let close = table
        .numeric(CLOSE)
        .map_err(|_| format!("no numeric {CLOSE} column"))?;
    let split = state.split.as_ref().ok_or("no split")?;
    let preds = state.predictions.get(&primary).ok_or("no predictions")?;

    let actual = dates
        .iter()
        .zip(close)
        .filter_map(|(d, c)| {
            Some(SeriesPoint {
                date: (*d)?,
                value: (*c)?,
            })
        })
        .collect();
    let mut predicted: Vec<SeriesPoint> = split
        .test_index
        .iter()
        .zip(preds.iter())
        .filter_map(|(&row, &value)| {
            Some(SeriesPoint {
                date: (*dates.get(row)?)?,
                value,
            })
        })
        .collect();
    predicted.sort_by_key(|p| p.date);
    Ok(TimeSeries {
        model: primary,
        actual,
        predicted,
    })
}

fn last_row(table: &Table, features: &[String]) -> Option<Vec<f64>> {
    let last = table.n_rows().checked_sub(1)?;
    features
        .iter()
        .map(|f| table.numeric(f).ok()?.get(last).copied().flatten())
        .collect()
}

fn feature_ranges(table: &Table, features: &[String]) -> Result<Vec<FeatureRange>, StepError> {
    features
        .iter()
        .map(|name| {
            let observed: Vec<f64> = table.numeric(name)?.iter().flatten().copied().collect();
            if observed.is_empty() {
                return Err(StepError::Computation(format!("{name} has no observed values")));
            }
            let n = observed.len() as f64;
            Ok(FeatureRange {
                name: name.clone(),
                min: observed.iter().copied().fold(f64::INFINITY, f64::min),
                mean: observed.iter().sum::<f64>() / n,
                max: observed.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            })
        })
        .collect()
}
