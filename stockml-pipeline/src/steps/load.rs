//! Load step: remote fetch, file upload, or a caller-provided table.
//!
//! A successful load replaces every downstream artifact and moves the
//! machine straight to Preprocess.

use std::path::Path;

use tracing::{info, warn};

use stockml_core::data::{self, FetchRequest, RemoteSource};
use stockml_core::Table;

use super::StepOutcome;
use crate::error::StepError;
use crate::state::{DataOrigin, PipelineState};
use crate::step::Step;

/// Fetch OHLCV rows for `request` through `source`.
pub fn load_remote(
    state: &mut PipelineState,
    source: &RemoteSource,
    request: &FetchRequest,
) -> Result<StepOutcome, StepError> {
    let loaded = source.load(request).map_err(|e| {
        warn!(symbol = request.symbol.as_str(), error = %e, "load failed");
        StepError::from(e)
    })?;

    let origin = DataOrigin::Remote {
        symbol: loaded.symbol.clone(),
        provider: source.provider_name().to_string(),
    };
    let mut outcome = commit(state, loaded.table, origin, Some(loaded.symbol))?;
    state.current_price = loaded.current_price;
    if let Some(price) = loaded.current_price {
        outcome = outcome.notice(format!("Current price: {price:.2}"));
    }
    Ok(outcome.with_notices(loaded.warnings))
}

/// Read a CSV or Parquet file.
pub fn load_upload(state: &mut PipelineState, path: &Path) -> Result<StepOutcome, StepError> {
    let table = data::load_upload(path)?;
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    commit(state, table, DataOrigin::Upload { file }, None)
}

/// Install an already-built table, e.g. from a test or another front end.
pub fn load_table(
    state: &mut PipelineState,
    table: Table,
    label: &str,
) -> Result<StepOutcome, StepError> {
    commit(
        state,
        table,
        DataOrigin::Provided {
            label: label.to_string(),
        },
        None,
    )
}

fn commit(
    state: &mut PipelineState,
    table: Table,
    origin: DataOrigin,
    symbol: Option<String>,
) -> Result<StepOutcome, StepError> {
    if table.is_empty() || table.n_cols() == 0 {
        return Err(StepError::DataUnavailable(format!(
            "{} produced no rows",
            origin.describe()
        )));
    }

    let hash = table.fingerprint();
    let outcome = StepOutcome::new(Step::Load).notice(format!(
        "Loaded {} rows x {} columns from {}",
        table.n_rows(),
        table.n_cols(),
        origin.describe()
    ));
    let missing = table.total_missing();

    state.invalidate_after(Step::Load);
    state.raw = Some(table);
    state.origin = Some(origin);
    state.dataset_hash = Some(hash);
    state.symbol = symbol;
    state.current_price = None;
    state.flags.complete(Step::Load)?;
    state.set_current(Step::Preprocess);

    info!(
        rows = state.raw.as_ref().map(Table::n_rows).unwrap_or(0),
        missing,
        "data loaded"
    );
    Ok(if missing > 0 {
        outcome.notice(format!("{missing} missing cells to clean in Preprocess"))
    } else {
        outcome
    })
}
