//! StockML CLI — run the pipeline headlessly.
//!
//! Commands:
//! - `run` — load, preprocess, engineer features, split, train and evaluate
//! - `fetch` — download prices and print a preview
//! - `inspect` — summarize a CSV or Parquet file
//! - `report` — print a saved JSON run report

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stockml_core::data::{self, source::CLOSE};
use stockml_core::model::ModelKind;
use stockml_core::Table;
use stockml_pipeline::{
    run_plan, DataInput, PipelineConfig, PipelineState, ProviderKind, RunPlan, RunReport,
};

#[derive(Parser)]
#[command(
    name = "stockml",
    about = "StockML CLI — stock price prediction pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticker symbol; overrides the config.
    #[arg(long)]
    symbol: Option<String>,

    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD).
    #[arg(long)]
    end: Option<String>,

    /// Offline random-walk prices instead of Yahoo Finance.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every step up to Evaluate (and Visualize) and print the results.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Read a CSV or Parquet file instead of downloading.
        #[arg(long, conflicts_with_all = ["symbol", "synthetic"])]
        file: Option<PathBuf>,

        /// Models to train: linear, logistic, knn. Defaults to the config.
        #[arg(long, value_delimiter = ',', value_parser = parse_model)]
        models: Vec<ModelKind>,

        /// Print the JSON run report instead of tables.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Also write the JSON run report to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Download prices and print the first rows.
    Fetch {
        #[command(flatten)]
        source: SourceArgs,

        /// Rows to print.
        #[arg(long, default_value_t = 10)]
        head: usize,
    },
    /// Summarize a CSV or Parquet file.
    Inspect {
        file: PathBuf,
    },
    /// Print a saved JSON run report.
    Report {
        file: PathBuf,
    },
}

fn parse_model(s: &str) -> Result<ModelKind, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "linear" | "linear_regression" => Ok(ModelKind::LinearRegression),
        "logistic" | "logistic_regression" => Ok(ModelKind::LogisticRegression),
        "knn" | "k_nearest_neighbors" => Ok(ModelKind::KNearestNeighbors),
        other => Err(format!("unknown model '{other}'. Valid: linear, logistic, knn")),
    }
}

fn parse_date(label: &str, s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("--{label} '{s}' is not YYYY-MM-DD"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            source,
            file,
            models,
            json,
            output,
        } => run_pipeline(source, file, models, json, output),
        Commands::Fetch { source, head } => run_fetch(source, head),
        Commands::Inspect { file } => run_inspect(&file),
        Commands::Report { file } => run_report(&file),
    }
}

/// Config file plus command-line overrides, validated once more.
fn build_config(args: &SourceArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(symbol) = &args.symbol {
        config.data.symbol = symbol.clone();
    }
    if let Some(start) = &args.start {
        config.data.start = parse_date("start", start)?;
    }
    if let Some(end) = &args.end {
        config.data.end = parse_date("end", end)?;
    }
    if args.synthetic {
        config.data.provider = ProviderKind::Synthetic;
    }
    config.validate()?;
    Ok(config)
}

fn run_pipeline(
    source: SourceArgs,
    file: Option<PathBuf>,
    models: Vec<ModelKind>,
    json: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = build_config(&source)?;
    let input = match file {
        Some(path) => DataInput::Upload(path),
        None => DataInput::Remote(config.build_source()?),
    };
    let plan = RunPlan {
        input,
        models,
        visualize: true,
    };

    let run = run_plan(&config, plan)?;
    let report = RunReport::from_state(&run.state);

    if let Some(path) = &output {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    for outcome in &run.outcomes {
        for notice in &outcome.notices {
            println!("[{}] {notice}", outcome.step);
        }
    }
    println!();
    print_results(&run.state);
    if let Some(path) = output {
        println!("\nReport saved to: {}", path.display());
    }
    Ok(())
}

fn print_results(state: &PipelineState) {
    if let Some(split) = state.split() {
        println!(
            "Target {} from {} feature(s): {}",
            split.target,
            split.feature_names.len(),
            split.feature_names.join(", ")
        );
        println!("Train {} rows, test {} rows (seed {})", split.n_train(), split.n_test(), split.seed);
    }

    println!();
    println!("{:<22} {:>12} {:>12} {:>12} {:>9}", "Model", "MSE", "RMSE", "MAE", "R²");
    println!("{}", "-".repeat(71));
    for (variant, m) in state.metrics() {
        println!(
            "{:<22} {:>12.4} {:>12.4} {:>12.4} {:>9.4}",
            variant.label(),
            m.mse,
            m.rmse,
            m.mae,
            m.r2
        );
    }
    for (variant, reason) in state.eval_failures() {
        println!("{:<22} failed: {reason}", variant.label());
    }

    for (variant, model) in state.models() {
        let Some(table) = model.coefficient_table() else {
            continue;
        };
        println!("\n{variant} coefficients");
        println!("{:>16} {}", "", table.value_columns.iter().map(|c| format!("{c:>12}")).collect::<Vec<_>>().join(" "));
        for (name, values) in &table.rows {
            let cells: Vec<String> = values.iter().map(|v| format!("{v:>12.4}")).collect();
            println!("{name:>16} {}", cells.join(" "));
        }
    }

    if let Some(viz) = state.visualization() {
        if let Some(fc) = &viz.forecast {
            println!(
                "\n{} next day ({}): {:.2} → {:.2} ({:+.2}, {:+.2}%)",
                fc.symbol, fc.model, fc.current_price, fc.predicted, fc.change, fc.change_percent
            );
            println!("Educational use only. Not financial advice.");
        }
        for note in &viz.notes {
            println!("note: {note}");
        }
    }
}

fn run_fetch(source: SourceArgs, head: usize) -> Result<()> {
    let config = build_config(&source)?;
    let remote = config.build_source()?;
    let request = config.fetch_request()?;
    let loaded = remote.load(&request)?;

    println!(
        "{}: {} rows from {} ({} to {})",
        loaded.symbol,
        loaded.table.n_rows(),
        remote.provider_name(),
        request.start,
        request.end
    );
    if let Some(price) = loaded.current_price {
        println!("Current price: {price:.2}");
    }
    for warning in &loaded.warnings {
        eprintln!("warning: {warning}");
    }
    println!();
    print_head(&loaded.table, head);
    Ok(())
}

fn run_inspect(file: &Path) -> Result<()> {
    let table = data::load_upload(file)?;
    if table.is_empty() {
        bail!("{} has no rows", file.display());
    }
    println!("{}: {} rows × {} columns", file.display(), table.n_rows(), table.n_cols());
    println!("fingerprint {}", table.fingerprint());
    println!();
    print_head(&table, 5);

    println!();
    println!(
        "{:>12} {:>6} {:>7} {:>12} {:>12} {:>12} {:>12}",
        "", "count", "missing", "mean", "std", "min", "max"
    );
    let opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    for s in table.describe() {
        println!(
            "{:>12} {:>6} {:>7} {:>12} {:>12} {:>12} {:>12}",
            s.name,
            s.count,
            s.missing,
            opt(s.mean),
            opt(s.std),
            opt(s.min),
            opt(s.max)
        );
    }
    if !table.has_column(CLOSE) {
        println!("\nnote: no {CLOSE} column; choose another target when running");
    }
    Ok(())
}

fn run_report(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let report = RunReport::from_json(&text)?;

    println!("schema v{} · {}", report.schema_version, report.origin.as_deref().unwrap_or("unknown source"));
    println!(
        "completed: {}",
        report
            .completed
            .iter()
            .map(|s| s.label())
            .collect::<Vec<_>>()
            .join(" → ")
    );
    for model in &report.models {
        match (&model.metrics, &model.error) {
            (Some(m), _) => println!("{:<22} R² {:>8.4}  RMSE {:>10.4}", model.variant.label(), m.r2, m.rmse),
            (None, Some(err)) => println!("{:<22} failed: {err}", model.variant.label()),
            (None, None) => println!("{:<22} not evaluated", model.variant.label()),
        }
    }
    Ok(())
}

fn print_head(table: &Table, n: usize) {
    let columns = table.columns();
    println!(
        "{}",
        columns
            .iter()
            .map(|c| format!("{:>12}", c.name))
            .collect::<Vec<_>>()
            .join(" ")
    );
    for row in 0..table.n_rows().min(n) {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| format!("{:>12}", c.data.display_cell(row)))
            .collect();
        println!("{}", cells.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_parse() {
        assert_eq!(parse_model("KNN"), Ok(ModelKind::KNearestNeighbors));
        assert_eq!(parse_model(" linear "), Ok(ModelKind::LinearRegression));
        assert!(parse_model("forest").is_err());
    }

    #[test]
    fn cli_parses_model_list() {
        let cli = Cli::try_parse_from(["stockml", "run", "--synthetic", "--models", "linear,knn"]).unwrap();
        match cli.command {
            Commands::Run { models, source, .. } => {
                assert_eq!(models, vec![ModelKind::LinearRegression, ModelKind::KNearestNeighbors]);
                assert!(source.synthetic);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn file_conflicts_with_symbol() {
        assert!(Cli::try_parse_from(["stockml", "run", "--file", "a.csv", "--symbol", "MSFT"]).is_err());
    }

    #[test]
    fn overrides_apply_and_validate() {
        let args = SourceArgs {
            config: None,
            symbol: Some("MSFT".into()),
            start: Some("2023-01-01".into()),
            end: Some("2023-06-30".into()),
            synthetic: true,
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.data.symbol, "MSFT");
        assert_eq!(config.data.provider, ProviderKind::Synthetic);

        let bad = SourceArgs {
            start: Some("June".into()),
            ..args
        };
        assert!(build_config(&bad).is_err());
    }
}
