//! StockML TUI — step-by-step stock prediction wizard.
//!
//! Steps:
//! 0. Welcome
//! 1. Load — Yahoo Finance or CSV/Parquet upload
//! 2. Preprocess — mean imputation
//! 3. Feature Engineering — target, features, moving average, scaling
//! 4. Split — reproducible train/test partition
//! 5. Train — linear, logistic or KNN
//! 6. Evaluate — MSE, RMSE, MAE, R²
//! 7. Visualize — importance, series, comparison, forecast, prediction

use std::fs::OpenOptions;
use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stockml_pipeline::PipelineConfig;
use stockml_tui::app::AppState;
use stockml_tui::{input, persistence, ui};

fn main() -> Result<()> {
    // Install a panic hook that restores the terminal before printing the panic.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), LeaveAlternateScreen);
        default_hook(info);
    }));

    // Paths
    let app_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stockml");
    let config_path = app_dir.join("config.toml");
    let state_path = app_dir.join("state.json");

    init_logging(&app_dir.join("stockml.log"));

    let config = PipelineConfig::load_or_default(&config_path)?;
    let source = match config.build_source() {
        Ok(source) => Some(source),
        Err(e) => {
            warn!(error = %e, "market data provider unavailable");
            None
        }
    };

    let mut app = AppState::new(config, source);
    match persistence::load(&state_path) {
        Some(persisted) => persistence::apply(&mut app, persisted),
        None => app.overlay = stockml_tui::app::Overlay::Welcome,
    }
    if app.source.is_none() {
        app.set_warning("Market data provider unavailable; upload a file to continue");
    }
    info!(session = app.session.id.as_str(), "tui started");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app);

    // Save state before exit
    let persisted = persistence::extract(&app);
    if let Err(e) = persistence::save(&state_path, &persisted) {
        error!(error = %e, "failed to save state");
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Log to a file; stdout belongs to the terminal UI.
fn init_logging(path: &Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
) -> Result<()> {
    loop {
        // 1. Render
        terminal.draw(|f| ui::draw(f, app))?;

        // 2. Poll for input events (50ms timeout for ~20 FPS tick)
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                input::handle_key(app, key);
            }
        }

        // 3. Check quit
        if !app.running {
            break;
        }
    }
    Ok(())
}
