//! StockML TUI — an eight-step wizard over the shared pipeline.
//!
//! Provides:
//! - A step sidebar with completion and lock markers
//! - Per-step forms that feed the pipeline handlers
//! - Result views: importance bars, actual vs predicted chart, forecasts
//! - Four colour palettes that survive restart

pub mod app;
pub mod forms;
pub mod input;
pub mod persistence;
pub mod theme;
pub mod ui;

pub use app::AppState;
pub use theme::Theme;
