//! Top-level UI layout — step sidebar, active step view, status bar.

pub mod chart;
pub mod overlays;
pub mod sidebar;
pub mod status_bar;
pub mod steps;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

use crate::app::{AppState, Overlay};

/// Draw the entire UI.
pub fn draw(f: &mut Frame, app: &AppState) {
    let theme = app.theme();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(26), Constraint::Min(20)])
        .split(rows[0]);

    sidebar::render(f, columns[0], app, &theme);

    let step = app.current_step();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.panel_border(true))
        .title(format!(" {} [{}] ", step.label(), step.index()))
        .title_style(theme.accent_bold());
    let inner = block.inner(columns[1]);
    f.render_widget(block, columns[1]);
    steps::render(f, inner, app, &theme);

    status_bar::render(f, rows[1], app, &theme);

    match app.overlay {
        Overlay::Welcome => overlays::render_welcome(f, rows[0], &theme),
        Overlay::ErrorHistory => overlays::render_error_history(f, rows[0], app, &theme),
        Overlay::Help => overlays::render_help(f, rows[0], &theme),
        Overlay::None => {}
    }
}

/// Compute a centered rect for overlays.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use stockml_core::data::{RemoteSource, RetryPolicy, SyntheticProvider};
    use stockml_pipeline::{PipelineConfig, Step, Transition};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn centered_rect_is_inside() {
        let area = Rect::new(0, 0, 100, 50);
        let r = centered_rect(60, 40, area);
        assert!(r.x >= area.x && r.right() <= area.right());
        assert!(r.y >= area.y && r.bottom() <= area.bottom());
    }

    #[test]
    fn every_step_and_overlay_renders() {
        let source = RemoteSource::new(Box::new(SyntheticProvider), RetryPolicy::none());
        let mut app = AppState::new(PipelineConfig::default(), Some(source));
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();

        app.navigate(Transition::Jump(Step::Load));
        for step in &Step::ALL[1..] {
            app.navigate(Transition::Jump(*step));
            app.run_step();
            terminal.draw(|f| draw(f, &app)).unwrap();
        }
        let text = buffer_text(&terminal);
        assert!(text.contains("Visualize"));

        for view in crate::forms::VizView::ALL {
            app.forms.predict.view = view;
            terminal.draw(|f| draw(f, &app)).unwrap();
        }
        for overlay in [Overlay::Welcome, Overlay::ErrorHistory, Overlay::Help] {
            app.overlay = overlay;
            terminal.draw(|f| draw(f, &app)).unwrap();
        }
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let app = AppState::new(PipelineConfig::default(), None);
        let mut terminal = Terminal::new(TestBackend::new(20, 6)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
    }
}
