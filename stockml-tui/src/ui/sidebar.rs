//! Step list with completion and lock markers, plus the active palette.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use stockml_pipeline::{can_run, Step};

use crate::app::AppState;
use crate::theme::Theme;

pub fn render(f: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let pipeline = &app.session.pipeline;
    let current = pipeline.current_step();

    let mut lines: Vec<Line> = Vec::new();
    for step in Step::ALL {
        let (marker, marker_style) = if step != Step::Welcome && pipeline.is_complete(step) {
            ("✓", theme.positive())
        } else if can_run(pipeline, step) {
            ("○", theme.neutral())
        } else {
            ("🔒", theme.muted())
        };
        let label_style = if step == current {
            theme.selected()
        } else if can_run(pipeline, step) {
            theme.text()
        } else {
            theme.muted()
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{} ", step.index()), theme.muted()),
            Span::styled(marker, marker_style),
            Span::raw(" "),
            Span::styled(step.label(), label_style),
        ]));
    }

    lines.push(Line::from(""));
    if let Some(origin) = pipeline.origin() {
        lines.push(Line::from(Span::styled("Data", theme.neutral())));
        lines.push(Line::from(Span::styled(origin.describe(), theme.text())));
    }
    if !pipeline.models().is_empty() {
        lines.push(Line::from(Span::styled("Models", theme.neutral())));
        for variant in pipeline.models().keys() {
            lines.push(Line::from(Span::styled(format!("· {variant}"), theme.text())));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Palette ", theme.muted()),
        Span::styled(app.session.palette.label(), theme.accent()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.panel_border(false))
        .title(" StockML ")
        .title_style(theme.accent_bold());
    f.render_widget(Paragraph::new(lines).block(block), area);
}
