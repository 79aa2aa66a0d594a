//! Result charts: actual vs predicted closes and feature-importance bars.

use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Chart, Dataset, GraphType, Paragraph};
use ratatui::Frame;

use stockml_pipeline::steps::visualize::{SeriesPoint, TimeSeries};

use crate::theme::Theme;

/// (days since the first actual date, value)
fn to_xy(points: &[SeriesPoint], origin: chrono::NaiveDate) -> Vec<(f64, f64)> {
    points
        .iter()
        .map(|p| ((p.date - origin).num_days() as f64, p.value))
        .collect()
}

fn bounds(series: &[&[(f64, f64)]]) -> Option<([f64; 2], [f64; 2])> {
    let mut x = [f64::INFINITY, f64::NEG_INFINITY];
    let mut y = [f64::INFINITY, f64::NEG_INFINITY];
    for &(px, py) in series.iter().flat_map(|s| s.iter()) {
        x = [x[0].min(px), x[1].max(px)];
        y = [y[0].min(py), y[1].max(py)];
    }
    if !x[0].is_finite() || !y[0].is_finite() {
        return None;
    }
    let pad = ((y[1] - y[0]).abs() * 0.05).max(1e-6);
    Some(([x[0], x[1].max(x[0] + 1.0)], [y[0] - pad, y[1] + pad]))
}

pub fn render_series(f: &mut Frame, area: Rect, series: &TimeSeries, theme: &Theme) {
    let Some(origin) = series.actual.first().map(|p| p.date) else {
        f.render_widget(Paragraph::new(Span::styled("No dated rows to plot.", theme.muted())), area);
        return;
    };
    let actual = to_xy(&series.actual, origin);
    let predicted = to_xy(&series.predicted, origin);
    let Some((x_bounds, y_bounds)) = bounds(&[actual.as_slice(), predicted.as_slice()]) else {
        f.render_widget(Paragraph::new(Span::styled("Nothing to plot.", theme.muted())), area);
        return;
    };

    let label = format!("{} (test)", series.model);
    let datasets = vec![
        Dataset::default()
            .name("Actual")
            .marker(symbols::Marker::Braille)
            .style(Style::default().fg(theme.accent))
            .graph_type(GraphType::Line)
            .data(&actual),
        Dataset::default()
            .name(label)
            .marker(symbols::Marker::Dot)
            .style(Style::default().fg(theme.warning))
            .graph_type(GraphType::Scatter)
            .data(&predicted),
    ];

    let first = origin.to_string();
    let last = series
        .actual
        .last()
        .map(|p| p.date.to_string())
        .unwrap_or_default();
    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title(Span::styled("Date", theme.muted()))
                .style(theme.muted())
                .bounds(x_bounds)
                .labels(vec![Span::styled(first, theme.muted()), Span::styled(last, theme.muted())]),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("Close", theme.muted()))
                .style(theme.muted())
                .bounds(y_bounds)
                .labels(vec![
                    Span::styled(format!("{:.2}", y_bounds[0]), theme.muted()),
                    Span::styled(format!("{:.2}", y_bounds[1]), theme.muted()),
                ]),
        );
    f.render_widget(chart, area);
}

/// Horizontal bars, widest first, scaled to the largest magnitude.
pub fn importance_lines<'a>(importance: &[(String, f64)], width: u16, theme: &Theme) -> Vec<Line<'a>> {
    let mut ranked: Vec<&(String, f64)> = importance.iter().collect();
    ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    let max = ranked.first().map(|(_, v)| v.abs()).unwrap_or(0.0);
    let name_width = ranked.iter().map(|(n, _)| n.len()).max().unwrap_or(0).min(16);
    let bar_room = (width as usize).saturating_sub(name_width + 14).max(1);

    ranked
        .into_iter()
        .map(|(name, value)| {
            let filled = if max > 0.0 {
                ((value.abs() / max) * bar_room as f64).round() as usize
            } else {
                0
            };
            Line::from(vec![
                Span::styled(format!("{name:>name_width$.name_width$} "), theme.text()),
                Span::styled("█".repeat(filled), theme.change_style(*value)),
                Span::styled(format!(" {value:>10.4}"), theme.muted()),
            ])
        })
        .collect()
}
