//! Overlay widgets — welcome, error history, key help.

use ratatui::layout::Rect;
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::AppState;
use crate::theme::Theme;
use crate::ui::centered_rect;

/// First-run welcome overlay.
pub fn render_welcome(f: &mut Frame, area: Rect, theme: &Theme) {
    let popup = centered_rect(60, 50, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.accent())
        .title(" Welcome to StockML ")
        .title_style(theme.accent_bold());

    let steps = [
        "1. Load prices from Yahoo Finance or a CSV/Parquet file",
        "2. Fill missing values",
        "3. Pick target and features, add a moving average",
        "4. Split into train and test sets",
        "5. Train linear, logistic or KNN models",
        "6. Score them on the test set",
        "7. Explore importance, forecasts and predictions",
    ];
    let mut text = vec![
        Line::from(""),
        Line::from(Span::styled("Eight steps, each unlocked by the one before:", theme.accent_bold())),
        Line::from(""),
    ];
    text.extend(steps.iter().map(|s| Line::from(Span::styled(format!("  {s}"), theme.muted()))));
    text.push(Line::from(""));
    text.push(Line::from(Span::styled(
        "Educational use only. Not financial advice.",
        theme.warning(),
    )));
    text.push(Line::from(Span::styled("Press any key to dismiss...", theme.neutral())));

    let para = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(para, popup);
}

/// Error history overlay.
pub fn render_error_history(f: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let popup = centered_rect(80, 70, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.negative())
        .title(format!(
            " Error History ({}) [Esc]close [j/k]scroll ",
            app.error_history.len()
        ))
        .title_style(theme.negative());

    let inner = block.inner(popup);
    f.render_widget(block, popup);

    if app.error_history.is_empty() {
        let text = Paragraph::new(Span::styled("No errors recorded.", theme.muted()));
        f.render_widget(text, inner);
        return;
    }

    let visible_height = inner.height as usize;
    let mut lines: Vec<Line> = Vec::new();
    for (i, err) in app
        .error_history
        .iter()
        .enumerate()
        .skip(app.error_scroll)
        .take(visible_height)
    {
        let style = if i == app.error_scroll {
            theme.negative().add_modifier(Modifier::BOLD)
        } else {
            theme.muted()
        };

        lines.push(Line::from(vec![
            Span::styled(format!("[{}] ", err.timestamp.format("%H:%M:%S")), theme.muted()),
            Span::styled(format!("[{}] ", err.category.label()), theme.warning()),
            Span::styled(err.message.as_str(), style),
        ]));

        if !err.context.is_empty() {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(err.context.as_str(), theme.muted()),
            ]));
        }
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

const KEYS: [(&str, &str); 16] = [
    ("Enter", "run the current step"),
    ("n / Tab", "continue to the next step"),
    ("0-7", "jump to a step"),
    ("R", "restart (palette kept)"),
    ("p", "cycle palette"),
    ("E", "error history"),
    ("j / k", "move between fields"),
    ("h / l", "adjust the focused field"),
    ("Space", "toggle the focused option"),
    ("e", "edit the focused text field"),
    ("a", "select all features"),
    ("v", "cycle result views"),
    ("m", "cycle models for prediction"),
    ("s", "switch raw/scaled inputs"),
    ("?", "this help"),
    ("q", "quit"),
];

pub fn render_help(f: &mut Frame, area: Rect, theme: &Theme) {
    let popup = centered_rect(60, 70, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.accent())
        .title(" Keys ")
        .title_style(theme.accent_bold());

    let lines: Vec<Line> = KEYS
        .iter()
        .map(|(key, what)| {
            Line::from(vec![
                Span::styled(format!("{key:>8}  "), theme.accent()),
                Span::styled(*what, theme.text()),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines).block(block), popup);
}
